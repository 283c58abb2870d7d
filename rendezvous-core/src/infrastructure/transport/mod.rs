pub mod messages;
pub mod mock;
pub mod traits;

pub use messages::{AnonymousPayload, FederationMessage, FederationPayload, Handshake, JoinPayload};
pub use mock::MemoryHub;
pub use traits::{FederationTransport, PeerChannel};
