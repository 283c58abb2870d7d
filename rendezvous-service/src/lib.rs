pub mod service;

pub use service::federation::{FederationEvents, FederationManager, FederationRuntimeConfig};
pub use service::flow::{FederationSetup, ServiceFlow};
pub use service::scheduler::AutoCloseScheduler;
