//! Domain layer: protocol data shapes and the pure logic over them.
//! Nothing here touches storage, the network, or the clock directly.

pub mod crdt;
pub mod gate;
pub mod matching;
pub mod participant;
pub mod pool;
pub mod preference;
pub mod psi;
pub mod token;

pub use gate::{Gate, GateContext, GateOp, GateOutcome, ProofCheck};
pub use matching::{Attestation, AttestationSignatures, IntegrityReport, MatchResult, MatchStats, WitnessSignature};
pub use participant::Participant;
pub use pool::{Pool, PoolStatus};
pub use preference::Preference;
pub use token::UnlinkableToken;
