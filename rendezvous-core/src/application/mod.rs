//! Application layer: the managers that drive domain logic against the
//! store and adapters, and the facade that wires them together.

pub mod eligibility;
pub mod facade;
pub mod matching;
pub mod pools;
pub mod psi;
pub mod submissions;

pub use eligibility::GateEvaluator;
pub use facade::Rendezvous;
pub use matching::MatchDetector;
pub use pools::{CreatePoolRequest, PoolManager};
pub use psi::{PsiBatchItemOutcome, PsiResponseDelivery, PsiResponseSubmission, PsiService};
pub use submissions::{RevealEntry, SubmissionManager, SubmissionReceipt, SubmissionRequest};
