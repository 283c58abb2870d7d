//! Replicated state for federation: last-writer-wins registers composed into
//! a convergent document. Merges are commutative, associative, idempotent.

pub mod document;
pub mod lww;

pub use document::{FederatedPool, FederationDocument, InstanceRecord, PoolSummary};
pub use lww::LwwRegister;
