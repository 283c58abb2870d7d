pub mod status;

use crate::domain::gate::Gate;
use crate::foundation::{AgreementPublicKey, PoolId, SigningPublicKey, TimestampMs};
use serde::{Deserialize, Serialize};

pub use status::{accepts_commits, accepts_reveals, accepts_submissions, effective_status, ensure_valid_transition};

/// A matching pool. `creator_signing_key` authenticates administrative
/// actions and is immutable after creation; `creator_agreement_key` is the
/// key other participants derive match tokens against.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Pool {
    pub pool_id: PoolId,
    pub name: String,
    pub description: Option<String>,
    pub creator_agreement_key: AgreementPublicKey,
    pub creator_signing_key: SigningPublicKey,
    pub commit_deadline_ms: Option<TimestampMs>,
    pub reveal_deadline_ms: TimestampMs,
    pub gate: Gate,
    pub max_preferences: Option<u32>,
    pub ephemeral: bool,
    pub requires_invite: bool,
    pub status: PoolStatus,
    pub created_at_ms: TimestampMs,
    pub updated_at_ms: TimestampMs,
    /// Set when the owner has installed a PSI setup for this pool.
    pub psi_setup_at_ms: Option<TimestampMs>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Open,
    Commit,
    Reveal,
    Closed,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolStatus::Open => write!(f, "open"),
            PoolStatus::Commit => write!(f, "commit"),
            PoolStatus::Reveal => write!(f, "reveal"),
            PoolStatus::Closed => write!(f, "closed"),
        }
    }
}
