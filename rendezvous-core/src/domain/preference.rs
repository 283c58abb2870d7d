use crate::foundation::{Hash32, MatchToken, Nullifier, PoolId, TimestampMs};
use serde::{Deserialize, Serialize};

/// A single stored selection, real or decoy. Owned by `(pool_id, nullifier)`.
/// Never mutated after insert except to flip `revealed` and, for commit
/// pools, to replace the stored token with the revealed value.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Preference {
    pub pool_id: PoolId,
    pub nullifier: Nullifier,
    pub token: MatchToken,
    pub commitment: Option<Hash32>,
    pub revealed: bool,
    pub submitted_at_ms: TimestampMs,
    /// Hash of the eligibility proof presented at submission, if any.
    pub issuance_proof: Option<Hash32>,
    /// Reveal-on-match payload, AES-256-GCM under the match token.
    pub encrypted_reveal: Option<Vec<u8>>,
}
