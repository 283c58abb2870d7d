use crate::domain::matching::MatchResult;
use crate::domain::pool::{Pool, PoolStatus};
use crate::domain::psi::{PendingPsiRequest, PsiRequestStatus, PsiResponseRecord, PsiSetup};
use crate::domain::{Participant, Preference};
use crate::foundation::{AgreementPublicKey, MatchToken, Nullifier, PoolId, PsiRequestId, SigningPublicKey, TimestampMs};
use std::collections::HashMap;

pub type Result<T> = crate::foundation::Result<T>;

/// token → number of revealed preferences carrying it.
pub type TokenCounts = HashMap<MatchToken, u32>;

/// The transactional contract the rest of the core programs against.
/// Implementations must provide linearizable single-key operations and a
/// serializable insert-if-absent for preference sets keyed (pool, nullifier).
pub trait Store: Send + Sync {
    // Pools.
    fn insert_pool(&self, pool: Pool) -> Result<()>;
    fn get_pool(&self, pool_id: &PoolId) -> Result<Option<Pool>>;
    fn list_pools(&self) -> Result<Vec<Pool>>;
    fn list_pools_by_status(&self, status: PoolStatus) -> Result<Vec<Pool>>;
    fn list_pools_by_creator(&self, creator: &SigningPublicKey) -> Result<Vec<Pool>>;
    /// Validates the lifecycle transition and stamps `updated_at_ms`.
    fn update_pool_status(&self, pool_id: &PoolId, status: PoolStatus, now_ms: TimestampMs) -> Result<()>;
    fn set_pool_psi_setup_at(&self, pool_id: &PoolId, at_ms: TimestampMs) -> Result<()>;

    // Participants. `(pool_id, public_key)` is unique.
    fn insert_participant(&self, participant: Participant) -> Result<()>;
    fn get_participant(&self, pool_id: &PoolId, key: &AgreementPublicKey) -> Result<Option<Participant>>;
    fn list_participants(&self, pool_id: &PoolId) -> Result<Vec<Participant>>;
    fn count_participants(&self, pool_id: &PoolId) -> Result<u64>;
    /// Ephemeral cleanup after detection. Returns how many were dropped.
    fn delete_participants(&self, pool_id: &PoolId) -> Result<usize>;

    // Preferences, owned by (pool, nullifier) as one atomic set.
    /// Fails with DUPLICATE_NULLIFIER when any preferences already exist for
    /// the key, including against concurrent submitters.
    fn insert_preference_set(&self, pool_id: &PoolId, nullifier: &Nullifier, preferences: Vec<Preference>) -> Result<()>;
    fn list_preferences(&self, pool_id: &PoolId, nullifier: &Nullifier) -> Result<Vec<Preference>>;
    /// Atomic rewrite used by the reveal handler; the set must already exist.
    fn replace_preference_set(&self, pool_id: &PoolId, nullifier: &Nullifier, preferences: Vec<Preference>) -> Result<()>;
    /// Occurrence counts over revealed preferences only.
    fn count_token_occurrences(&self, pool_id: &PoolId) -> Result<TokenCounts>;
    fn count_revealed_preferences(&self, pool_id: &PoolId) -> Result<u64>;
    /// Distinct nullifiers that submitted to the pool.
    fn count_nullifiers(&self, pool_id: &PoolId) -> Result<u64>;
    fn find_preference_by_token(&self, pool_id: &PoolId, token: &MatchToken) -> Result<Option<Preference>>;

    // Match results, append-once per pool.
    fn upsert_match_result(&self, result: MatchResult) -> Result<()>;
    fn get_match_result(&self, pool_id: &PoolId) -> Result<Option<MatchResult>>;

    // PSI.
    fn put_psi_setup(&self, setup: PsiSetup) -> Result<()>;
    fn get_psi_setup(&self, pool_id: &PoolId) -> Result<Option<PsiSetup>>;
    fn enqueue_psi_request(&self, request: PendingPsiRequest) -> Result<()>;
    fn get_psi_request(&self, request_id: &PsiRequestId) -> Result<Option<PendingPsiRequest>>;
    fn list_psi_requests(&self, pool_id: &PoolId, status: PsiRequestStatus) -> Result<Vec<PendingPsiRequest>>;
    /// Rejects non-monotone transitions.
    fn update_psi_request_status(&self, request_id: &PsiRequestId, status: PsiRequestStatus) -> Result<()>;
    /// Unique by request id.
    fn insert_psi_response(&self, record: PsiResponseRecord) -> Result<()>;
    fn get_psi_response(&self, request_id: &PsiRequestId) -> Result<Option<PsiResponseRecord>>;
    fn delete_psi_response(&self, request_id: &PsiRequestId) -> Result<()>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
