use crate::domain::matching::MatchResult;
use crate::domain::pool::{ensure_valid_transition, Pool, PoolStatus};
use crate::domain::psi::{self, PendingPsiRequest, PsiRequestStatus, PsiResponseRecord, PsiSetup};
use crate::domain::{Participant, Preference};
use crate::foundation::{
    AgreementPublicKey, MatchToken, Nullifier, PoolId, PsiRequestId, RendezvousError, SigningPublicKey, TimestampMs,
};
use crate::infrastructure::storage::traits::{Result, Store, TokenCounts};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct MemoryInner {
    pools: HashMap<PoolId, Pool>,
    participants: HashMap<(PoolId, AgreementPublicKey), Participant>,
    preferences: HashMap<(PoolId, Nullifier), Vec<Preference>>,
    results: HashMap<PoolId, MatchResult>,
    psi_setups: HashMap<PoolId, PsiSetup>,
    psi_requests: HashMap<PsiRequestId, PendingPsiRequest>,
    psi_responses: HashMap<PsiRequestId, PsiResponseRecord>,
}

impl MemoryInner {
    fn new() -> Self {
        Self {
            pools: HashMap::new(),
            participants: HashMap::new(),
            preferences: HashMap::new(),
            results: HashMap::new(),
            psi_setups: HashMap::new(),
            psi_requests: HashMap::new(),
            psi_responses: HashMap::new(),
        }
    }
}

/// In-memory store. The single mutex gives the serializable insert-if-absent
/// the trait demands.
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryInner::new())) }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|_| RendezvousError::storage("memory", "store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn insert_pool(&self, pool: Pool) -> Result<()> {
        let mut inner = self.lock_inner()?;
        if inner.pools.contains_key(&pool.pool_id) {
            return Err(RendezvousError::Internal(format!("pool id collision: {}", pool.pool_id)));
        }
        inner.pools.insert(pool.pool_id, pool);
        Ok(())
    }

    fn get_pool(&self, pool_id: &PoolId) -> Result<Option<Pool>> {
        Ok(self.lock_inner()?.pools.get(pool_id).cloned())
    }

    fn list_pools(&self) -> Result<Vec<Pool>> {
        let mut pools: Vec<Pool> = self.lock_inner()?.pools.values().cloned().collect();
        pools.sort_by_key(|p| p.created_at_ms);
        Ok(pools)
    }

    fn list_pools_by_status(&self, status: PoolStatus) -> Result<Vec<Pool>> {
        Ok(self.list_pools()?.into_iter().filter(|p| p.status == status).collect())
    }

    fn list_pools_by_creator(&self, creator: &SigningPublicKey) -> Result<Vec<Pool>> {
        Ok(self.list_pools()?.into_iter().filter(|p| p.creator_signing_key == *creator).collect())
    }

    fn update_pool_status(&self, pool_id: &PoolId, status: PoolStatus, now_ms: TimestampMs) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let pool = inner.pools.get_mut(pool_id).ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))?;
        ensure_valid_transition(pool.status, status)?;
        pool.status = status;
        pool.updated_at_ms = now_ms;
        Ok(())
    }

    fn set_pool_psi_setup_at(&self, pool_id: &PoolId, at_ms: TimestampMs) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let pool = inner.pools.get_mut(pool_id).ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))?;
        pool.psi_setup_at_ms = Some(at_ms);
        pool.updated_at_ms = at_ms;
        Ok(())
    }

    fn insert_participant(&self, participant: Participant) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let key = (participant.pool_id, participant.public_key);
        if inner.participants.contains_key(&key) {
            return Err(RendezvousError::AlreadyRegistered(participant.pool_id.to_string()));
        }
        inner.participants.insert(key, participant);
        Ok(())
    }

    fn get_participant(&self, pool_id: &PoolId, key: &AgreementPublicKey) -> Result<Option<Participant>> {
        Ok(self.lock_inner()?.participants.get(&(*pool_id, *key)).cloned())
    }

    fn list_participants(&self, pool_id: &PoolId) -> Result<Vec<Participant>> {
        let inner = self.lock_inner()?;
        let mut list: Vec<Participant> =
            inner.participants.values().filter(|p| p.pool_id == *pool_id).cloned().collect();
        list.sort_by_key(|p| p.registered_at_ms);
        Ok(list)
    }

    fn count_participants(&self, pool_id: &PoolId) -> Result<u64> {
        Ok(self.lock_inner()?.participants.keys().filter(|(pool, _)| pool == pool_id).count() as u64)
    }

    fn delete_participants(&self, pool_id: &PoolId) -> Result<usize> {
        let mut inner = self.lock_inner()?;
        let before = inner.participants.len();
        inner.participants.retain(|(pool, _), _| pool != pool_id);
        Ok(before - inner.participants.len())
    }

    fn insert_preference_set(&self, pool_id: &PoolId, nullifier: &Nullifier, preferences: Vec<Preference>) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let key = (*pool_id, *nullifier);
        if inner.preferences.contains_key(&key) {
            return Err(RendezvousError::DuplicateNullifier);
        }
        inner.preferences.insert(key, preferences);
        Ok(())
    }

    fn list_preferences(&self, pool_id: &PoolId, nullifier: &Nullifier) -> Result<Vec<Preference>> {
        Ok(self.lock_inner()?.preferences.get(&(*pool_id, *nullifier)).cloned().unwrap_or_default())
    }

    fn replace_preference_set(&self, pool_id: &PoolId, nullifier: &Nullifier, preferences: Vec<Preference>) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let key = (*pool_id, *nullifier);
        if !inner.preferences.contains_key(&key) {
            return Err(RendezvousError::CommitmentNotFound(pool_id.to_string()));
        }
        inner.preferences.insert(key, preferences);
        Ok(())
    }

    fn count_token_occurrences(&self, pool_id: &PoolId) -> Result<TokenCounts> {
        let inner = self.lock_inner()?;
        let mut counts = TokenCounts::new();
        for ((pool, _), set) in &inner.preferences {
            if pool != pool_id {
                continue;
            }
            for preference in set.iter().filter(|p| p.revealed) {
                *counts.entry(preference.token).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn count_revealed_preferences(&self, pool_id: &PoolId) -> Result<u64> {
        let inner = self.lock_inner()?;
        Ok(inner
            .preferences
            .iter()
            .filter(|((pool, _), _)| pool == pool_id)
            .map(|(_, set)| set.iter().filter(|p| p.revealed).count() as u64)
            .sum())
    }

    fn count_nullifiers(&self, pool_id: &PoolId) -> Result<u64> {
        Ok(self.lock_inner()?.preferences.keys().filter(|(pool, _)| pool == pool_id).count() as u64)
    }

    fn find_preference_by_token(&self, pool_id: &PoolId, token: &MatchToken) -> Result<Option<Preference>> {
        let inner = self.lock_inner()?;
        for ((pool, _), set) in &inner.preferences {
            if pool != pool_id {
                continue;
            }
            if let Some(found) = set.iter().find(|p| p.token == *token) {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    fn upsert_match_result(&self, result: MatchResult) -> Result<()> {
        self.lock_inner()?.results.insert(result.pool_id, result);
        Ok(())
    }

    fn get_match_result(&self, pool_id: &PoolId) -> Result<Option<MatchResult>> {
        Ok(self.lock_inner()?.results.get(pool_id).cloned())
    }

    fn put_psi_setup(&self, setup: PsiSetup) -> Result<()> {
        self.lock_inner()?.psi_setups.insert(setup.pool_id, setup);
        Ok(())
    }

    fn get_psi_setup(&self, pool_id: &PoolId) -> Result<Option<PsiSetup>> {
        Ok(self.lock_inner()?.psi_setups.get(pool_id).cloned())
    }

    fn enqueue_psi_request(&self, request: PendingPsiRequest) -> Result<()> {
        let mut inner = self.lock_inner()?;
        if inner.psi_requests.contains_key(&request.request_id) {
            return Err(RendezvousError::Internal(format!("psi request id collision: {}", request.request_id)));
        }
        inner.psi_requests.insert(request.request_id, request);
        Ok(())
    }

    fn get_psi_request(&self, request_id: &PsiRequestId) -> Result<Option<PendingPsiRequest>> {
        Ok(self.lock_inner()?.psi_requests.get(request_id).cloned())
    }

    fn list_psi_requests(&self, pool_id: &PoolId, status: PsiRequestStatus) -> Result<Vec<PendingPsiRequest>> {
        let inner = self.lock_inner()?;
        let mut list: Vec<PendingPsiRequest> =
            inner.psi_requests.values().filter(|r| r.pool_id == *pool_id && r.status == status).cloned().collect();
        list.sort_by_key(|r| r.created_at_ms);
        Ok(list)
    }

    fn update_psi_request_status(&self, request_id: &PsiRequestId, status: PsiRequestStatus) -> Result<()> {
        let mut inner = self.lock_inner()?;
        let request = inner
            .psi_requests
            .get_mut(request_id)
            .ok_or_else(|| RendezvousError::PsiRequestNotFound(request_id.to_string()))?;
        psi::ensure_valid_transition(request.status, status)?;
        request.status = status;
        Ok(())
    }

    fn insert_psi_response(&self, record: PsiResponseRecord) -> Result<()> {
        let mut inner = self.lock_inner()?;
        if inner.psi_responses.contains_key(&record.request_id) {
            return Err(RendezvousError::InvalidInput(format!("response already recorded for request {}", record.request_id)));
        }
        inner.psi_responses.insert(record.request_id, record);
        Ok(())
    }

    fn get_psi_response(&self, request_id: &PsiRequestId) -> Result<Option<PsiResponseRecord>> {
        Ok(self.lock_inner()?.psi_responses.get(request_id).cloned())
    }

    fn delete_psi_response(&self, request_id: &PsiRequestId) -> Result<()> {
        self.lock_inner()?.psi_responses.remove(request_id);
        Ok(())
    }
}
