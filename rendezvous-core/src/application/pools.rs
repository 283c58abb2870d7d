use crate::domain::gate::Gate;
use crate::domain::pool::{effective_status, Pool, PoolStatus};
use crate::foundation::{
    now_millis, AgreementPublicKey, PoolId, RendezvousError, Result, SigningPublicKey, TimestampMs, MAX_POOL_NAME_LEN,
};
use crate::infrastructure::crypto::envelope::{verify_request, SignedRequest};
use crate::infrastructure::crypto::random_bytes32;
use crate::infrastructure::storage::Store;
use log::info;
use rand::rngs::OsRng;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct CreatePoolRequest {
    pub name: String,
    pub description: Option<String>,
    pub creator_agreement_key: AgreementPublicKey,
    pub creator_signing_key: SigningPublicKey,
    pub commit_deadline_ms: Option<TimestampMs>,
    pub reveal_deadline_ms: TimestampMs,
    /// Defaults to an allow-list holding only the creator.
    pub gate: Option<Gate>,
    pub max_preferences: Option<u32>,
    pub ephemeral: bool,
    pub requires_invite: bool,
}

pub struct PoolManager {
    store: Arc<dyn Store>,
}

impl PoolManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn create(&self, request: CreatePoolRequest) -> Result<Pool> {
        let now_ms = now_millis();

        let name = request.name.trim();
        if name.is_empty() {
            return Err(RendezvousError::InvalidInput("pool name must not be empty".to_string()));
        }
        if name.len() > MAX_POOL_NAME_LEN {
            return Err(RendezvousError::InvalidInput(format!("pool name exceeds {MAX_POOL_NAME_LEN} characters")));
        }
        if request.reveal_deadline_ms <= now_ms {
            return Err(RendezvousError::InvalidInput("reveal deadline must be in the future".to_string()));
        }
        if let Some(commit_deadline) = request.commit_deadline_ms {
            if commit_deadline <= now_ms {
                return Err(RendezvousError::InvalidInput("commit deadline must be in the future".to_string()));
            }
            if commit_deadline >= request.reveal_deadline_ms {
                return Err(RendezvousError::InvalidInput("commit deadline must precede the reveal deadline".to_string()));
            }
        }
        if let Some(limit) = request.max_preferences {
            if limit == 0 {
                return Err(RendezvousError::InvalidInput("max preferences must be at least 1".to_string()));
            }
        }

        let gate = request.gate.unwrap_or(Gate::AllowList { keys: vec![request.creator_agreement_key] });
        gate.validate().map_err(RendezvousError::InvalidInput)?;

        let status = if request.commit_deadline_ms.is_some() { PoolStatus::Commit } else { PoolStatus::Open };
        let pool = Pool {
            pool_id: PoolId::new(random_bytes32(&mut OsRng)),
            name: name.to_string(),
            description: request.description,
            creator_agreement_key: request.creator_agreement_key,
            creator_signing_key: request.creator_signing_key,
            commit_deadline_ms: request.commit_deadline_ms,
            reveal_deadline_ms: request.reveal_deadline_ms,
            gate,
            max_preferences: request.max_preferences,
            ephemeral: request.ephemeral,
            requires_invite: request.requires_invite,
            status,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            psi_setup_at_ms: None,
        };

        self.store.insert_pool(pool.clone())?;
        info!("pool created pool_id={} status={} reveal_deadline_ms={}", pool.pool_id, pool.status, pool.reveal_deadline_ms);
        Ok(pool)
    }

    pub fn get(&self, pool_id: &PoolId) -> Result<Pool> {
        self.store.get_pool(pool_id)?.ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))
    }

    pub fn list(&self) -> Result<Vec<Pool>> {
        self.store.list_pools()
    }

    pub fn list_by_status(&self, status: PoolStatus) -> Result<Vec<Pool>> {
        self.store.list_pools_by_status(status)
    }

    pub fn list_by_creator(&self, creator: &SigningPublicKey) -> Result<Vec<Pool>> {
        self.store.list_pools_by_creator(creator)
    }

    pub fn effective(&self, pool: &Pool) -> PoolStatus {
        effective_status(pool, now_millis())
    }

    /// Persist the effective status when it diverges from the stored one.
    pub fn update_status(&self, pool_id: &PoolId) -> Result<PoolStatus> {
        let pool = self.get(pool_id)?;
        let effective = self.effective(&pool);
        if effective != pool.status {
            self.store.update_pool_status(pool_id, effective, now_millis())?;
            info!("pool status updated pool_id={} from={} to={}", pool_id, pool.status, effective);
        }
        Ok(effective)
    }

    /// Administrative close, authenticated against the creator signing key.
    pub fn close(&self, pool_id: &PoolId, signed: &SignedRequest) -> Result<()> {
        let pool = self.get(pool_id)?;
        verify_request(&pool.creator_signing_key, signed, "close", now_millis())?;
        self.force_close(pool_id)
    }

    /// Deadline-path close used by the scheduler; no owner signature involved.
    pub fn force_close(&self, pool_id: &PoolId) -> Result<()> {
        let pool = self.get(pool_id)?;
        if pool.status == PoolStatus::Closed {
            return Ok(());
        }
        self.store.update_pool_status(pool_id, PoolStatus::Closed, now_millis())?;
        info!("pool closed pool_id={}", pool_id);
        Ok(())
    }
}
