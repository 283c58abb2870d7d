use crate::domain::matching::MatchResult;
use crate::domain::pool::{ensure_valid_transition, Pool, PoolStatus};
use crate::domain::psi::{self, PendingPsiRequest, PsiRequestStatus, PsiResponseRecord, PsiSetup};
use crate::domain::{Participant, Preference};
use crate::foundation::{
    AgreementPublicKey, MatchToken, Nullifier, PoolId, PsiRequestId, RendezvousError, SigningPublicKey, TimestampMs,
};
use crate::infrastructure::storage::rocks::schema::*;
use crate::infrastructure::storage::traits::{Result, Store, TokenCounts};
use bincode::Options;
use log::{debug, info};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options as DbOptions, DB};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA_VERSION: u32 = 1;

/// Persistent store on RocksDB, one column family per entity.
pub struct RocksStore {
    db: Arc<DB>,
    /// Serializes read-modify-write sequences; single-key puts and gets go
    /// straight to the DB.
    write_lock: Mutex<()>,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening RocksStore path={}", path.display());

        let mut options = DbOptions::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);
        let descriptors: Vec<ColumnFamilyDescriptor> =
            ALL_CFS.iter().map(|name| ColumnFamilyDescriptor::new(*name, DbOptions::default())).collect();
        let db = DB::open_cf_descriptors(&options, path, descriptors)?;

        let store = Self { db: Arc::new(db), write_lock: Mutex::new(()) };
        store.check_schema_version()?;
        info!("RocksStore opened path={}", path.display());
        Ok(store)
    }

    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Self::open(dir.join("rendezvous"))
    }

    fn check_schema_version(&self) -> Result<()> {
        let cf = self.cf(CF_METADATA)?;
        match self.db.get_cf(cf, b"schema_version")? {
            None => {
                info!("initializing fresh db schema schema_version={}", SCHEMA_VERSION);
                self.db.put_cf(cf, b"schema_version", SCHEMA_VERSION.to_be_bytes())?;
                Ok(())
            }
            Some(bytes) if bytes.len() == 4 => {
                let stored = u32::from_be_bytes(bytes.as_slice().try_into().expect("length checked"));
                if stored == SCHEMA_VERSION {
                    Ok(())
                } else {
                    Err(RendezvousError::storage(
                        "open",
                        format!("schema version mismatch: stored={stored} supported={SCHEMA_VERSION}"),
                    ))
                }
            }
            Some(_) => Err(RendezvousError::storage("open", "corrupt schema version")),
        }
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| RendezvousError::storage("cf_handle", format!("missing column family: {name}")))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(bincode::DefaultOptions::new().with_fixint_encoding().serialize(value)?)
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(bincode::DefaultOptions::new().with_fixint_encoding().deserialize(bytes)?)
    }

    fn key_participant(pool_id: &PoolId, key: &AgreementPublicKey) -> Vec<u8> {
        KeyBuilder::with_capacity(65).bytes(pool_id.as_bytes()).sep().bytes(key.as_bytes()).build()
    }

    fn key_preference(pool_id: &PoolId, nullifier: &Nullifier) -> Vec<u8> {
        KeyBuilder::with_capacity(65).bytes(pool_id.as_bytes()).sep().bytes(nullifier.as_bytes()).build()
    }

    fn pool_prefix(pool_id: &PoolId) -> Vec<u8> {
        KeyBuilder::with_capacity(33).bytes(pool_id.as_bytes()).sep().build()
    }

    fn scan_prefix<T: serde::de::DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(prefix, rocksdb::Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(Self::decode(&value)?);
        }
        Ok(out)
    }

    fn get_pool_required(&self, pool_id: &PoolId) -> Result<Pool> {
        self.get_pool(pool_id)?.ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))
    }
}

impl Store for RocksStore {
    fn insert_pool(&self, pool: Pool) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| RendezvousError::storage("insert_pool", "write lock poisoned"))?;
        let cf = self.cf(CF_POOL)?;
        if self.db.get_cf(cf, pool.pool_id.as_bytes())?.is_some() {
            return Err(RendezvousError::Internal(format!("pool id collision: {}", pool.pool_id)));
        }
        self.db.put_cf(cf, pool.pool_id.as_bytes(), Self::encode(&pool)?)?;
        Ok(())
    }

    fn get_pool(&self, pool_id: &PoolId) -> Result<Option<Pool>> {
        let cf = self.cf(CF_POOL)?;
        match self.db.get_cf(cf, pool_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_pools(&self) -> Result<Vec<Pool>> {
        let cf = self.cf(CF_POOL)?;
        let mut pools = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            pools.push(Self::decode::<Pool>(&value)?);
        }
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
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("update_pool_status", "write lock poisoned"))?;
        let mut pool = self.get_pool_required(pool_id)?;
        ensure_valid_transition(pool.status, status)?;
        pool.status = status;
        pool.updated_at_ms = now_ms;
        self.db.put_cf(self.cf(CF_POOL)?, pool_id.as_bytes(), Self::encode(&pool)?)?;
        Ok(())
    }

    fn set_pool_psi_setup_at(&self, pool_id: &PoolId, at_ms: TimestampMs) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("set_pool_psi_setup_at", "write lock poisoned"))?;
        let mut pool = self.get_pool_required(pool_id)?;
        pool.psi_setup_at_ms = Some(at_ms);
        pool.updated_at_ms = at_ms;
        self.db.put_cf(self.cf(CF_POOL)?, pool_id.as_bytes(), Self::encode(&pool)?)?;
        Ok(())
    }

    fn insert_participant(&self, participant: Participant) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("insert_participant", "write lock poisoned"))?;
        let cf = self.cf(CF_PARTICIPANT)?;
        let key = Self::key_participant(&participant.pool_id, &participant.public_key);
        if self.db.get_cf(cf, &key)?.is_some() {
            return Err(RendezvousError::AlreadyRegistered(participant.pool_id.to_string()));
        }
        self.db.put_cf(cf, &key, Self::encode(&participant)?)?;
        Ok(())
    }

    fn get_participant(&self, pool_id: &PoolId, key: &AgreementPublicKey) -> Result<Option<Participant>> {
        let cf = self.cf(CF_PARTICIPANT)?;
        match self.db.get_cf(cf, Self::key_participant(pool_id, key))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_participants(&self, pool_id: &PoolId) -> Result<Vec<Participant>> {
        let mut list: Vec<Participant> = self.scan_prefix(CF_PARTICIPANT, &Self::pool_prefix(pool_id))?;
        list.sort_by_key(|p| p.registered_at_ms);
        Ok(list)
    }

    fn count_participants(&self, pool_id: &PoolId) -> Result<u64> {
        Ok(self.list_participants(pool_id)?.len() as u64)
    }

    fn delete_participants(&self, pool_id: &PoolId) -> Result<usize> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("delete_participants", "write lock poisoned"))?;
        let cf = self.cf(CF_PARTICIPANT)?;
        let prefix = Self::pool_prefix(pool_id);
        let mut keys = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(&prefix, rocksdb::Direction::Forward)) {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            keys.push(key);
        }
        for key in &keys {
            self.db.delete_cf(cf, key)?;
        }
        Ok(keys.len())
    }

    fn insert_preference_set(&self, pool_id: &PoolId, nullifier: &Nullifier, preferences: Vec<Preference>) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("insert_preference_set", "write lock poisoned"))?;
        let cf = self.cf(CF_PREFERENCE)?;
        let key = Self::key_preference(pool_id, nullifier);
        if self.db.get_cf(cf, &key)?.is_some() {
            return Err(RendezvousError::DuplicateNullifier);
        }
        self.db.put_cf(cf, &key, Self::encode(&preferences)?)?;
        Ok(())
    }

    fn list_preferences(&self, pool_id: &PoolId, nullifier: &Nullifier) -> Result<Vec<Preference>> {
        let cf = self.cf(CF_PREFERENCE)?;
        match self.db.get_cf(cf, Self::key_preference(pool_id, nullifier))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn replace_preference_set(&self, pool_id: &PoolId, nullifier: &Nullifier, preferences: Vec<Preference>) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("replace_preference_set", "write lock poisoned"))?;
        let cf = self.cf(CF_PREFERENCE)?;
        let key = Self::key_preference(pool_id, nullifier);
        if self.db.get_cf(cf, &key)?.is_none() {
            return Err(RendezvousError::CommitmentNotFound(pool_id.to_string()));
        }
        self.db.put_cf(cf, &key, Self::encode(&preferences)?)?;
        Ok(())
    }

    fn count_token_occurrences(&self, pool_id: &PoolId) -> Result<TokenCounts> {
        let sets: Vec<Vec<Preference>> = self.scan_prefix(CF_PREFERENCE, &Self::pool_prefix(pool_id))?;
        let mut counts = TokenCounts::new();
        for set in sets {
            for preference in set.into_iter().filter(|p| p.revealed) {
                *counts.entry(preference.token).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn count_revealed_preferences(&self, pool_id: &PoolId) -> Result<u64> {
        let sets: Vec<Vec<Preference>> = self.scan_prefix(CF_PREFERENCE, &Self::pool_prefix(pool_id))?;
        Ok(sets.iter().map(|set| set.iter().filter(|p| p.revealed).count() as u64).sum())
    }

    fn count_nullifiers(&self, pool_id: &PoolId) -> Result<u64> {
        let sets: Vec<Vec<Preference>> = self.scan_prefix(CF_PREFERENCE, &Self::pool_prefix(pool_id))?;
        Ok(sets.len() as u64)
    }

    fn find_preference_by_token(&self, pool_id: &PoolId, token: &MatchToken) -> Result<Option<Preference>> {
        let sets: Vec<Vec<Preference>> = self.scan_prefix(CF_PREFERENCE, &Self::pool_prefix(pool_id))?;
        for set in sets {
            if let Some(found) = set.into_iter().find(|p| p.token == *token) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn upsert_match_result(&self, result: MatchResult) -> Result<()> {
        let cf = self.cf(CF_MATCH_RESULT)?;
        self.db.put_cf(cf, result.pool_id.as_bytes(), Self::encode(&result)?)?;
        Ok(())
    }

    fn get_match_result(&self, pool_id: &PoolId) -> Result<Option<MatchResult>> {
        let cf = self.cf(CF_MATCH_RESULT)?;
        match self.db.get_cf(cf, pool_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_psi_setup(&self, setup: PsiSetup) -> Result<()> {
        let cf = self.cf(CF_PSI_SETUP)?;
        self.db.put_cf(cf, setup.pool_id.as_bytes(), Self::encode(&setup)?)?;
        Ok(())
    }

    fn get_psi_setup(&self, pool_id: &PoolId) -> Result<Option<PsiSetup>> {
        let cf = self.cf(CF_PSI_SETUP)?;
        match self.db.get_cf(cf, pool_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn enqueue_psi_request(&self, request: PendingPsiRequest) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("enqueue_psi_request", "write lock poisoned"))?;
        let cf = self.cf(CF_PSI_REQUEST)?;
        if self.db.get_cf(cf, request.request_id.as_bytes())?.is_some() {
            return Err(RendezvousError::Internal(format!("psi request id collision: {}", request.request_id)));
        }
        self.db.put_cf(cf, request.request_id.as_bytes(), Self::encode(&request)?)?;
        Ok(())
    }

    fn get_psi_request(&self, request_id: &PsiRequestId) -> Result<Option<PendingPsiRequest>> {
        let cf = self.cf(CF_PSI_REQUEST)?;
        match self.db.get_cf(cf, request_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_psi_requests(&self, pool_id: &PoolId, status: PsiRequestStatus) -> Result<Vec<PendingPsiRequest>> {
        let cf = self.cf(CF_PSI_REQUEST)?;
        let mut list = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let request: PendingPsiRequest = Self::decode(&value)?;
            if request.pool_id == *pool_id && request.status == status {
                list.push(request);
            }
        }
        list.sort_by_key(|r| r.created_at_ms);
        Ok(list)
    }

    fn update_psi_request_status(&self, request_id: &PsiRequestId, status: PsiRequestStatus) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("update_psi_request_status", "write lock poisoned"))?;
        let mut request =
            self.get_psi_request(request_id)?.ok_or_else(|| RendezvousError::PsiRequestNotFound(request_id.to_string()))?;
        psi::ensure_valid_transition(request.status, status)?;
        request.status = status;
        self.db.put_cf(self.cf(CF_PSI_REQUEST)?, request_id.as_bytes(), Self::encode(&request)?)?;
        Ok(())
    }

    fn insert_psi_response(&self, record: PsiResponseRecord) -> Result<()> {
        let _guard =
            self.write_lock.lock().map_err(|_| RendezvousError::storage("insert_psi_response", "write lock poisoned"))?;
        let cf = self.cf(CF_PSI_RESPONSE)?;
        if self.db.get_cf(cf, record.request_id.as_bytes())?.is_some() {
            return Err(RendezvousError::InvalidInput(format!("response already recorded for request {}", record.request_id)));
        }
        self.db.put_cf(cf, record.request_id.as_bytes(), Self::encode(&record)?)?;
        Ok(())
    }

    fn get_psi_response(&self, request_id: &PsiRequestId) -> Result<Option<PsiResponseRecord>> {
        let cf = self.cf(CF_PSI_RESPONSE)?;
        match self.db.get_cf(cf, request_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn delete_psi_response(&self, request_id: &PsiRequestId) -> Result<()> {
        self.db.delete_cf(self.cf(CF_PSI_RESPONSE)?, request_id.as_bytes())?;
        Ok(())
    }

    fn health_check(&self) -> Result<()> {
        let cf = self.cf(CF_METADATA)?;
        self.db.get_cf(cf, b"schema_version")?;
        Ok(())
    }
}
