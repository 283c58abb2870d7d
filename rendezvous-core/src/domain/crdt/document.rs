use crate::domain::crdt::lww::LwwRegister;
use crate::domain::pool::PoolStatus;
use crate::foundation::{AgreementPublicKey, InstanceId, MatchToken, PoolId, TimestampMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A federation peer as advertised in handshakes and sync messages.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct InstanceRecord {
    pub instance_id: InstanceId,
    pub name: String,
    pub endpoint: String,
    pub public_key: AgreementPublicKey,
}

/// The replicable slice of a pool's metadata.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PoolSummary {
    pub name: String,
    pub description: Option<String>,
    pub status: PoolStatus,
    pub commit_deadline_ms: Option<TimestampMs>,
    pub reveal_deadline_ms: TimestampMs,
    pub requires_invite: bool,
}

/// Federated pool entry. Each field is its own LWW register so concurrent
/// edits to different fields merge without clobbering each other.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FederatedPool {
    pub summary: LwwRegister<PoolSummary>,
    pub owner_instance: LwwRegister<InstanceId>,
    /// Needed so anyone can encrypt join payloads for the owner.
    pub owner_agreement_key: LwwRegister<AgreementPublicKey>,
    pub matched_tokens: LwwRegister<Vec<MatchToken>>,
}

impl FederatedPool {
    pub fn merge(&mut self, other: &FederatedPool) -> bool {
        let mut changed = self.summary.merge(&other.summary);
        changed |= self.owner_instance.merge(&other.owner_instance);
        changed |= self.owner_agreement_key.merge(&other.owner_agreement_key);
        changed |= self.matched_tokens.merge(&other.matched_tokens);
        changed
    }

    /// Most recent write across the entry's fields, used for delta sync.
    pub fn latest_timestamp_ms(&self) -> u64 {
        self.summary
            .timestamp_ms()
            .max(self.owner_instance.timestamp_ms())
            .max(self.owner_agreement_key.timestamp_ms())
            .max(self.matched_tokens.timestamp_ms())
    }
}

/// The single replicated document: instance and pool maps plus a version
/// vector (one counter per instance) for convergence diagnostics.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FederationDocument {
    pub instances: BTreeMap<InstanceId, LwwRegister<InstanceRecord>>,
    pub pools: BTreeMap<PoolId, FederatedPool>,
    pub clock: BTreeMap<InstanceId, u64>,
}

impl FederationDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_instance(&mut self, record: InstanceRecord, now_ms: u64) -> bool {
        self.instances.entry(record.instance_id.clone()).or_default().set(record, now_ms)
    }

    pub fn pool_entry(&mut self, pool_id: &PoolId) -> &mut FederatedPool {
        self.pools.entry(*pool_id).or_default()
    }

    pub fn instance(&self, instance_id: &InstanceId) -> Option<&InstanceRecord> {
        self.instances.get(instance_id).and_then(|reg| reg.value())
    }

    pub fn bump_clock(&mut self, instance_id: &InstanceId) -> u64 {
        let counter = self.clock.entry(instance_id.clone()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Merge a remote document (or delta) into this one. Returns whether
    /// anything changed locally.
    pub fn merge(&mut self, other: &FederationDocument) -> bool {
        let mut changed = false;

        for (instance_id, register) in &other.instances {
            changed |= self.instances.entry(instance_id.clone()).or_default().merge(register);
        }

        for (pool_id, entry) in &other.pools {
            changed |= self.pools.entry(*pool_id).or_default().merge(entry);
        }

        for (instance_id, counter) in &other.clock {
            let local = self.clock.entry(instance_id.clone()).or_insert(0);
            if *counter > *local {
                *local = *counter;
                changed = true;
            }
        }

        changed
    }

    /// Entries written after `since_ms`, for incremental sync. The clock map
    /// is always carried so peers converge on it.
    pub fn delta_since(&self, since_ms: u64) -> FederationDocument {
        let instances = self
            .instances
            .iter()
            .filter(|(_, reg)| reg.timestamp_ms() > since_ms)
            .map(|(id, reg)| (id.clone(), reg.clone()))
            .collect();
        let pools =
            self.pools.iter().filter(|(_, entry)| entry.latest_timestamp_ms() > since_ms).map(|(id, e)| (*id, e.clone())).collect();
        FederationDocument { instances, pools, clock: self.clock.clone() }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.pools.is_empty()
    }
}
