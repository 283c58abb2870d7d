//! Property tests for the replicated document: merges must be commutative,
//! associative, and idempotent regardless of write order.

use proptest::prelude::*;
use rendezvous_core::domain::crdt::{FederationDocument, LwwRegister, PoolSummary};
use rendezvous_core::domain::pool::PoolStatus;
use rendezvous_core::foundation::{InstanceId, PoolId};

fn summary(name: String) -> PoolSummary {
    PoolSummary {
        name,
        description: None,
        status: PoolStatus::Open,
        commit_deadline_ms: None,
        reveal_deadline_ms: 1,
        requires_invite: false,
    }
}

#[derive(Clone, Debug)]
struct Write {
    pool: u8,
    name: String,
    timestamp: u64,
    instance: u8,
}

fn write_strategy() -> impl Strategy<Value = Write> {
    (0u8..4, "[a-z]{1,8}", 1u64..1000, 0u8..3).prop_map(|(pool, name, timestamp, instance)| Write {
        pool,
        name,
        timestamp,
        instance,
    })
}

fn document_from(writes: &[Write]) -> FederationDocument {
    let mut doc = FederationDocument::new();
    for write in writes {
        let pool_id = PoolId::new([write.pool; 32]);
        doc.pool_entry(&pool_id).summary.set(summary(write.name.clone()), write.timestamp);
        let instance = InstanceId::from(format!("instance-{}", write.instance));
        let counter = doc.clock.get(&instance).copied().unwrap_or(0).max(write.timestamp);
        doc.clock.insert(instance, counter);
    }
    doc
}

fn pool_names(doc: &FederationDocument) -> Vec<(PoolId, Option<String>, u64)> {
    doc.pools
        .iter()
        .map(|(id, entry)| (*id, entry.summary.value().map(|s| s.name.clone()), entry.summary.timestamp_ms()))
        .collect()
}

proptest! {
    #[test]
    fn register_merge_is_commutative(ts_a in 1u64..1000, ts_b in 1u64..1000) {
        let a = LwwRegister::with_value("a", ts_a);
        let b = LwwRegister::with_value("b", ts_b);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        prop_assert_eq!(ab.timestamp_ms(), ba.timestamp_ms());
        // Equal timestamps may keep either side's value; document merges
        // always feed registers with distinct write stamps.
        if ts_a != ts_b {
            prop_assert_eq!(ab.value(), ba.value());
        }
    }

    #[test]
    fn document_merge_is_commutative(
        writes_a in prop::collection::vec(write_strategy(), 0..12),
        writes_b in prop::collection::vec(write_strategy(), 0..12),
    ) {
        // Distinct timestamps per side keep tie-breaking out of the picture.
        let writes_a: Vec<Write> = writes_a.into_iter().map(|mut w| { w.timestamp *= 2; w }).collect();
        let writes_b: Vec<Write> = writes_b.into_iter().map(|mut w| { w.timestamp = w.timestamp * 2 + 1; w }).collect();

        let a = document_from(&writes_a);
        let b = document_from(&writes_b);

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        prop_assert_eq!(pool_names(&ab), pool_names(&ba));
        prop_assert_eq!(ab.clock, ba.clock);
    }

    #[test]
    fn document_merge_is_associative(
        writes_a in prop::collection::vec(write_strategy(), 0..8),
        writes_b in prop::collection::vec(write_strategy(), 0..8),
        writes_c in prop::collection::vec(write_strategy(), 0..8),
    ) {
        let writes_a: Vec<Write> = writes_a.into_iter().map(|mut w| { w.timestamp *= 3; w }).collect();
        let writes_b: Vec<Write> = writes_b.into_iter().map(|mut w| { w.timestamp = w.timestamp * 3 + 1; w }).collect();
        let writes_c: Vec<Write> = writes_c.into_iter().map(|mut w| { w.timestamp = w.timestamp * 3 + 2; w }).collect();

        let a = document_from(&writes_a);
        let b = document_from(&writes_b);
        let c = document_from(&writes_c);

        let mut ab_c = a.clone();
        ab_c.merge(&b);
        ab_c.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut a_bc = a.clone();
        a_bc.merge(&bc);

        prop_assert_eq!(pool_names(&ab_c), pool_names(&a_bc));
        prop_assert_eq!(ab_c.clock, a_bc.clock);
    }

    #[test]
    fn document_merge_is_idempotent(writes in prop::collection::vec(write_strategy(), 0..12)) {
        let mut doc = document_from(&writes);
        let snapshot = doc.clone();
        let changed = doc.merge(&snapshot);
        prop_assert!(!changed);
        prop_assert_eq!(pool_names(&doc), pool_names(&snapshot));
    }
}
