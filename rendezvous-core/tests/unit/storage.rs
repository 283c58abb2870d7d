use crate::fixtures;
use rendezvous_core::domain::pool::PoolStatus;
use rendezvous_core::domain::psi::{PendingPsiRequest, PsiRequestStatus};
use rendezvous_core::domain::{Participant, Preference};
use rendezvous_core::foundation::{now_millis, MatchToken, Nullifier, PoolId, PsiRequestId, RendezvousError};
use rendezvous_core::infrastructure::storage::{MemoryStore, RocksStore, Store};
use std::collections::BTreeMap;

fn preference(pool_id: PoolId, nullifier: Nullifier, token: MatchToken, revealed: bool) -> Preference {
    Preference {
        pool_id,
        nullifier,
        token,
        commitment: None,
        revealed,
        submitted_at_ms: now_millis(),
        issuance_proof: None,
        encrypted_reveal: None,
    }
}

fn participant(pool_id: PoolId, key: [u8; 32]) -> Participant {
    Participant {
        pool_id,
        public_key: rendezvous_core::foundation::AgreementPublicKey::new(key),
        display_name: "p".to_string(),
        bio: None,
        profile: BTreeMap::new(),
        registered_at_ms: now_millis(),
    }
}

fn exercise_store(store: &dyn Store) {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    store.insert_pool(pool.clone()).expect("insert pool");
    let pool_id = pool.pool_id;

    // Duplicate pool ids are an internal error.
    assert!(store.insert_pool(pool.clone()).is_err());

    // Status transitions go through the lifecycle table.
    assert!(matches!(
        store.update_pool_status(&pool_id, PoolStatus::Commit, now_millis()),
        Err(RendezvousError::InvalidStateTransition { .. })
    ));
    store.update_pool_status(&pool_id, PoolStatus::Closed, now_millis()).expect("close");
    assert_eq!(store.get_pool(&pool_id).expect("get").expect("pool").status, PoolStatus::Closed);

    // Participant uniqueness on (pool, key).
    store.insert_participant(participant(pool_id, [1; 32])).expect("register");
    assert!(matches!(
        store.insert_participant(participant(pool_id, [1; 32])),
        Err(RendezvousError::AlreadyRegistered(_))
    ));
    store.insert_participant(participant(pool_id, [2; 32])).expect("register second");
    assert_eq!(store.count_participants(&pool_id).expect("count"), 2);
    assert_eq!(store.delete_participants(&pool_id).expect("purge"), 2);
    assert_eq!(store.count_participants(&pool_id).expect("count"), 0);

    // Preference sets are insert-if-absent per (pool, nullifier).
    let nullifier = Nullifier::new([5; 32]);
    let token_a = MatchToken::new([10; 32]);
    let token_b = MatchToken::new([11; 32]);
    store
        .insert_preference_set(
            &pool_id,
            &nullifier,
            vec![preference(pool_id, nullifier, token_a, true), preference(pool_id, nullifier, token_b, false)],
        )
        .expect("insert set");
    assert!(matches!(
        store.insert_preference_set(&pool_id, &nullifier, vec![preference(pool_id, nullifier, token_a, true)]),
        Err(RendezvousError::DuplicateNullifier)
    ));

    let other_nullifier = Nullifier::new([6; 32]);
    store
        .insert_preference_set(&pool_id, &other_nullifier, vec![preference(pool_id, other_nullifier, token_a, true)])
        .expect("insert second set");

    // Counts cover revealed rows only.
    let counts = store.count_token_occurrences(&pool_id).expect("counts");
    assert_eq!(counts.get(&token_a), Some(&2));
    assert_eq!(counts.get(&token_b), None);
    assert_eq!(store.count_revealed_preferences(&pool_id).expect("revealed"), 2);
    assert_eq!(store.count_nullifiers(&pool_id).expect("nullifiers"), 2);
    assert!(store.find_preference_by_token(&pool_id, &token_b).expect("find").is_some());

    // Replace flips reveal state atomically.
    let mut set = store.list_preferences(&pool_id, &nullifier).expect("list");
    for row in &mut set {
        row.revealed = true;
    }
    store.replace_preference_set(&pool_id, &nullifier, set).expect("replace");
    assert_eq!(store.count_revealed_preferences(&pool_id).expect("revealed"), 3);
    let ghost = Nullifier::new([7; 32]);
    assert!(store.replace_preference_set(&pool_id, &ghost, Vec::new()).is_err());

    // PSI queue statuses are monotone.
    let request_id = PsiRequestId::new([9; 32]);
    store
        .enqueue_psi_request(PendingPsiRequest {
            request_id,
            pool_id,
            client_request: vec![1, 2, 3],
            status: PsiRequestStatus::Pending,
            created_at_ms: now_millis(),
            auth_token_hash: None,
        })
        .expect("enqueue");
    assert_eq!(store.list_psi_requests(&pool_id, PsiRequestStatus::Pending).expect("list").len(), 1);
    store.update_psi_request_status(&request_id, PsiRequestStatus::Processing).expect("processing");
    store.update_psi_request_status(&request_id, PsiRequestStatus::Completed).expect("completed");
    assert!(matches!(
        store.update_psi_request_status(&request_id, PsiRequestStatus::Pending),
        Err(RendezvousError::InvalidStateTransition { .. })
    ));
}

#[test]
fn memory_store_contract() {
    let store = MemoryStore::new();
    exercise_store(&store);
}

#[test]
fn rocks_store_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = RocksStore::open_in_dir(dir.path()).expect("open");
    exercise_store(&store);
}

#[test]
fn rocks_store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let pool_id = pool.pool_id;

    {
        let store = RocksStore::open_in_dir(dir.path()).expect("open");
        store.insert_pool(pool).expect("insert");
        let nullifier = Nullifier::new([1; 32]);
        store
            .insert_preference_set(&pool_id, &nullifier, vec![preference(pool_id, nullifier, MatchToken::new([3; 32]), true)])
            .expect("insert set");
    }

    let store = RocksStore::open_in_dir(dir.path()).expect("reopen");
    assert!(store.get_pool(&pool_id).expect("get").is_some());
    assert_eq!(store.count_revealed_preferences(&pool_id).expect("count"), 1);
    store.health_check().expect("health");
}
