use crate::fixtures::{self, PoolSpec};
use rendezvous_core::application::MatchDetector;
use rendezvous_core::foundation::RendezvousError;
use rendezvous_core::infrastructure::crypto::derive_match_token;
use rendezvous_core::infrastructure::storage::Store;

#[tokio::test]
async fn mutual_selection_yields_exactly_one_token() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    let charlie = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &bob, &[&alice]).await;
    fixtures::close_now(&env, &pool.pool_id);

    let result = env.facade.detect_matches(&pool.pool_id).await.expect("detect");
    let shared = derive_match_token(&alice, &bob.public(), &pool.pool_id);
    assert_eq!(result.matched_tokens, vec![shared]);
    assert_eq!(result.unique_participants, 2);

    let found = env.facade.discover_matches(&pool.pool_id, &alice, &[bob.public()]).expect("discover");
    assert_eq!(found, vec![bob.public()]);
    let empty = env.facade.discover_matches(&pool.pool_id, &alice, &[charlie.public()]).expect("discover");
    assert!(empty.is_empty());
    assert!(env.facade.check_match(&pool.pool_id, &bob, &alice.public()).expect("check"));
}

#[tokio::test]
async fn unilateral_selection_matches_nothing() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    fixtures::close_now(&env, &pool.pool_id);

    let result = env.facade.detect_matches(&pool.pool_id).await.expect("detect");
    assert!(result.matched_tokens.is_empty());
    // Decoys inflate the scanned rows beyond the single real token.
    assert!(result.total_submissions > 1);

    let found = env.facade.discover_matches(&pool.pool_id, &alice, &[bob.public()]).expect("discover");
    assert!(found.is_empty());
}

#[tokio::test]
async fn triangle_produces_three_tokens_and_pairwise_discovery() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    let charlie = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob, &charlie]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &bob, &[&alice, &charlie]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &charlie, &[&alice, &bob]).await;
    fixtures::close_now(&env, &pool.pool_id);

    let result = env.facade.detect_matches(&pool.pool_id).await.expect("detect");
    assert_eq!(result.matched_tokens.len(), 3);

    let alice_matches =
        env.facade.discover_matches(&pool.pool_id, &alice, &[bob.public(), charlie.public()]).expect("discover");
    assert_eq!(alice_matches.len(), 2);
    let bob_matches =
        env.facade.discover_matches(&pool.pool_id, &bob, &[alice.public(), charlie.public()]).expect("discover");
    assert_eq!(bob_matches.len(), 2);
}

#[tokio::test]
async fn larger_pool_counts_pairs_and_participants() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let people: Vec<_> = (0..10).map(|_| fixtures::keypair()).collect();

    // Mutual pairs 0↔1 and 2↔3, unilateral 4→5 and 5→6.
    fixtures::submit_selections(&env, &pool.pool_id, &people[0], &[&people[1]]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &people[1], &[&people[0]]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &people[2], &[&people[3]]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &people[3], &[&people[2]]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &people[4], &[&people[5]]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &people[5], &[&people[6]]).await;
    fixtures::close_now(&env, &pool.pool_id);

    let result = env.facade.detect_matches(&pool.pool_id).await.expect("detect");
    assert_eq!(result.matched_tokens.len(), 2);
    assert_eq!(result.unique_participants, 6);
}

#[tokio::test]
async fn detection_is_idempotent_and_attests_once() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &bob, &[&alice]).await;
    fixtures::close_now(&env, &pool.pool_id);

    let first = env.facade.detect_matches(&pool.pool_id).await.expect("detect");
    assert!(first.attestation.is_some());
    assert_eq!(env.attestation.attest_calls(), 1);

    let second = env.facade.detect_matches(&pool.pool_id).await.expect("detect again");
    assert_eq!(first.detected_at_ms, second.detected_at_ms);
    assert_eq!(first.result_hash, second.result_hash);
    assert_eq!(env.attestation.attest_calls(), 1, "repeat detect must not attest again");
}

#[tokio::test]
async fn detection_requires_a_closed_pool() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let premature = env.facade.detect_matches(&pool.pool_id).await;
    assert!(matches!(premature, Err(RendezvousError::InvalidInput(_))));
}

#[tokio::test]
async fn integrity_verification_catches_tampering() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &bob, &[&alice]).await;
    fixtures::close_now(&env, &pool.pool_id);

    let result = env.facade.detect_matches(&pool.pool_id).await.expect("detect");
    let clean = env.facade.verify_match_integrity(&pool.pool_id).expect("verify");
    assert!(clean.consistent, "errors: {:?}", clean.errors);

    // Tamper with the stored result; verification reports, never throws.
    let mut forged = result.clone();
    forged.matched_tokens.push(rendezvous_core::foundation::MatchToken::new([0xFF; 32]));
    env.store.upsert_match_result(forged).expect("overwrite");
    let report = env.facade.verify_match_integrity(&pool.pool_id).expect("verify");
    assert!(!report.consistent);
    assert!(!report.errors.is_empty());
}

#[tokio::test]
async fn ephemeral_pools_drop_participants_after_detection() {
    let env = fixtures::env();
    let pool = fixtures::make_pool(&env, PoolSpec { ephemeral: true, ..PoolSpec::default() });
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();

    env.facade
        .register_participant(&pool.pool_id, alice.public(), "alice".to_string(), None, Default::default(), None)
        .await
        .expect("register");
    env.facade
        .register_participant(&pool.pool_id, bob.public(), "bob".to_string(), None, Default::default(), None)
        .await
        .expect("register");
    assert_eq!(env.facade.list_participants(&pool.pool_id).expect("list").len(), 2);

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    fixtures::submit_selections(&env, &pool.pool_id, &bob, &[&alice]).await;
    fixtures::close_now(&env, &pool.pool_id);
    let result = env.facade.detect_matches(&pool.pool_id).await.expect("detect");

    // Profiles are gone; the anonymous token list remains.
    assert!(env.facade.list_participants(&pool.pool_id).expect("list").is_empty());
    assert_eq!(result.matched_tokens.len(), 1);

    // Discovery still works from the retained result.
    let discovered = MatchDetector::discover(&result, &alice, &[bob.public()], &pool.pool_id);
    assert_eq!(discovered, vec![bob.public()]);
}
