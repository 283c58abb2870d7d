use crate::fixtures::{self, PoolSpec};
use rendezvous_core::application::SubmissionRequest;
use rendezvous_core::domain::gate::Gate;
use rendezvous_core::foundation::{MatchToken, RendezvousError, DECOY_MAX, DECOY_MIN};
use rendezvous_core::infrastructure::adapters::TokenAuthority;
use rendezvous_core::infrastructure::storage::Store;

#[tokio::test]
async fn duplicate_nullifier_is_rejected_and_first_submission_persists() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    let charlie = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    let nullifier = fixtures::nullifier_for(&alice, &pool.pool_id);
    let first = env.store.list_preferences(&pool.pool_id, &nullifier).expect("list");

    let retry = env.facade.submit(fixtures::request_for(&alice, &[&charlie], &pool.pool_id)).await;
    assert!(matches!(retry, Err(RendezvousError::DuplicateNullifier)));

    let after = env.store.list_preferences(&pool.pool_id, &nullifier).expect("list");
    assert_eq!(first.len(), after.len());
    let first_tokens: Vec<MatchToken> = first.iter().map(|p| p.token).collect();
    let after_tokens: Vec<MatchToken> = after.iter().map(|p| p.token).collect();
    assert_eq!(first_tokens, after_tokens);
}

#[tokio::test]
async fn preference_limit_counts_real_tokens_only() {
    let env = fixtures::env();
    let pool = fixtures::make_pool(&env, PoolSpec { max_preferences: Some(2), ..PoolSpec::default() });
    let alice = fixtures::keypair();
    let others: Vec<_> = (0..3).map(|_| fixtures::keypair()).collect();
    let refs: Vec<_> = others.iter().collect();

    let over_limit = env.facade.submit(fixtures::request_for(&alice, &refs, &pool.pool_id)).await;
    assert!(matches!(over_limit, Err(RendezvousError::PreferenceLimitExceeded { submitted: 3, limit: 2 })));

    // At the limit the submission lands, and the server still pads decoys
    // beyond it.
    env.facade.submit(fixtures::request_for(&alice, &refs[..2], &pool.pool_id)).await.expect("submission at limit");
    let stored = env
        .store
        .list_preferences(&pool.pool_id, &fixtures::nullifier_for(&alice, &pool.pool_id))
        .expect("list");
    assert!(stored.len() > 2);
}

#[tokio::test]
async fn decoys_inflate_counts_within_the_padded_range() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    let charlie = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob, &charlie]).await;
    let stored = env
        .store
        .list_preferences(&pool.pool_id, &fixtures::nullifier_for(&alice, &pool.pool_id))
        .expect("list");

    let padding = stored.len() - 2;
    assert!((DECOY_MIN..=DECOY_MAX).contains(&padding), "padding {padding} outside [{DECOY_MIN}, {DECOY_MAX}]");
    // Direct phase: every row is revealed and shaped identically.
    assert!(stored.iter().all(|p| p.revealed && p.commitment.is_none()));
}

#[tokio::test]
async fn commit_phase_decoys_carry_valid_commitments() {
    let env = fixtures::env();
    let pool = fixtures::make_pool(
        &env,
        PoolSpec { commit_offset_ms: Some(fixtures::HOUR_MS / 2), ..PoolSpec::default() },
    );
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    let stored = env
        .store
        .list_preferences(&pool.pool_id, &fixtures::nullifier_for(&alice, &pool.pool_id))
        .expect("list");

    assert!(stored.len() >= 1 + DECOY_MIN);
    for preference in &stored {
        assert!(!preference.revealed);
        let commitment = preference.commitment.expect("commit phase stores commitments");
        assert!(rendezvous_core::infrastructure::crypto::verify_commitment(&preference.token, &commitment));
    }
}

#[tokio::test]
async fn submission_to_closed_pool_is_rejected() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    fixtures::close_now(&env, &pool.pool_id);

    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    let rejected = env.facade.submit(fixtures::request_for(&alice, &[&bob], &pool.pool_id)).await;
    assert!(matches!(rejected, Err(RendezvousError::PoolClosed(_))));
}

#[tokio::test]
async fn invite_enforcement_fails_closed_when_verifier_is_down() {
    let env = fixtures::env();
    let pool = fixtures::make_pool(
        &env,
        PoolSpec {
            gate: Some(Gate::Token { issuer: "issuer-a".to_string() }),
            requires_invite: true,
            ..PoolSpec::default()
        },
    );
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();

    // No proof at all: a permanent eligibility failure.
    let missing = env.facade.submit(fixtures::request_for(&alice, &[&bob], &pool.pool_id)).await;
    assert!(matches!(missing, Err(RendezvousError::InvalidEligibilityProof(_))));

    // Verifier outage with a proof attached: transient service error, not a
    // silent accept.
    let token = env.authority.request_token("submit").await.expect("issue");
    env.authority.set_unreachable(true);
    let mut request = fixtures::request_for(&alice, &[&bob], &pool.pool_id);
    request.proof = Some(token.clone());
    let outage = env.facade.submit(request).await;
    assert!(matches!(outage, Err(RendezvousError::ServiceUnavailable { .. })));

    // Verifier back up: the same proof admits the submission.
    env.authority.set_unreachable(false);
    let mut request = fixtures::request_for(&alice, &[&bob], &pool.pool_id);
    request.proof = Some(token);
    env.facade.submit(request).await.expect("submission with valid proof");
}

#[tokio::test]
async fn reveal_consumes_each_token_once_and_rejects_leftovers() {
    let env = fixtures::env();
    let pool = fixtures::make_pool(
        &env,
        PoolSpec { commit_offset_ms: Some(50), reveal_offset_ms: fixtures::HOUR_MS, ..PoolSpec::default() },
    );
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    let tokens = fixtures::tokens_for(&alice, &[&bob], &pool.pool_id);
    let nullifier = fixtures::nullifier_for(&alice, &pool.pool_id);

    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;

    // Let the commit window lapse so the pool enters its reveal phase.
    tokio::time::sleep(std::time::Duration::from_millis(80)).await;

    let bogus = vec![MatchToken::new([0xEE; 32])];
    let mismatch = env.facade.reveal(&pool.pool_id, bogus, &nullifier);
    assert!(matches!(mismatch, Err(RendezvousError::CommitmentMismatch)));

    let revealed = env.facade.reveal(&pool.pool_id, tokens.clone(), &nullifier).expect("reveal");
    assert_eq!(revealed, 1);

    // All rows are now revealed: the real one plus auto-revealed decoys.
    let stored = env.store.list_preferences(&pool.pool_id, &nullifier).expect("list");
    assert!(stored.iter().all(|p| p.revealed));
    assert!(stored.iter().any(|p| p.token == tokens[0]));

    let unknown_nullifier = fixtures::nullifier_for(&bob, &pool.pool_id);
    let missing = env.facade.reveal(&pool.pool_id, tokens, &unknown_nullifier);
    assert!(matches!(missing, Err(RendezvousError::CommitmentNotFound(_))));
}

#[tokio::test]
async fn reveal_outside_reveal_phase_is_rejected() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;

    let nullifier = fixtures::nullifier_for(&alice, &pool.pool_id);
    let tokens = fixtures::tokens_for(&alice, &[&bob], &pool.pool_id);
    let rejected = env.facade.reveal(&pool.pool_id, tokens, &nullifier);
    assert!(matches!(rejected, Err(RendezvousError::PoolNotInRevealPhase { .. })));
}

#[tokio::test]
async fn reveal_entries_attach_to_their_preference() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    let token = fixtures::tokens_for(&alice, &[&bob], &pool.pool_id)[0];

    let mut request = fixtures::request_for(&alice, &[&bob], &pool.pool_id);
    request.reveal_entries = vec![rendezvous_core::application::RevealEntry {
        match_token: token,
        encrypted_reveal: vec![1, 2, 3],
    }];
    env.facade.submit(request).await.expect("submission");

    let stored = env
        .store
        .list_preferences(&pool.pool_id, &fixtures::nullifier_for(&alice, &pool.pool_id))
        .expect("list");
    let real = stored.iter().find(|p| p.token == token).expect("real preference");
    assert_eq!(real.encrypted_reveal.as_deref(), Some(&[1u8, 2, 3][..]));
    // Decoys carry none.
    assert!(stored.iter().filter(|p| p.token != token).all(|p| p.encrypted_reveal.is_none()));
}
