use crate::fixtures;
use rendezvous_core::application::{PsiResponseDelivery, PsiResponseSubmission};
use rendezvous_core::domain::psi::ecdh::{
    self, PsiClientRequest, PsiServerKey, PsiServerResponse, PsiSetupMessage,
};
use rendezvous_core::domain::psi::{PsiParams, PsiRequestStatus};
use rendezvous_core::foundation::{now_millis, MatchToken, PsiRequestId, RendezvousError};
use rendezvous_core::infrastructure::crypto::envelope::sign_request;
use rendezvous_core::infrastructure::crypto::sealed;
use rendezvous_core::infrastructure::storage::Store;
use rendezvous_core::infrastructure::adapters::TokenAuthority;
use rand::rngs::OsRng;

async fn matched_pool(env: &fixtures::TestEnv, pair_count: usize) -> rendezvous_core::domain::pool::Pool {
    let pool = fixtures::open_pool(env);
    for _ in 0..pair_count {
        let a = fixtures::keypair();
        let b = fixtures::keypair();
        fixtures::submit_selections(env, &pool.pool_id, &a, &[&b]).await;
        fixtures::submit_selections(env, &pool.pool_id, &b, &[&a]).await;
    }
    fixtures::close_now(env, &pool.pool_id);
    pool
}

#[tokio::test]
async fn owner_held_pipeline_end_to_end() {
    let env = fixtures::env();
    let pool = matched_pool(&env, 20).await;
    let psi = env.facade.psi();

    // 1. Owner installs a setup; the server key is sealed to the owner.
    let signed = sign_request(&env.owner_signing, "psi_setup", &pool.pool_id, now_millis());
    let setup = psi.create_setup(&pool.pool_id, &signed, PsiParams::default()).expect("setup");
    assert_eq!(setup.owner_key, env.owner_agreement.public());

    // 2. Client queues a blinded request; its inputs never appear in the
    //    stored record.
    let server_tokens: Vec<MatchToken> =
        env.store.count_token_occurrences(&pool.pool_id).expect("counts").into_keys().collect();
    let client_elements = vec![server_tokens[0], server_tokens[1], MatchToken::new([0xAB; 32])];
    let auth = env.authority.request_token("psi").await.expect("token");
    let (request, session) = ecdh::client_request(&client_elements, &mut OsRng);
    let request_id =
        psi.submit_request(&pool.pool_id, request.to_bytes().expect("encode"), Some(&auth)).expect("queue");

    let queued = env.store.get_psi_request(&request_id).expect("get").expect("queued");
    for element in &client_elements {
        assert!(!queued.client_request.windows(32).any(|w| w == element.as_bytes()), "plaintext input leaked");
    }

    assert!(matches!(psi.fetch_response(&request_id).expect("poll"), PsiResponseDelivery::Pending));

    // 3. Owner polls, unseals its key locally, processes, posts the batch.
    let signed = sign_request(&env.owner_signing, "psi_poll", &pool.pool_id, now_millis());
    let pending = psi.poll_pending(&pool.pool_id, &signed).expect("poll");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, PsiRequestStatus::Processing);

    let key_bytes: [u8; 32] =
        sealed::open(&env.owner_agreement, &setup.sealed_server_key).expect("unseal").try_into().expect("32 bytes");
    let server_key = PsiServerKey::from_bytes(key_bytes).expect("canonical");
    let parsed = PsiClientRequest::from_bytes(&pending[0].client_request).expect("decode");
    let response = ecdh::server_process(&server_key, &parsed).expect("process");

    let signed = sign_request(&env.owner_signing, "psi_respond", &pool.pool_id, now_millis());
    let outcomes = psi
        .submit_responses(
            &pool.pool_id,
            &signed,
            vec![PsiResponseSubmission { request_id, response: response.to_bytes().expect("encode") }],
        )
        .expect("respond");
    assert!(outcomes[0].accepted);

    // 4. Client polls and intersects locally.
    let PsiResponseDelivery::Ready { setup_message, response } = psi.fetch_response(&request_id).expect("poll")
    else {
        panic!("response should be ready");
    };
    let setup_message = PsiSetupMessage::from_bytes(&setup_message).expect("decode");
    let response = PsiServerResponse::from_bytes(&response).expect("decode");
    let intersection = ecdh::client_intersect(&session, &setup_message, &response).expect("intersect");
    assert_eq!(intersection, vec![server_tokens[0], server_tokens[1]]);
}

#[tokio::test]
async fn requests_without_setup_or_before_close_are_rejected() {
    let env = fixtures::env();
    let psi = env.facade.psi();

    let open = fixtures::open_pool(&env);
    let (request, _) = ecdh::client_request(&[MatchToken::new([1; 32])], &mut OsRng);
    let encoded = request.to_bytes().expect("encode");

    let premature = psi.submit_request(&open.pool_id, encoded.clone(), None);
    assert!(matches!(premature, Err(RendezvousError::InvalidInput(_))));

    fixtures::close_now(&env, &open.pool_id);
    let no_setup = psi.submit_request(&open.pool_id, encoded, None);
    assert!(matches!(no_setup, Err(RendezvousError::PsiSetupMissing(_))));
}

#[tokio::test]
async fn oversized_client_sets_are_rejected() {
    let env = fixtures::env();
    let pool = matched_pool(&env, 1).await;
    let psi = env.facade.psi();

    let signed = sign_request(&env.owner_signing, "psi_setup", &pool.pool_id, now_millis());
    let params = PsiParams { max_client_elements: 2, ..PsiParams::default() };
    psi.create_setup(&pool.pool_id, &signed, params).expect("setup");

    let elements: Vec<MatchToken> = (0..3u8).map(|i| MatchToken::new([i; 32])).collect();
    let (request, _) = ecdh::client_request(&elements, &mut OsRng);
    let rejected = psi.submit_request(&pool.pool_id, request.to_bytes().expect("encode"), None);
    assert!(matches!(rejected, Err(RendezvousError::InvalidInput(_))));
}

#[tokio::test]
async fn owner_endpoints_require_the_owner_signature() {
    let env = fixtures::env();
    let pool = matched_pool(&env, 1).await;
    let psi = env.facade.psi();

    let intruder = rendezvous_core::infrastructure::crypto::SigningKeypair::generate(&mut OsRng);
    let forged = sign_request(&intruder, "psi_setup", &pool.pool_id, now_millis());
    assert!(matches!(
        psi.create_setup(&pool.pool_id, &forged, PsiParams::default()),
        Err(RendezvousError::Unauthorized(_))
    ));

    let signed = sign_request(&env.owner_signing, "psi_setup", &pool.pool_id, now_millis());
    psi.create_setup(&pool.pool_id, &signed, PsiParams::default()).expect("setup");

    let forged = sign_request(&intruder, "psi_poll", &pool.pool_id, now_millis());
    assert!(matches!(psi.poll_pending(&pool.pool_id, &forged), Err(RendezvousError::Unauthorized(_))));
}

#[tokio::test]
async fn completed_and_missing_requests_surface_as_item_errors() {
    let env = fixtures::env();
    let pool = matched_pool(&env, 1).await;
    let psi = env.facade.psi();

    let signed = sign_request(&env.owner_signing, "psi_setup", &pool.pool_id, now_millis());
    psi.create_setup(&pool.pool_id, &signed, PsiParams::default()).expect("setup");

    let (request, _) = ecdh::client_request(&[MatchToken::new([1; 32])], &mut OsRng);
    let request_id = psi.submit_request(&pool.pool_id, request.to_bytes().expect("encode"), None).expect("queue");

    let signed = sign_request(&env.owner_signing, "psi_respond", &pool.pool_id, now_millis());
    let outcomes = psi
        .submit_responses(
            &pool.pool_id,
            &signed,
            vec![
                PsiResponseSubmission { request_id, response: vec![0; 8] },
                PsiResponseSubmission { request_id, response: vec![0; 8] },
                PsiResponseSubmission { request_id: PsiRequestId::new([9; 32]), response: vec![0; 8] },
            ],
        )
        .expect("batch never fails as a whole");

    assert!(outcomes[0].accepted, "first response lands");
    assert!(!outcomes[1].accepted, "second response for the same request is an item error");
    assert!(!outcomes[2].accepted, "unknown request id is an item error");
}

#[tokio::test]
async fn expired_responses_poll_as_gone() {
    let env = fixtures::env();
    let pool = matched_pool(&env, 1).await;
    let psi = env.facade.psi();

    let signed = sign_request(&env.owner_signing, "psi_setup", &pool.pool_id, now_millis());
    psi.create_setup(&pool.pool_id, &signed, PsiParams::default()).expect("setup");
    let (request, _) = ecdh::client_request(&[MatchToken::new([1; 32])], &mut OsRng);
    let request_id = psi.submit_request(&pool.pool_id, request.to_bytes().expect("encode"), None).expect("queue");

    let signed = sign_request(&env.owner_signing, "psi_respond", &pool.pool_id, now_millis());
    psi.submit_responses(&pool.pool_id, &signed, vec![PsiResponseSubmission { request_id, response: vec![1] }])
        .expect("respond");

    // Backdate the record past its TTL.
    let mut record = env.store.get_psi_response(&request_id).expect("get").expect("record");
    record.expires_at_ms = now_millis() - 1;
    env.store.delete_psi_response(&request_id).expect("delete");
    env.store.insert_psi_response(record).expect("reinsert");

    assert!(matches!(psi.fetch_response(&request_id).expect("poll"), PsiResponseDelivery::Gone));
    // The record was purged lazily; polling again still reports gone.
    assert!(matches!(psi.fetch_response(&request_id).expect("poll"), PsiResponseDelivery::Gone));
}

#[tokio::test]
async fn trivial_path_intersects_revealed_tokens() {
    let env = fixtures::env();
    let pool = fixtures::open_pool(&env);
    let alice = fixtures::keypair();
    let bob = fixtures::keypair();
    fixtures::submit_selections(&env, &pool.pool_id, &alice, &[&bob]).await;
    fixtures::close_now(&env, &pool.pool_id);

    let token = rendezvous_core::infrastructure::crypto::derive_match_token(&alice, &bob.public(), &pool.pool_id);
    let absent = MatchToken::new([0xCD; 32]);
    let intersection = env.facade.psi().trivial_intersect(&pool.pool_id, &[token, absent]).expect("intersect");
    assert_eq!(intersection, vec![token]);
}
