//! Shared test fixtures: a facade over a memory store with mock adapters,
//! pool builders, and submission helpers.

#![allow(dead_code)]

use rand::rngs::OsRng;
use rendezvous_core::application::{CreatePoolRequest, Rendezvous, SubmissionRequest};
use rendezvous_core::domain::gate::Gate;
use rendezvous_core::domain::pool::{Pool, PoolStatus};
use rendezvous_core::foundation::{now_millis, MatchToken, Nullifier, PoolId};
use rendezvous_core::infrastructure::adapters::{MockAttestationGateway, MockTokenAuthority};
use rendezvous_core::infrastructure::config::RendezvousConfig;
use rendezvous_core::infrastructure::crypto::keys::{AgreementKeypair, SigningKeypair};
use rendezvous_core::infrastructure::crypto::{derive_match_token, derive_nullifier};
use rendezvous_core::infrastructure::storage::{MemoryStore, Store};
use std::sync::Arc;

pub const HOUR_MS: u64 = 60 * 60 * 1000;

pub struct TestEnv {
    pub facade: Rendezvous,
    pub store: Arc<MemoryStore>,
    pub authority: Arc<MockTokenAuthority>,
    pub attestation: Arc<MockAttestationGateway>,
    pub owner_agreement: AgreementKeypair,
    pub owner_signing: SigningKeypair,
}

pub fn env() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let authority = Arc::new(MockTokenAuthority::new("issuer-a"));
    let attestation = Arc::new(MockAttestationGateway::new("mock-net"));
    let facade = Rendezvous::new(
        Arc::clone(&store) as Arc<dyn Store>,
        Some(Arc::clone(&authority) as _),
        Some(Arc::clone(&attestation) as _),
        RendezvousConfig::default(),
    );
    TestEnv {
        facade,
        store,
        authority,
        attestation,
        owner_agreement: AgreementKeypair::generate(&mut OsRng),
        owner_signing: SigningKeypair::generate(&mut OsRng),
    }
}

pub struct PoolSpec {
    pub commit_offset_ms: Option<u64>,
    pub reveal_offset_ms: u64,
    pub gate: Option<Gate>,
    pub max_preferences: Option<u32>,
    pub ephemeral: bool,
    pub requires_invite: bool,
}

impl Default for PoolSpec {
    fn default() -> Self {
        Self {
            commit_offset_ms: None,
            reveal_offset_ms: HOUR_MS,
            gate: Some(Gate::Open),
            max_preferences: None,
            ephemeral: false,
            requires_invite: false,
        }
    }
}

pub fn make_pool(env: &TestEnv, spec: PoolSpec) -> Pool {
    let now = now_millis();
    env.facade
        .create_pool(CreatePoolRequest {
            name: "test pool".to_string(),
            description: None,
            creator_agreement_key: env.owner_agreement.public(),
            creator_signing_key: env.owner_signing.public(),
            commit_deadline_ms: spec.commit_offset_ms.map(|offset| now + offset),
            reveal_deadline_ms: now + spec.reveal_offset_ms,
            gate: spec.gate,
            max_preferences: spec.max_preferences,
            ephemeral: spec.ephemeral,
            requires_invite: spec.requires_invite,
        })
        .expect("pool creation")
}

pub fn open_pool(env: &TestEnv) -> Pool {
    make_pool(env, PoolSpec::default())
}

/// Force-close through the store so tests need no clock manipulation.
pub fn close_now(env: &TestEnv, pool_id: &PoolId) {
    env.store.update_pool_status(pool_id, PoolStatus::Closed, now_millis()).expect("close");
}

pub fn keypair() -> AgreementKeypair {
    AgreementKeypair::generate(&mut OsRng)
}

pub fn tokens_for(me: &AgreementKeypair, others: &[&AgreementKeypair], pool_id: &PoolId) -> Vec<MatchToken> {
    others.iter().map(|other| derive_match_token(me, &other.public(), pool_id)).collect()
}

pub fn request_for(me: &AgreementKeypair, others: &[&AgreementKeypair], pool_id: &PoolId) -> SubmissionRequest {
    SubmissionRequest {
        pool_id: *pool_id,
        tokens: tokens_for(me, others, pool_id),
        commitments: None,
        nullifier: derive_nullifier(me, pool_id),
        reveal_entries: Vec::new(),
        proof: None,
    }
}

pub async fn submit_selections(env: &TestEnv, pool_id: &PoolId, me: &AgreementKeypair, others: &[&AgreementKeypair]) {
    env.facade.submit(request_for(me, others, pool_id)).await.expect("submission");
}

pub fn nullifier_for(me: &AgreementKeypair, pool_id: &PoolId) -> Nullifier {
    derive_nullifier(me, pool_id)
}
