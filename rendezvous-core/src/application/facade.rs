use crate::application::eligibility::GateEvaluator;
use crate::application::matching::MatchDetector;
use crate::application::pools::{CreatePoolRequest, PoolManager};
use crate::application::psi::PsiService;
use crate::application::submissions::{SubmissionManager, SubmissionReceipt, SubmissionRequest};
use crate::domain::gate::GateOutcome;
use crate::domain::matching::{IntegrityReport, MatchResult, MatchStats};
use crate::domain::pool::Pool;
use crate::domain::token::UnlinkableToken;
use crate::domain::Participant;
use crate::foundation::{
    now_millis, AgreementPublicKey, MatchToken, Nullifier, PoolId, RendezvousError, Result,
};
use crate::infrastructure::adapters::{AttestationGateway, TokenAuthority};
use crate::infrastructure::config::RendezvousConfig;
use crate::infrastructure::crypto::envelope::SignedRequest;
use crate::infrastructure::crypto::keys::AgreementKeypair;
use crate::infrastructure::storage::Store;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// The narrow programmatic contract an outer request layer talks to. Owns
/// composition; individual managers stay reachable for the service runtime.
pub struct Rendezvous {
    store: Arc<dyn Store>,
    pools: PoolManager,
    gates: Arc<GateEvaluator>,
    submissions: SubmissionManager,
    detector: MatchDetector,
    psi: PsiService,
    config: RendezvousConfig,
}

impl Rendezvous {
    pub fn new(
        store: Arc<dyn Store>,
        token_authority: Option<Arc<dyn TokenAuthority>>,
        attestation: Option<Arc<dyn AttestationGateway>>,
        config: RendezvousConfig,
    ) -> Self {
        let gates = Arc::new(GateEvaluator::new(token_authority, Duration::from_secs(config.timeouts.verifier_secs)));
        let pools = PoolManager::new(Arc::clone(&store));
        let submissions = SubmissionManager::new(Arc::clone(&store), Arc::clone(&gates));
        let detector = MatchDetector::new(Arc::clone(&store), attestation, Duration::from_secs(config.timeouts.attestation_secs));
        let psi = PsiService::new(Arc::clone(&store));
        Self { store, pools, gates, submissions, detector, psi, config }
    }

    // --- pools ---

    pub fn create_pool(&self, request: CreatePoolRequest) -> Result<Pool> {
        self.pools.create(request)
    }

    pub fn get_pool(&self, pool_id: &PoolId) -> Result<Pool> {
        self.pools.get(pool_id)
    }

    pub fn list_pools(&self) -> Result<Vec<Pool>> {
        self.pools.list()
    }

    pub fn close_pool(&self, pool_id: &PoolId, signed: &SignedRequest) -> Result<()> {
        self.pools.close(pool_id, signed)
    }

    // --- participants ---

    pub async fn register_participant(
        &self,
        pool_id: &PoolId,
        public_key: AgreementPublicKey,
        display_name: String,
        bio: Option<String>,
        profile: BTreeMap<String, String>,
        proof: Option<&UnlinkableToken>,
    ) -> Result<Participant> {
        let pool = self.pools.get(pool_id)?;
        if self.pools.effective(&pool) == crate::domain::pool::PoolStatus::Closed {
            return Err(RendezvousError::PoolClosed(pool_id.to_string()));
        }

        let outcome = self.gates.check_strict(&pool, Some(&public_key), proof).await?;
        if !outcome.eligible {
            return Err(RendezvousError::InvalidEligibilityProof(outcome.reason));
        }

        let participant =
            Participant { pool_id: *pool_id, public_key, display_name, bio, profile, registered_at_ms: now_millis() };
        self.store.insert_participant(participant.clone())?;
        Ok(participant)
    }

    pub fn list_participants(&self, pool_id: &PoolId) -> Result<Vec<Participant>> {
        self.store.list_participants(pool_id)
    }

    // --- preferences ---

    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionReceipt> {
        self.submissions.submit(request).await
    }

    pub fn reveal(&self, pool_id: &PoolId, tokens: Vec<MatchToken>, nullifier: &Nullifier) -> Result<usize> {
        self.submissions.reveal(pool_id, tokens, nullifier)
    }

    // --- matches ---

    pub async fn detect_matches(&self, pool_id: &PoolId) -> Result<MatchResult> {
        self.detector.detect(pool_id).await
    }

    pub fn match_result(&self, pool_id: &PoolId) -> Result<Option<MatchResult>> {
        self.detector.result(pool_id)
    }

    pub fn match_stats(&self, pool_id: &PoolId) -> Result<MatchStats> {
        self.detector.stats(pool_id)
    }

    pub fn verify_match_integrity(&self, pool_id: &PoolId) -> Result<IntegrityReport> {
        self.detector.verify_integrity(pool_id)
    }

    /// Client-side discovery against the recorded result. Candidate keys are
    /// supplied by the caller and never correlated server-side.
    pub fn discover_matches(
        &self,
        pool_id: &PoolId,
        mine: &AgreementKeypair,
        candidates: &[AgreementPublicKey],
    ) -> Result<Vec<AgreementPublicKey>> {
        let Some(result) = self.detector.result(pool_id)? else {
            return Ok(Vec::new());
        };
        Ok(MatchDetector::discover(&result, mine, candidates, pool_id))
    }

    pub fn check_match(&self, pool_id: &PoolId, mine: &AgreementKeypair, candidate: &AgreementPublicKey) -> Result<bool> {
        let Some(result) = self.detector.result(pool_id)? else {
            return Ok(false);
        };
        Ok(MatchDetector::is_match(&result, mine, candidate, pool_id))
    }

    // --- eligibility ---

    pub async fn check_eligibility(
        &self,
        pool_id: &PoolId,
        participant_key: Option<&AgreementPublicKey>,
        proof: Option<&UnlinkableToken>,
    ) -> Result<GateOutcome> {
        let pool = self.pools.get(pool_id)?;
        Ok(self.gates.check(&pool, participant_key, proof).await)
    }

    // --- composition access ---

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    pub fn submissions(&self) -> &SubmissionManager {
        &self.submissions
    }

    pub fn detector(&self) -> &MatchDetector {
        &self.detector
    }

    pub fn psi(&self) -> &PsiService {
        &self.psi
    }

    pub fn config(&self) -> &RendezvousConfig {
        &self.config
    }

    pub fn health_check(&self) -> Result<()> {
        self.store.health_check()
    }

    /// Drain and release. The store is dropped with the facade; pending
    /// privacy-delay timers belong to the service runtime, not the core.
    pub fn close(self) {
        info!("rendezvous facade closing");
        drop(self);
    }
}
