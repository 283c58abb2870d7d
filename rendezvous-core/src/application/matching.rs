use crate::domain::matching::{self, IntegrityReport, MatchResult, MatchStats};
use crate::domain::pool::{effective_status, PoolStatus};
use crate::foundation::{now_millis, AgreementPublicKey, MatchToken, PoolId, RendezvousError, Result};
use crate::infrastructure::adapters::AttestationGateway;
use crate::infrastructure::crypto::keys::AgreementKeypair;
use crate::infrastructure::crypto::tokens::derive_match_token;
use crate::infrastructure::storage::Store;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

pub struct MatchDetector {
    store: Arc<dyn Store>,
    attestation: Option<Arc<dyn AttestationGateway>>,
    attestation_timeout: Duration,
}

impl MatchDetector {
    pub fn new(store: Arc<dyn Store>, attestation: Option<Arc<dyn AttestationGateway>>, attestation_timeout: Duration) -> Self {
        Self { store, attestation, attestation_timeout }
    }

    /// Scan the pool's revealed preferences and record the result. Effectively
    /// at-most-once: an existing result is returned without recomputation and
    /// without a second attestation.
    pub async fn detect(&self, pool_id: &PoolId) -> Result<MatchResult> {
        let pool = self.store.get_pool(pool_id)?.ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))?;
        if effective_status(&pool, now_millis()) != PoolStatus::Closed {
            return Err(RendezvousError::InvalidInput("match detection requires a closed pool".to_string()));
        }

        if let Some(existing) = self.store.get_match_result(pool_id)? {
            return Ok(existing);
        }

        let counts = self.store.count_token_occurrences(pool_id)?;
        let matched = matching::matched_tokens(&counts);
        let total_submissions = self.store.count_revealed_preferences(pool_id)?;
        let unique_participants = self.store.count_nullifiers(pool_id)?;
        let result_hash = matching::result_hash(pool_id, &matched, unique_participants);

        let attestation = match &self.attestation {
            None => None,
            Some(gateway) => match tokio::time::timeout(self.attestation_timeout, gateway.attest(&result_hash, None)).await {
                Ok(Ok(attestation)) => Some(attestation),
                Ok(Err(err)) => {
                    warn!("attestation failed pool_id={} error={}", pool_id, err);
                    None
                }
                Err(_) => {
                    warn!("attestation timed out pool_id={}", pool_id);
                    None
                }
            },
        };

        let result = MatchResult {
            pool_id: *pool_id,
            matched_tokens: matched,
            total_submissions,
            unique_participants,
            detected_at_ms: now_millis(),
            result_hash,
            attestation,
        };
        self.store.upsert_match_result(result.clone())?;
        info!(
            "matches detected pool_id={} matched={} total_submissions={} unique_participants={}",
            pool_id,
            result.matched_tokens.len(),
            total_submissions,
            unique_participants
        );

        if pool.ephemeral {
            let dropped = self.store.delete_participants(pool_id)?;
            info!("ephemeral pool purged pool_id={} participants_dropped={}", pool_id, dropped);
        }

        Ok(result)
    }

    pub fn result(&self, pool_id: &PoolId) -> Result<Option<MatchResult>> {
        self.store.get_match_result(pool_id)
    }

    pub fn stats(&self, pool_id: &PoolId) -> Result<MatchStats> {
        let result = self.store.get_match_result(pool_id)?;
        Ok(MatchStats {
            pool_id: *pool_id,
            total_submissions: self.store.count_revealed_preferences(pool_id)?,
            unique_participants: self.store.count_nullifiers(pool_id)?,
            matched_token_count: result.as_ref().map(|r| r.matched_tokens.len() as u64).unwrap_or(0),
            detected_at_ms: result.map(|r| r.detected_at_ms),
        })
    }

    /// Recount and compare against the stored result, including its hash.
    pub fn verify_integrity(&self, pool_id: &PoolId) -> Result<IntegrityReport> {
        let Some(result) = self.store.get_match_result(pool_id)? else {
            return Ok(IntegrityReport { consistent: false, errors: vec!["no match result recorded".to_string()] });
        };

        let counts = self.store.count_token_occurrences(pool_id)?;
        let mut report = matching::verify_counts(&result, &counts);

        let expected_hash = matching::result_hash(pool_id, &result.matched_tokens, result.unique_participants);
        if expected_hash != result.result_hash {
            report.consistent = false;
            report.errors.push("stored result hash does not match recomputation".to_string());
        }
        Ok(report)
    }

    /// Client-side discovery: recompute each candidate token locally and
    /// intersect with the published matched set. Candidate identities never
    /// reach the server.
    pub fn discover(
        result: &MatchResult,
        mine: &AgreementKeypair,
        candidates: &[AgreementPublicKey],
        pool_id: &PoolId,
    ) -> Vec<AgreementPublicKey> {
        candidates
            .iter()
            .filter(|candidate| {
                let token = derive_match_token(mine, candidate, pool_id);
                result.matched_tokens.contains(&token)
            })
            .copied()
            .collect()
    }

    /// Single-candidate variant of [`MatchDetector::discover`].
    pub fn is_match(result: &MatchResult, mine: &AgreementKeypair, candidate: &AgreementPublicKey, pool_id: &PoolId) -> bool {
        let token = derive_match_token(mine, candidate, pool_id);
        result.matched_tokens.contains(&token)
    }

    /// The matched token itself, for fetching a partner's encrypted reveal.
    pub fn matched_token_for(
        result: &MatchResult,
        mine: &AgreementKeypair,
        candidate: &AgreementPublicKey,
        pool_id: &PoolId,
    ) -> Option<MatchToken> {
        let token = derive_match_token(mine, candidate, pool_id);
        result.matched_tokens.contains(&token).then_some(token)
    }
}
