use crate::application::eligibility::GateEvaluator;
use crate::domain::pool::{accepts_submissions, effective_status, Pool, PoolStatus};
use crate::domain::token::UnlinkableToken;
use crate::domain::Preference;
use crate::foundation::{
    now_millis, Hash32, MatchToken, Nullifier, PoolId, RendezvousError, Result, DECOY_MAX, DECOY_MIN,
};
use crate::infrastructure::crypto::tokens::{commit_token, verify_commitment};
use crate::infrastructure::crypto::random_bytes32;
use crate::infrastructure::storage::Store;
use log::{debug, info};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct SubmissionRequest {
    pub pool_id: PoolId,
    pub tokens: Vec<MatchToken>,
    /// Client-supplied commit hashes, parallel to `tokens`. Omitted hashes
    /// are recomputed server-side for compatibility with older clients.
    pub commitments: Option<Vec<Hash32>>,
    pub nullifier: Nullifier,
    pub reveal_entries: Vec<RevealEntry>,
    pub proof: Option<UnlinkableToken>,
}

#[derive(Clone, Debug)]
pub struct RevealEntry {
    pub match_token: MatchToken,
    pub encrypted_reveal: Vec<u8>,
}

/// Decoy identifiers are deliberately absent: the caller learns only how
/// many of its own tokens were accepted and in which phase.
#[derive(Clone, Debug)]
pub struct SubmissionReceipt {
    pub pool_id: PoolId,
    pub accepted_tokens: usize,
    pub phase: PoolStatus,
}

pub struct SubmissionManager {
    store: Arc<dyn Store>,
    gates: Arc<GateEvaluator>,
}

impl SubmissionManager {
    pub fn new(store: Arc<dyn Store>, gates: Arc<GateEvaluator>) -> Self {
        Self { store, gates }
    }

    pub async fn submit(&self, request: SubmissionRequest) -> Result<SubmissionReceipt> {
        let now_ms = now_millis();
        let pool = self.get_pool(&request.pool_id)?;
        let effective = effective_status(&pool, now_ms);
        if !accepts_submissions(effective) {
            return Err(RendezvousError::PoolClosed(pool.pool_id.to_string()));
        }

        if pool.requires_invite {
            // Fail-closed: a verifier outage propagates instead of waving
            // the submission through.
            let outcome = self.gates.check_strict(&pool, None, request.proof.as_ref()).await?;
            if !outcome.eligible {
                return Err(RendezvousError::InvalidEligibilityProof(outcome.reason));
            }
        }

        if let Some(limit) = pool.max_preferences {
            if request.tokens.len() > limit as usize {
                return Err(RendezvousError::PreferenceLimitExceeded { submitted: request.tokens.len(), limit });
            }
        }
        if let Some(commitments) = &request.commitments {
            if commitments.len() != request.tokens.len() {
                return Err(RendezvousError::InvalidInput("commitments must parallel tokens".to_string()));
            }
        }

        let mut reveal_map: HashMap<MatchToken, Vec<u8>> = HashMap::new();
        for entry in request.reveal_entries {
            if !request.tokens.contains(&entry.match_token) {
                return Err(RendezvousError::InvalidInput("reveal entry does not match any submitted token".to_string()));
            }
            reveal_map.insert(entry.match_token, entry.encrypted_reveal);
        }

        let committing = effective == PoolStatus::Commit;
        let issuance_proof = request.proof.as_ref().map(|token| token.digest());

        let mut preferences: Vec<Preference> = Vec::with_capacity(request.tokens.len() + DECOY_MAX);
        for (index, token) in request.tokens.iter().enumerate() {
            let commitment = if committing {
                Some(match &request.commitments {
                    Some(commitments) => commitments[index],
                    None => commit_token(token),
                })
            } else {
                None
            };
            preferences.push(Preference {
                pool_id: pool.pool_id,
                nullifier: request.nullifier,
                token: *token,
                commitment,
                revealed: !committing,
                submitted_at_ms: now_ms,
                issuance_proof,
                encrypted_reveal: reveal_map.remove(token),
            });
        }

        // Decoy padding: random tokens shaped exactly like the real rows of
        // this phase. The 256-bit space makes collision with a real match
        // negligible.
        let mut rng = OsRng;
        let decoy_count = rng.gen_range(DECOY_MIN..=DECOY_MAX);
        for _ in 0..decoy_count {
            let token = MatchToken::new(random_bytes32(&mut rng));
            preferences.push(Preference {
                pool_id: pool.pool_id,
                nullifier: request.nullifier,
                token,
                commitment: committing.then(|| commit_token(&token)),
                revealed: !committing,
                submitted_at_ms: now_ms,
                issuance_proof: None,
                encrypted_reveal: None,
            });
        }
        preferences.shuffle(&mut rng);

        self.store.insert_preference_set(&pool.pool_id, &request.nullifier, preferences)?;
        info!(
            "submission accepted pool_id={} phase={} real_tokens={} padded_total={}",
            pool.pool_id,
            effective,
            request.tokens.len(),
            request.tokens.len() + decoy_count
        );
        Ok(SubmissionReceipt { pool_id: pool.pool_id, accepted_tokens: request.tokens.len(), phase: effective })
    }

    /// Match user tokens to stored commitments, consuming each supplied
    /// token at most once; decoys self-verify against their own commitment.
    pub fn reveal(&self, pool_id: &PoolId, tokens: Vec<MatchToken>, nullifier: &Nullifier) -> Result<usize> {
        let pool = self.get_pool(pool_id)?;
        match effective_status(&pool, now_millis()) {
            PoolStatus::Reveal => {}
            PoolStatus::Closed => return Err(RendezvousError::PoolClosed(pool_id.to_string())),
            effective => return Err(RendezvousError::PoolNotInRevealPhase { effective: effective.to_string() }),
        }

        let mut preferences = self.store.list_preferences(pool_id, nullifier)?;
        if preferences.is_empty() {
            return Err(RendezvousError::CommitmentNotFound(pool_id.to_string()));
        }

        let mut candidates = tokens;
        let mut revealed_count = 0usize;
        for preference in preferences.iter_mut().filter(|p| !p.revealed) {
            let Some(commitment) = preference.commitment else {
                continue;
            };
            if let Some(position) = candidates.iter().position(|token| verify_commitment(token, &commitment)) {
                preference.token = candidates.swap_remove(position);
                preference.revealed = true;
                revealed_count += 1;
            } else if verify_commitment(&preference.token, &commitment) {
                // Decoy: the stored token already opens its own commitment.
                preference.revealed = true;
            }
        }

        if !candidates.is_empty() {
            debug!("reveal rejected pool_id={} unmatched_tokens={}", pool_id, candidates.len());
            return Err(RendezvousError::CommitmentMismatch);
        }

        self.store.replace_preference_set(pool_id, nullifier, preferences)?;
        info!("reveal accepted pool_id={} revealed={}", pool_id, revealed_count);
        Ok(revealed_count)
    }

    fn get_pool(&self, pool_id: &PoolId) -> Result<Pool> {
        self.store.get_pool(pool_id)?.ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))
    }
}
