use crate::domain::gate::{GateContext, GateOutcome, ProofCheck};
use crate::domain::pool::Pool;
use crate::domain::token::UnlinkableToken;
use crate::foundation::{now_millis, AgreementPublicKey, RendezvousError, Result};
use crate::infrastructure::adapters::TokenAuthority;
use log::warn;
use std::sync::Arc;
use std::time::Duration;

/// Evaluates a pool's gate tree. The token proof, when present, is verified
/// once up-front against the issuer adapter; the tree walk itself is pure.
pub struct GateEvaluator {
    token_authority: Option<Arc<dyn TokenAuthority>>,
    verifier_timeout: Duration,
}

impl GateEvaluator {
    pub fn new(token_authority: Option<Arc<dyn TokenAuthority>>, verifier_timeout: Duration) -> Self {
        Self { token_authority, verifier_timeout }
    }

    /// Eligibility query: never errors on a "no". An unreachable verifier
    /// yields "not eligible, verification failed".
    pub async fn check(
        &self,
        pool: &Pool,
        participant_key: Option<&AgreementPublicKey>,
        proof: Option<&UnlinkableToken>,
    ) -> GateOutcome {
        match self.check_strict(pool, participant_key, proof).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("gate evaluation degraded pool_id={} error={}", pool.pool_id, err);
                GateOutcome::ineligible_with("proof verification failed", err.to_string())
            }
        }
    }

    /// Enforcement path: verifier outages propagate as a transient
    /// service-error so authorization-dependent actions fail closed.
    pub async fn check_strict(
        &self,
        pool: &Pool,
        participant_key: Option<&AgreementPublicKey>,
        proof: Option<&UnlinkableToken>,
    ) -> Result<GateOutcome> {
        let proof_check = match proof {
            None => None,
            Some(token) => Some(self.verify_proof(token).await?),
        };
        let ctx = GateContext { pool_id: &pool.pool_id, participant_key };
        Ok(pool.gate.evaluate(&ctx, proof_check.as_ref()))
    }

    async fn verify_proof(&self, token: &UnlinkableToken) -> Result<ProofCheck> {
        let Some(authority) = &self.token_authority else {
            return Ok(ProofCheck { issuer: token.issuer.clone(), expired: false, verified: false });
        };

        let expired = authority.is_expired(token, now_millis());
        if expired {
            return Ok(ProofCheck { issuer: token.issuer.clone(), expired, verified: false });
        }

        let verified = match tokio::time::timeout(self.verifier_timeout, authority.verify(token)).await {
            Err(_) => return Err(RendezvousError::unavailable("token_authority", "verification timed out")),
            Ok(Err(err)) => return Err(err),
            Ok(Ok(verified)) => verified,
        };
        Ok(ProofCheck { issuer: token.issuer.clone(), expired: false, verified })
    }
}
