use crate::domain::pool::{effective_status, Pool, PoolStatus};
use crate::domain::psi::ecdh::{self, PsiClientRequest, PsiServerKey};
use crate::domain::psi::{PendingPsiRequest, PsiParams, PsiRequestStatus, PsiResponseRecord, PsiSetup};
use crate::domain::token::UnlinkableToken;
use crate::foundation::{
    now_millis, MatchToken, PoolId, PsiRequestId, RendezvousError, Result, TimestampMs, PSI_RESPONSE_TTL_MS,
};
use crate::infrastructure::crypto::envelope::{verify_request, SignedRequest};
use crate::infrastructure::crypto::{random_bytes32, sealed};
use crate::infrastructure::storage::Store;
use log::{info, warn};
use rand::rngs::OsRng;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PsiResponseSubmission {
    pub request_id: PsiRequestId,
    pub response: Vec<u8>,
}

/// Per-item outcome of a response batch; item failures never fail the batch.
#[derive(Clone, Debug)]
pub struct PsiBatchItemOutcome {
    pub request_id: PsiRequestId,
    pub accepted: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub enum PsiResponseDelivery {
    Ready { setup_message: Vec<u8>, response: Vec<u8> },
    Pending,
    Gone,
}

/// The owner-held-key pipeline. The service stores the PSI server secret
/// only sealed to the pool owner; queries queue until the owner polls,
/// processes locally, and posts responses back.
pub struct PsiService {
    store: Arc<dyn Store>,
}

impl PsiService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Build and install the pool's setup: key the revealed token set,
    /// seal the fresh server secret to the owner, drop the secret.
    pub fn create_setup(&self, pool_id: &PoolId, signed: &SignedRequest, params: PsiParams) -> Result<PsiSetup> {
        let pool = self.closed_pool(pool_id)?;
        verify_request(&pool.creator_signing_key, signed, "psi_setup", now_millis())?;

        let tokens: Vec<MatchToken> = self.store.count_token_occurrences(pool_id)?.into_keys().collect();
        let server_key = PsiServerKey::generate(&mut OsRng);
        let setup_message = ecdh::server_setup(&server_key, &tokens, &params).to_bytes()?;
        let sealed_server_key = sealed::seal(&pool.creator_agreement_key, &server_key.to_bytes(), &mut OsRng)?;

        let setup = PsiSetup {
            pool_id: *pool_id,
            setup_message,
            sealed_server_key,
            owner_key: pool.creator_agreement_key,
            params,
            created_at_ms: now_millis(),
        };
        self.store.put_psi_setup(setup.clone())?;
        self.store.set_pool_psi_setup_at(pool_id, setup.created_at_ms)?;
        info!("psi setup installed pool_id={} elements={}", pool_id, tokens.len());
        Ok(setup)
    }

    /// Queue a client query. The server never sees the client's input set,
    /// only blinded points.
    pub fn submit_request(
        &self,
        pool_id: &PoolId,
        client_request: Vec<u8>,
        auth_token: Option<&UnlinkableToken>,
    ) -> Result<PsiRequestId> {
        let _pool = self.closed_pool(pool_id)?;
        let setup = self.store.get_psi_setup(pool_id)?.ok_or_else(|| RendezvousError::PsiSetupMissing(pool_id.to_string()))?;

        let parsed = PsiClientRequest::from_bytes(&client_request)?;
        if parsed.element_count() > setup.params.max_client_elements as usize {
            return Err(RendezvousError::InvalidInput(format!(
                "client set of {} exceeds the configured maximum {}",
                parsed.element_count(),
                setup.params.max_client_elements
            )));
        }

        let request = PendingPsiRequest {
            request_id: PsiRequestId::new(random_bytes32(&mut OsRng)),
            pool_id: *pool_id,
            client_request,
            status: PsiRequestStatus::Pending,
            created_at_ms: now_millis(),
            auth_token_hash: auth_token.map(|token| token.digest()),
        };
        self.store.enqueue_psi_request(request.clone())?;
        info!("psi request queued pool_id={} request_id={}", pool_id, request.request_id);
        Ok(request.request_id)
    }

    /// Owner poll, authenticated by signed envelope. Returned requests move
    /// to `processing`.
    pub fn poll_pending(&self, pool_id: &PoolId, signed: &SignedRequest) -> Result<Vec<PendingPsiRequest>> {
        let pool = self.pool(pool_id)?;
        verify_request(&pool.creator_signing_key, signed, "psi_poll", now_millis())?;
        self.store.get_psi_setup(pool_id)?.ok_or_else(|| RendezvousError::PsiSetupMissing(pool_id.to_string()))?;

        let mut pending = self.store.list_psi_requests(pool_id, PsiRequestStatus::Pending)?;
        for request in &mut pending {
            self.store.update_psi_request_status(&request.request_id, PsiRequestStatus::Processing)?;
            request.status = PsiRequestStatus::Processing;
        }
        Ok(pending)
    }

    /// Owner posts a batch of processed responses. Completed or missing
    /// requests are reported as item errors, never as batch failure.
    pub fn submit_responses(
        &self,
        pool_id: &PoolId,
        signed: &SignedRequest,
        batch: Vec<PsiResponseSubmission>,
    ) -> Result<Vec<PsiBatchItemOutcome>> {
        let pool = self.pool(pool_id)?;
        verify_request(&pool.creator_signing_key, signed, "psi_respond", now_millis())?;
        let setup = self.store.get_psi_setup(pool_id)?.ok_or_else(|| RendezvousError::PsiSetupMissing(pool_id.to_string()))?;

        let now_ms = now_millis();
        let mut outcomes = Vec::with_capacity(batch.len());
        for submission in batch {
            let outcome = self.accept_response(pool_id, &setup, submission, now_ms);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn accept_response(
        &self,
        pool_id: &PoolId,
        setup: &PsiSetup,
        submission: PsiResponseSubmission,
        now_ms: TimestampMs,
    ) -> PsiBatchItemOutcome {
        let request_id = submission.request_id;
        let fail = |error: String| PsiBatchItemOutcome { request_id, accepted: false, error: Some(error) };

        let request = match self.store.get_psi_request(&request_id) {
            Ok(Some(request)) if request.pool_id == *pool_id => request,
            Ok(Some(_)) => return fail("request belongs to a different pool".to_string()),
            Ok(None) => return fail("request not found".to_string()),
            Err(err) => return fail(err.to_string()),
        };
        match request.status {
            PsiRequestStatus::Pending | PsiRequestStatus::Processing => {}
            status => return fail(format!("request already {status}")),
        }

        let record = PsiResponseRecord {
            request_id,
            pool_id: *pool_id,
            setup_message: setup.setup_message.clone(),
            response: submission.response,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + PSI_RESPONSE_TTL_MS,
        };
        if let Err(err) = self.store.insert_psi_response(record) {
            return fail(err.to_string());
        }

        // A response may arrive for a request the owner never polled.
        if request.status == PsiRequestStatus::Pending {
            if let Err(err) = self.store.update_psi_request_status(&request_id, PsiRequestStatus::Processing) {
                return fail(err.to_string());
            }
        }
        if let Err(err) = self.store.update_psi_request_status(&request_id, PsiRequestStatus::Completed) {
            return fail(err.to_string());
        }
        PsiBatchItemOutcome { request_id, accepted: true, error: None }
    }

    /// Client poll by request id.
    pub fn fetch_response(&self, request_id: &PsiRequestId) -> Result<PsiResponseDelivery> {
        let request =
            self.store.get_psi_request(request_id)?.ok_or_else(|| RendezvousError::PsiRequestNotFound(request_id.to_string()))?;

        if let Some(record) = self.store.get_psi_response(request_id)? {
            if now_millis() > record.expires_at_ms {
                self.store.delete_psi_response(request_id)?;
                return Ok(PsiResponseDelivery::Gone);
            }
            return Ok(PsiResponseDelivery::Ready { setup_message: record.setup_message, response: record.response });
        }

        match request.status {
            PsiRequestStatus::Pending | PsiRequestStatus::Processing => Ok(PsiResponseDelivery::Pending),
            PsiRequestStatus::Completed | PsiRequestStatus::Expired => Ok(PsiResponseDelivery::Gone),
        }
    }

    /// Expire stale queue entries and purge dead response records. Driven by
    /// the periodic scheduler.
    pub fn expire_stale(&self, now_ms: TimestampMs) -> Result<usize> {
        let mut expired = 0usize;
        for pool in self.store.list_pools()? {
            for status in [PsiRequestStatus::Pending, PsiRequestStatus::Processing] {
                for request in self.store.list_psi_requests(&pool.pool_id, status)? {
                    if now_ms.saturating_sub(request.created_at_ms) > PSI_RESPONSE_TTL_MS {
                        if let Err(err) = self.store.update_psi_request_status(&request.request_id, PsiRequestStatus::Expired) {
                            warn!("psi expiry failed request_id={} error={}", request.request_id, err);
                        } else {
                            expired += 1;
                        }
                    }
                }
            }
        }
        Ok(expired)
    }

    /// Trivial path: plaintext client set intersected server-side. Present
    /// for clients that opt out of the blinded protocol.
    pub fn trivial_intersect(&self, pool_id: &PoolId, client_tokens: &[MatchToken]) -> Result<Vec<MatchToken>> {
        self.closed_pool(pool_id)?;
        let counts = self.store.count_token_occurrences(pool_id)?;
        Ok(client_tokens.iter().filter(|token| counts.contains_key(token)).copied().collect())
    }

    fn pool(&self, pool_id: &PoolId) -> Result<Pool> {
        self.store.get_pool(pool_id)?.ok_or_else(|| RendezvousError::PoolNotFound(pool_id.to_string()))
    }

    fn closed_pool(&self, pool_id: &PoolId) -> Result<Pool> {
        let pool = self.pool(pool_id)?;
        if effective_status(&pool, now_millis()) != PoolStatus::Closed {
            return Err(RendezvousError::InvalidInput("PSI requires a closed pool".to_string()));
        }
        Ok(pool)
    }
}
