//! Private set intersection: record types for the owner-held-key pipeline
//! and the ECDH primitive the pipeline transports.

pub mod ecdh;

use crate::foundation::{AgreementPublicKey, Hash32, PoolId, PsiRequestId, RendezvousError, TimestampMs};
use serde::{Deserialize, Serialize};

/// Tunable parameters recorded with each setup.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PsiParams {
    pub false_positive_rate: f64,
    pub max_client_elements: u32,
    pub structure: PsiStructure,
}

impl Default for PsiParams {
    fn default() -> Self {
        Self { false_positive_rate: 1e-6, max_client_elements: 1024, structure: PsiStructure::TruncatedHash }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PsiStructure {
    /// Truncated SHA-256 digests of the keyed points; length set by the
    /// false-positive rate.
    TruncatedHash,
    /// Full compressed points, no false positives.
    RawPoints,
}

/// One per pool. The server secret only ever exists here sealed to the
/// owner's agreement key; the service cannot process queries itself.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PsiSetup {
    pub pool_id: PoolId,
    pub setup_message: Vec<u8>,
    pub sealed_server_key: Vec<u8>,
    pub owner_key: AgreementPublicKey,
    pub params: PsiParams,
    pub created_at_ms: TimestampMs,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PsiRequestStatus {
    Pending,
    Processing,
    Completed,
    Expired,
}

impl std::fmt::Display for PsiRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PsiRequestStatus::Pending => write!(f, "pending"),
            PsiRequestStatus::Processing => write!(f, "processing"),
            PsiRequestStatus::Completed => write!(f, "completed"),
            PsiRequestStatus::Expired => write!(f, "expired"),
        }
    }
}

const VALID_TRANSITIONS: &[(PsiRequestStatus, PsiRequestStatus)] = &[
    (PsiRequestStatus::Pending, PsiRequestStatus::Processing),
    (PsiRequestStatus::Pending, PsiRequestStatus::Expired),
    (PsiRequestStatus::Processing, PsiRequestStatus::Completed),
    (PsiRequestStatus::Processing, PsiRequestStatus::Expired),
];

/// Status moves forward only: pending → processing → completed | expired.
pub fn ensure_valid_transition(from: PsiRequestStatus, to: PsiRequestStatus) -> Result<(), RendezvousError> {
    if from == to || VALID_TRANSITIONS.contains(&(from, to)) {
        Ok(())
    } else {
        Err(RendezvousError::InvalidStateTransition { from: from.to_string(), to: to.to_string() })
    }
}

/// A queued client query awaiting the owner. The raw auth token is never
/// stored, only its digest.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PendingPsiRequest {
    pub request_id: PsiRequestId,
    pub pool_id: PoolId,
    pub client_request: Vec<u8>,
    pub status: PsiRequestStatus,
    pub created_at_ms: TimestampMs,
    pub auth_token_hash: Option<Hash32>,
}

/// Owner-produced answer, uniquely keyed by request id, expiring after an hour.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PsiResponseRecord {
    pub request_id: PsiRequestId,
    pub pool_id: PoolId,
    pub setup_message: Vec<u8>,
    pub response: Vec<u8>,
    pub created_at_ms: TimestampMs,
    pub expires_at_ms: TimestampMs,
}
