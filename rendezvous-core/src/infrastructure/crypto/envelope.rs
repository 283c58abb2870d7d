//! Signed request envelopes for owner-authenticated administrative actions:
//! a detached signature over `"action:pool_id:timestamp_ms"`, rejected
//! outside a ±5-minute window.

use crate::foundation::{PoolId, RendezvousError, SigningPublicKey, TimestampMs, ENVELOPE_MAX_SKEW_MS};
use crate::infrastructure::crypto::keys::{verify_signature, SigningKeypair};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignedRequest {
    pub action: String,
    pub pool_id: PoolId,
    pub timestamp_ms: TimestampMs,
    pub signature: Vec<u8>,
}

fn message_bytes(action: &str, pool_id: &PoolId, timestamp_ms: TimestampMs) -> Vec<u8> {
    format!("{action}:{pool_id}:{timestamp_ms}").into_bytes()
}

pub fn sign_request(keypair: &SigningKeypair, action: &str, pool_id: &PoolId, now_ms: TimestampMs) -> SignedRequest {
    let signature = keypair.sign(&message_bytes(action, pool_id, now_ms));
    SignedRequest { action: action.to_string(), pool_id: *pool_id, timestamp_ms: now_ms, signature }
}

/// Check the signature and the freshness window. The expected action guards
/// against replaying an envelope signed for a different operation.
pub fn verify_request(
    key: &SigningPublicKey,
    request: &SignedRequest,
    expected_action: &str,
    now_ms: TimestampMs,
) -> Result<(), RendezvousError> {
    if request.action != expected_action {
        return Err(RendezvousError::Unauthorized(format!(
            "signed request is for action {:?}, expected {:?}",
            request.action, expected_action
        )));
    }

    let skew = now_ms.abs_diff(request.timestamp_ms);
    if skew > ENVELOPE_MAX_SKEW_MS {
        return Err(RendezvousError::Unauthorized(format!("signed request timestamp outside window (skew {skew} ms)")));
    }

    let message = message_bytes(&request.action, &request.pool_id, request.timestamp_ms);
    if !verify_signature(key, &message, &request.signature)? {
        return Err(RendezvousError::Unauthorized("signed request signature invalid".to_string()));
    }
    Ok(())
}
