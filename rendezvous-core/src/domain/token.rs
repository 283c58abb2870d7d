use crate::foundation::{Hash32, RendezvousError, TimestampMs};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Serialized form of an unlinkable authorization token: a small tagged
/// envelope around the issuer's opaque proof bytes. Issuance cannot be
/// linked to redemption; the body is meaningful only to the issuer's
/// verifier.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UnlinkableToken {
    pub issuer: String,
    pub scope: String,
    pub expires_at_ms: TimestampMs,
    pub body: Vec<u8>,
}

impl UnlinkableToken {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RendezvousError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RendezvousError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Expiry check with the caller-supplied skew tolerance.
    pub fn is_expired(&self, now_ms: TimestampMs, skew_ms: u64) -> bool {
        now_ms > self.expires_at_ms.saturating_add(skew_ms)
    }

    /// Digest stored alongside queued work so the raw token is never persisted.
    pub fn digest(&self) -> Hash32 {
        let mut hasher = Sha256::new();
        hasher.update(self.issuer.as_bytes());
        hasher.update(self.scope.as_bytes());
        hasher.update(self.expires_at_ms.to_be_bytes());
        hasher.update(&self.body);
        hasher.finalize().into()
    }
}
