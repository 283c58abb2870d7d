//! Adapter contracts for external services. Each is an interface,
//! replaceable and mockable; the core never speaks their wire protocols.

pub mod mock;

use crate::domain::matching::Attestation;
use crate::domain::token::UnlinkableToken;
use crate::foundation::{Hash32, TimestampMs, TOKEN_EXPIRY_SKEW_MS};
use async_trait::async_trait;

pub use mock::{MockAttestationGateway, MockTokenAuthority};

pub type Result<T> = crate::foundation::Result<T>;

/// Unlinkable-token issuer/verifier. Verification tolerates five minutes of
/// clock skew on expiration.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    async fn verify(&self, token: &UnlinkableToken) -> Result<bool>;

    fn is_expired(&self, token: &UnlinkableToken, now_ms: TimestampMs) -> bool {
        token.is_expired(now_ms, TOKEN_EXPIRY_SKEW_MS)
    }

    /// Federation side only: fetch a fresh single-use token for a scope.
    async fn request_token(&self, scope: &str) -> Result<UnlinkableToken>;
}

/// Timestamp-attestation gateway.
#[async_trait]
pub trait AttestationGateway: Send + Sync {
    async fn attest(&self, hash: &Hash32, proof: Option<&UnlinkableToken>) -> Result<Attestation>;
    async fn verify(&self, attestation: &Attestation, hash: &Hash32) -> Result<bool>;
}
