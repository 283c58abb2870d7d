//! In-process adapter fakes used by tests and single-instance deployments.

use crate::domain::matching::{Attestation, AttestationSignatures, WitnessSignature};
use crate::domain::token::UnlinkableToken;
use crate::foundation::{now_millis, Hash32, RendezvousError};
use crate::infrastructure::adapters::{AttestationGateway, TokenAuthority};
use crate::infrastructure::crypto::keys::{verify_signature, SigningKeypair};
use crate::infrastructure::crypto::random_bytes32;
use async_trait::async_trait;
use rand::rngs::OsRng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Issues random single-use tokens and verifies them by membership.
/// `set_unreachable` simulates an outage so fail-closed paths can be tested.
pub struct MockTokenAuthority {
    issuer: String,
    ttl_ms: u64,
    issued: Mutex<HashSet<Hash32>>,
    unreachable: AtomicBool,
}

impl MockTokenAuthority {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self { issuer: issuer.into(), ttl_ms: 10 * 60 * 1000, issued: Mutex::new(HashSet::new()), unreachable: AtomicBool::new(false) }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn check_reachable(&self, operation: &str) -> Result<(), RendezvousError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(RendezvousError::unavailable("token_authority", format!("{operation}: connection refused")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TokenAuthority for MockTokenAuthority {
    async fn verify(&self, token: &UnlinkableToken) -> Result<bool, RendezvousError> {
        self.check_reachable("verify")?;
        if token.issuer != self.issuer {
            return Ok(false);
        }
        // Single-use: verification consumes the token.
        let mut issued = self.issued.lock().map_err(|_| RendezvousError::Internal("issued set poisoned".to_string()))?;
        Ok(issued.remove(&token.digest()))
    }

    async fn request_token(&self, scope: &str) -> Result<UnlinkableToken, RendezvousError> {
        self.check_reachable("request_token")?;
        let token = UnlinkableToken {
            issuer: self.issuer.clone(),
            scope: scope.to_string(),
            expires_at_ms: now_millis() + self.ttl_ms,
            body: random_bytes32(&mut OsRng).to_vec(),
        };
        let mut issued = self.issued.lock().map_err(|_| RendezvousError::Internal("issued set poisoned".to_string()))?;
        issued.insert(token.digest());
        Ok(token)
    }
}

/// Single-witness attestation gateway signing with its own Ed25519 key.
pub struct MockAttestationGateway {
    signing: SigningKeypair,
    network_id: String,
    sequence: AtomicU64,
    attest_calls: AtomicU64,
}

impl MockAttestationGateway {
    pub fn new(network_id: impl Into<String>) -> Self {
        Self {
            signing: SigningKeypair::generate(&mut OsRng),
            network_id: network_id.into(),
            sequence: AtomicU64::new(1),
            attest_calls: AtomicU64::new(0),
        }
    }

    /// How many attestations were produced; detection idempotency tests
    /// assert this does not grow on repeat detects.
    pub fn attest_calls(&self) -> u64 {
        self.attest_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationGateway for MockAttestationGateway {
    async fn attest(&self, hash: &Hash32, _proof: Option<&UnlinkableToken>) -> Result<Attestation, RendezvousError> {
        self.attest_calls.fetch_add(1, Ordering::SeqCst);
        let signature = self.signing.sign(hash);
        Ok(Attestation {
            hashed: *hash,
            timestamp_secs: now_millis() / 1000,
            network_id: self.network_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            signatures: AttestationSignatures::Witnesses(vec![WitnessSignature {
                witness_id: "mock-witness".to_string(),
                signature,
            }]),
        })
    }

    async fn verify(&self, attestation: &Attestation, hash: &Hash32) -> Result<bool, RendezvousError> {
        if attestation.hashed != *hash {
            return Ok(false);
        }
        match &attestation.signatures {
            AttestationSignatures::Witnesses(witnesses) => {
                for witness in witnesses {
                    if !verify_signature(&self.signing.public(), hash, &witness.signature)? {
                        return Ok(false);
                    }
                }
                Ok(!witnesses.is_empty())
            }
            AttestationSignatures::Aggregate { .. } => Ok(false),
        }
    }
}
