use crate::foundation::{AgreementPublicKey, Hash32, MatchToken, Nullifier, PoolId, MATCH_TOKEN_DOMAIN, NULLIFIER_DOMAIN};
use crate::infrastructure::crypto::keys::AgreementKeypair;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// H(DH(my_secret, their_public) ‖ pool_id ‖ domain). Both sides of a mutual
/// selection derive the same 32 bytes; this symmetry is what match detection
/// counts on.
pub fn derive_match_token(mine: &AgreementKeypair, their_public: &AgreementPublicKey, pool_id: &PoolId) -> MatchToken {
    let shared = mine.diffie_hellman(their_public);
    let mut hasher = Sha256::new();
    hasher.update(shared);
    hasher.update(pool_id.as_bytes());
    hasher.update(MATCH_TOKEN_DOMAIN);
    MatchToken::new(hasher.finalize().into())
}

/// Deterministic per (participant, pool); different across pools, so the
/// server can detect duplicate submissions without learning who submitted.
pub fn derive_nullifier(mine: &AgreementKeypair, pool_id: &PoolId) -> Nullifier {
    let mut hasher = Sha256::new();
    hasher.update(mine.secret_bytes());
    hasher.update(pool_id.as_bytes());
    hasher.update(NULLIFIER_DOMAIN);
    Nullifier::new(hasher.finalize().into())
}

pub fn commit_token(token: &MatchToken) -> Hash32 {
    Sha256::digest(token.as_bytes()).into()
}

/// Constant-time commitment check.
pub fn verify_commitment(token: &MatchToken, commitment: &Hash32) -> bool {
    let recomputed = commit_token(token);
    bool::from(recomputed.ct_eq(commitment))
}
