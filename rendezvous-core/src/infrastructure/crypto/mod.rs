//! Crypto primitives. Everything here is synchronous and CPU-bound; all
//! inputs and outputs at the boundary are opaque byte strings.

pub mod envelope;
pub mod keys;
pub mod reveal;
pub mod sealed;
pub mod tokens;

pub use envelope::{sign_request, verify_request, SignedRequest};
pub use keys::{AgreementKeypair, SigningKeypair};
pub use tokens::{commit_token, derive_match_token, derive_nullifier, verify_commitment};

use rand::{CryptoRng, RngCore};

/// Uniform random 32 bytes, used for pool ids, request ids, and decoy tokens.
pub fn random_bytes32(rng: &mut (impl RngCore + CryptoRng)) -> [u8; 32] {
    let mut out = [0u8; 32];
    rng.fill_bytes(&mut out);
    out
}
