//! Sealed payloads: ephemeral X25519 + HKDF-SHA-256 + ChaCha20-Poly1305.
//! Wire shape is `ephemeral_pk(32) ‖ nonce(12) ‖ ciphertext+tag`.

use crate::foundation::{AgreementPublicKey, RendezvousError, SEALED_KEY_INFO};
use crate::infrastructure::crypto::keys::AgreementKeypair;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

const EPHEMERAL_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

fn derive_key(shared: &[u8; 32], nonce: &[u8; NONCE_LEN]) -> Key {
    let hkdf = Hkdf::<Sha256>::new(Some(nonce), shared);
    let mut okm = [0u8; 32];
    hkdf.expand(SEALED_KEY_INFO, &mut okm).expect("32 bytes is a valid HKDF output length");
    *Key::from_slice(&okm)
}

/// Encrypt to a recipient's agreement public key.
pub fn seal(
    recipient: &AgreementPublicKey,
    plaintext: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<u8>, RendezvousError> {
    let ephemeral = StaticSecret::random_from_rng(&mut *rng);
    let ephemeral_public = X25519Public::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&X25519Public::from(*recipient.as_bytes())).to_bytes();

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let cipher = ChaCha20Poly1305::new(&derive_key(&shared, &nonce));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| RendezvousError::crypto("seal", "encryption failed"))?;

    let mut envelope = Vec::with_capacity(EPHEMERAL_LEN + NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(ephemeral_public.as_bytes());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypt an envelope produced by [`seal`]. Any bit flip fails the tag.
pub fn open(recipient: &AgreementKeypair, envelope: &[u8]) -> Result<Vec<u8>, RendezvousError> {
    if envelope.len() < EPHEMERAL_LEN + NONCE_LEN + TAG_LEN {
        return Err(RendezvousError::crypto("open_sealed", "envelope too short"));
    }
    let (ephemeral_bytes, rest) = envelope.split_at(EPHEMERAL_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let ephemeral: [u8; 32] = ephemeral_bytes.try_into().expect("split length");
    let nonce: [u8; NONCE_LEN] = nonce_bytes.try_into().expect("split length");
    let shared = recipient.diffie_hellman(&AgreementPublicKey::new(ephemeral));

    let cipher = ChaCha20Poly1305::new(&derive_key(&shared, &nonce));
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext)
        .map_err(|_| RendezvousError::crypto("open_sealed", "authentication failed"))
}
