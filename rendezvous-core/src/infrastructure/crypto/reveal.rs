//! Reveal-on-match payloads: AES-256-GCM keyed directly by the match token,
//! envelope `nonce(12) ‖ ciphertext ‖ tag(16)`. Only a party able to derive
//! the same token can decrypt.

use crate::foundation::{MatchToken, RendezvousError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::{CryptoRng, RngCore};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub fn encrypt_reveal(
    token: &MatchToken,
    plaintext: &[u8],
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<Vec<u8>, RendezvousError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(token.as_bytes()));
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| RendezvousError::crypto("encrypt_reveal", "encryption failed"))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

pub fn decrypt_reveal(token: &MatchToken, envelope: &[u8]) -> Result<Vec<u8>, RendezvousError> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(RendezvousError::crypto("decrypt_reveal", "envelope too short"));
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(token.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| RendezvousError::crypto("decrypt_reveal", "authentication failed"))
}
