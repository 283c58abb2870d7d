use crate::foundation::util::encoding::parse_hex_fixed;
use crate::foundation::{AgreementPublicKey, RendezvousError, SigningPublicKey, SIGN_DOMAIN};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

/// X25519 key-agreement keypair. Every 32-byte string is a usable public
/// key; clamping happens inside the scalar multiplication.
#[derive(Clone)]
pub struct AgreementKeypair {
    secret: StaticSecret,
}

impl AgreementKeypair {
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        Self { secret: StaticSecret::random_from_rng(rng) }
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self { secret: StaticSecret::from(bytes) }
    }

    pub fn from_secret_hex(value: &str) -> Result<Self, RendezvousError> {
        let bytes = parse_hex_fixed::<32>(value)
            .map_err(|err| RendezvousError::InvalidPrivateKey { reason: err.to_string() })?;
        Ok(Self::from_secret_bytes(bytes))
    }

    pub fn public(&self) -> AgreementPublicKey {
        AgreementPublicKey::new(X25519Public::from(&self.secret).to_bytes())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn diffie_hellman(&self, their_public: &AgreementPublicKey) -> [u8; 32] {
        let public = X25519Public::from(*their_public.as_bytes());
        self.secret.diffie_hellman(&public).to_bytes()
    }
}

/// Ed25519 signing keypair for administrative authentication.
#[derive(Clone)]
pub struct SigningKeypair {
    signing: SigningKey,
}

impl SigningKeypair {
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        Self { signing: SigningKey::generate(rng) }
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self { signing: SigningKey::from_bytes(&bytes) }
    }

    pub fn public(&self) -> SigningPublicKey {
        SigningPublicKey::new(self.signing.verifying_key().to_bytes())
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(&domain_hash(message)).to_vec()
    }
}

fn domain_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SIGN_DOMAIN);
    hasher.update(message);
    hasher.finalize().into()
}

/// Verify a detached signature produced by [`SigningKeypair::sign`].
pub fn verify_signature(key: &SigningPublicKey, message: &[u8], signature: &[u8]) -> Result<bool, RendezvousError> {
    let verifying = VerifyingKey::from_bytes(key.as_bytes())
        .map_err(|err| RendezvousError::InvalidPublicKey { reason: format!("not a valid Ed25519 point: {err}") })?;
    let sig_bytes: [u8; 64] = match signature.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    let signature = Signature::from_bytes(&sig_bytes);
    Ok(verifying.verify(&domain_hash(message), &signature).is_ok())
}

/// Parse a hex-encoded agreement public key. Exactly 32 bytes or rejected.
pub fn parse_agreement_key(value: &str) -> Result<AgreementPublicKey, RendezvousError> {
    let bytes =
        parse_hex_fixed::<32>(value).map_err(|err| RendezvousError::InvalidPublicKey { reason: err.to_string() })?;
    Ok(AgreementPublicKey::new(bytes))
}
