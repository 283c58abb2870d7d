//! ECDH-PSI on ristretto255.
//!
//! The server keys its element set with a secret scalar k and publishes
//! digests of Hp(x)·k. A client blinds each query element with a random
//! scalar r, the key holder evaluates (Hp(y)·r)·k, and the client unblinds
//! with r⁻¹ to recover Hp(y)·k and intersect locally. Neither side learns
//! the other's non-intersecting elements.

use crate::foundation::{MatchToken, RendezvousError, PSI_ELEMENT_DOMAIN};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{PsiParams, PsiStructure};

/// The server-side secret. Only ever persisted sealed to the owner's key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PsiServerKey {
    bytes: [u8; 32],
}

impl PsiServerKey {
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> Self {
        Self { bytes: Scalar::random(rng).to_bytes() }
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, RendezvousError> {
        let scalar: Option<Scalar> = Scalar::from_canonical_bytes(bytes).into();
        match scalar {
            Some(_) => Ok(Self { bytes }),
            None => Err(RendezvousError::InvalidPrivateKey { reason: "non-canonical PSI server scalar".to_string() }),
        }
    }

    fn scalar(&self) -> Scalar {
        // Canonicality is checked on construction.
        Option::<Scalar>::from(Scalar::from_canonical_bytes(self.bytes)).expect("canonical scalar")
    }
}

/// Public setup message: the keyed, digested server set.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PsiSetupMessage {
    pub structure: PsiStructure,
    pub digest_len: u8,
    pub element_count: u32,
    /// Sorted, deduplicated entries; sorting hides insertion order.
    pub entries: Vec<Vec<u8>>,
}

impl PsiSetupMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RendezvousError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RendezvousError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PsiClientRequest {
    pub blinded: Vec<[u8; 32]>,
}

impl PsiClientRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RendezvousError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RendezvousError> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn element_count(&self) -> usize {
        self.blinded.len()
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PsiServerResponse {
    pub evaluated: Vec<[u8; 32]>,
}

impl PsiServerResponse {
    pub fn to_bytes(&self) -> Result<Vec<u8>, RendezvousError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RendezvousError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Client-side state kept between request and intersection. Never serialized.
pub struct PsiClientSession {
    elements: Vec<MatchToken>,
    blinds: Vec<Scalar>,
}

fn element_point(token: &MatchToken) -> RistrettoPoint {
    let mut input = Vec::with_capacity(PSI_ELEMENT_DOMAIN.len() + 32);
    input.extend_from_slice(PSI_ELEMENT_DOMAIN);
    input.extend_from_slice(token.as_bytes());
    RistrettoPoint::hash_from_bytes::<Sha512>(&input)
}

fn digest_of_point(compressed: &[u8; 32], digest_len: usize) -> Vec<u8> {
    let full: [u8; 32] = Sha256::digest(compressed).into();
    full[..digest_len].to_vec()
}

/// Digest length giving the configured false-positive rate for a set of this
/// size, clamped to [8, 32] bytes.
pub fn digest_len_for(element_count: usize, false_positive_rate: f64) -> usize {
    let rate = false_positive_rate.clamp(1e-18, 0.5);
    let bits = ((element_count.max(1) as f64) / rate).log2().ceil();
    let bytes = (bits / 8.0).ceil() as usize;
    bytes.clamp(8, 32)
}

/// Key the server set and produce the public setup message.
pub fn server_setup(key: &PsiServerKey, elements: &[MatchToken], params: &PsiParams) -> PsiSetupMessage {
    let k = key.scalar();
    let digest_len = match params.structure {
        PsiStructure::TruncatedHash => digest_len_for(elements.len(), params.false_positive_rate),
        PsiStructure::RawPoints => 32,
    };

    let mut entries: Vec<Vec<u8>> = elements
        .iter()
        .map(|element| {
            let keyed = (element_point(element) * k).compress().to_bytes();
            match params.structure {
                PsiStructure::TruncatedHash => digest_of_point(&keyed, digest_len),
                PsiStructure::RawPoints => keyed.to_vec(),
            }
        })
        .collect();
    entries.sort();
    entries.dedup();

    PsiSetupMessage { structure: params.structure, digest_len: digest_len as u8, element_count: elements.len() as u32, entries }
}

/// Blind the client's elements. The session holds the blinds for unblinding.
pub fn client_request(elements: &[MatchToken], rng: &mut (impl RngCore + CryptoRng)) -> (PsiClientRequest, PsiClientSession) {
    let blinds: Vec<Scalar> = elements.iter().map(|_| Scalar::random(rng)).collect();
    let blinded = elements
        .iter()
        .zip(&blinds)
        .map(|(element, blind)| (element_point(element) * blind).compress().to_bytes())
        .collect();
    (PsiClientRequest { blinded }, PsiClientSession { elements: elements.to_vec(), blinds })
}

/// Evaluate the server key over a blinded request. Runs wherever the key
/// lives, which for owner-held pools is the owner's machine.
pub fn server_process(key: &PsiServerKey, request: &PsiClientRequest) -> Result<PsiServerResponse, RendezvousError> {
    let k = key.scalar();
    let mut evaluated = Vec::with_capacity(request.blinded.len());
    for compressed in &request.blinded {
        let point = CompressedRistretto::from_slice(compressed)
            .ok()
            .and_then(|c| c.decompress())
            .ok_or_else(|| RendezvousError::crypto("psi_process", "invalid blinded point"))?;
        evaluated.push((point * k).compress().to_bytes());
    }
    Ok(PsiServerResponse { evaluated })
}

/// Unblind the response and intersect against the setup structure.
pub fn client_intersect(
    session: &PsiClientSession,
    setup: &PsiSetupMessage,
    response: &PsiServerResponse,
) -> Result<Vec<MatchToken>, RendezvousError> {
    if response.evaluated.len() != session.blinds.len() {
        return Err(RendezvousError::crypto("psi_intersect", "response length does not match request"));
    }

    let mut intersection = Vec::new();
    for ((element, blind), evaluated) in session.elements.iter().zip(&session.blinds).zip(&response.evaluated) {
        let point = CompressedRistretto::from_slice(evaluated)
            .ok()
            .and_then(|c| c.decompress())
            .ok_or_else(|| RendezvousError::crypto("psi_intersect", "invalid evaluated point"))?;
        let unblinded = (point * blind.invert()).compress().to_bytes();
        let needle = match setup.structure {
            PsiStructure::TruncatedHash => digest_of_point(&unblinded, setup.digest_len as usize),
            PsiStructure::RawPoints => unblinded.to_vec(),
        };
        if setup.entries.binary_search(&needle).is_ok() {
            intersection.push(*element);
        }
    }
    Ok(intersection)
}

/// Cardinality-only variant.
pub fn client_intersection_size(
    session: &PsiClientSession,
    setup: &PsiSetupMessage,
    response: &PsiServerResponse,
) -> Result<usize, RendezvousError> {
    Ok(client_intersect(session, setup, response)?.len())
}
