//! Match detection math and the result record. All functions here are pure;
//! the detector in the application layer feeds them from storage.

use crate::foundation::{Hash32, MatchToken, PoolId, TimestampMs, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// One per pool, append-once.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchResult {
    pub pool_id: PoolId,
    /// Tokens whose revealed occurrence count is exactly 2, sorted.
    pub matched_tokens: Vec<MatchToken>,
    /// Revealed preference rows scanned, decoys included.
    pub total_submissions: u64,
    /// Distinct nullifiers that submitted to the pool.
    pub unique_participants: u64,
    pub detected_at_ms: TimestampMs,
    pub result_hash: Hash32,
    pub attestation: Option<Attestation>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchStats {
    pub pool_id: PoolId,
    pub total_submissions: u64,
    pub unique_participants: u64,
    pub matched_token_count: u64,
    pub detected_at_ms: Option<TimestampMs>,
}

/// External signed certification binding the result hash to a timestamp.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Attestation {
    pub hashed: Hash32,
    pub timestamp_secs: u64,
    pub network_id: String,
    pub sequence: u64,
    pub signatures: AttestationSignatures,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationSignatures {
    Witnesses(Vec<WitnessSignature>),
    Aggregate { signature: Vec<u8>, signer_ids: Vec<String> },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WitnessSignature {
    pub witness_id: String,
    pub signature: Vec<u8>,
}

/// Recount-based verification outcome. Errors are reported, never thrown.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IntegrityReport {
    pub consistent: bool,
    pub errors: Vec<String>,
}

/// A mutual match is a token that appears exactly twice: once from each side.
pub fn matched_tokens(counts: &HashMap<MatchToken, u32>) -> Vec<MatchToken> {
    let mut matched: Vec<MatchToken> = counts.iter().filter(|(_, count)| **count == 2).map(|(token, _)| *token).collect();
    matched.sort();
    matched
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultDigest<'a> {
    pool_id: String,
    matched_tokens: Vec<String>,
    participant_count: u64,
    version: &'a str,
}

/// Deterministic content hash of a detection result. Field order is fixed by
/// the struct declaration; tokens are hashed in sorted order.
pub fn result_hash(pool_id: &PoolId, matched: &[MatchToken], participant_count: u64) -> Hash32 {
    let mut tokens: Vec<String> = matched.iter().map(|t| t.to_string()).collect();
    tokens.sort();
    let digest = ResultDigest {
        pool_id: pool_id.to_string(),
        matched_tokens: tokens,
        participant_count,
        version: PROTOCOL_VERSION,
    };
    let json = serde_json::to_vec(&digest).expect("result digest serialization is infallible");
    Sha256::digest(&json).into()
}

/// Check a stored result against a fresh recount.
pub fn verify_counts(result: &MatchResult, counts: &HashMap<MatchToken, u32>) -> IntegrityReport {
    let mut errors = Vec::new();

    for token in &result.matched_tokens {
        match counts.get(token) {
            Some(2) => {}
            Some(count) => errors.push(format!("matched token {token} has occurrence count {count}, expected 2")),
            None => errors.push(format!("matched token {token} has no revealed occurrences")),
        }
    }

    for (token, count) in counts {
        if *count > 2 {
            errors.push(format!("token {token} has occurrence count {count} > 2"));
        }
        if *count == 2 && !result.matched_tokens.contains(token) {
            errors.push(format!("token {token} counts as a match but is missing from the result"));
        }
    }

    IntegrityReport { consistent: errors.is_empty(), errors }
}
