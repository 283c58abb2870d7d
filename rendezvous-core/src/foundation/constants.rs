//! Protocol constants. Domain separators are part of the wire protocol;
//! changing any of them requires a protocol version bump.

/// Protocol version baked into result hashes and federation handshakes.
pub const PROTOCOL_VERSION: &str = "rendezvous-v1";

/// Domain separator for match-token derivation.
pub const MATCH_TOKEN_DOMAIN: &[u8] = b"rendezvous-match-v1";

/// Domain separator for nullifier derivation.
pub const NULLIFIER_DOMAIN: &[u8] = b"rendezvous-nullifier-v1";

/// HKDF info string for sealed-payload key derivation.
pub const SEALED_KEY_INFO: &[u8] = b"rendezvous-encrypt-v1";

/// Domain separator prefixed to every signed message before hashing.
pub const SIGN_DOMAIN: &[u8] = b"rendezvous-sign-v1";

/// Domain separator for PSI element hashing onto the curve.
pub const PSI_ELEMENT_DOMAIN: &[u8] = b"rendezvous-psi-v1";

pub const MAX_POOL_NAME_LEN: usize = 200;

/// Decoy padding per accepted submission, inclusive bounds.
pub const DECOY_MIN: usize = 3;
pub const DECOY_MAX: usize = 8;

/// Signed request envelopes are rejected outside this window.
pub const ENVELOPE_MAX_SKEW_MS: u64 = 5 * 60 * 1000;

/// Clock-skew tolerance applied to unlinkable-token expiration checks.
pub const TOKEN_EXPIRY_SKEW_MS: u64 = 5 * 60 * 1000;

/// PSI response records are purged this long after creation.
pub const PSI_RESPONSE_TTL_MS: u64 = 60 * 60 * 1000;

/// Post-deadline privacy delay before match computation, inclusive bounds.
pub const PRIVACY_DELAY_MIN_SECS: u64 = 30;
pub const PRIVACY_DELAY_MAX_SECS: u64 = 180;

/// Deadline scanner period.
pub const AUTO_CLOSE_SCAN_INTERVAL_SECS: u64 = 60;

/// Federation periodic sync tick.
pub const FEDERATION_SYNC_INTERVAL_SECS: u64 = 30;

/// Base jitter applied to every peer send, inclusive bounds in milliseconds.
pub const SEND_JITTER_MIN_MS: u64 = 100;
pub const SEND_JITTER_MAX_MS: u64 = 2000;

/// Additional jitter before anonymous token relays, inclusive bounds in seconds.
pub const RELAY_JITTER_MIN_SECS: u64 = 5;
pub const RELAY_JITTER_MAX_SECS: u64 = 60;

/// Adapter call deadlines.
pub const VERIFIER_TIMEOUT_SECS: u64 = 5;
pub const ATTESTATION_TIMEOUT_SECS: u64 = 10;
pub const JOIN_REQUEST_TIMEOUT_SECS: u64 = 30;
