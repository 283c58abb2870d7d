use std::io;
use thiserror::Error;

/// Stable machine-readable codes surfaced to the outer request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    PoolNotFound,
    PoolClosed,
    PoolNotInCommitPhase,
    PoolNotInRevealPhase,
    AlreadyRegistered,
    ParticipantNotFound,
    DuplicateNullifier,
    PreferenceLimitExceeded,
    InvalidEligibilityProof,
    CommitmentNotFound,
    CommitmentMismatch,
    InvalidPublicKey,
    InvalidPrivateKey,
    InvalidInput,
    Unauthorized,
    InvalidStateTransition,
    PsiSetupMissing,
    PsiRequestNotFound,
    PsiResponseGone,
    ServiceUnavailable,
    StorageError,
    SerializationError,
    CryptoError,
    TransportError,
    ConfigError,
    InternalError,
}

impl ErrorCode {
    /// Wire form of the code, stable across releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PoolNotFound => "POOL_NOT_FOUND",
            ErrorCode::PoolClosed => "POOL_CLOSED",
            ErrorCode::PoolNotInCommitPhase => "POOL_NOT_IN_COMMIT_PHASE",
            ErrorCode::PoolNotInRevealPhase => "POOL_NOT_IN_REVEAL_PHASE",
            ErrorCode::AlreadyRegistered => "ALREADY_REGISTERED",
            ErrorCode::ParticipantNotFound => "PARTICIPANT_NOT_FOUND",
            ErrorCode::DuplicateNullifier => "DUPLICATE_NULLIFIER",
            ErrorCode::PreferenceLimitExceeded => "PREFERENCE_LIMIT_EXCEEDED",
            ErrorCode::InvalidEligibilityProof => "INVALID_ELIGIBILITY_PROOF",
            ErrorCode::CommitmentNotFound => "COMMITMENT_NOT_FOUND",
            ErrorCode::CommitmentMismatch => "COMMITMENT_MISMATCH",
            ErrorCode::InvalidPublicKey => "INVALID_PUBLIC_KEY",
            ErrorCode::InvalidPrivateKey => "INVALID_PRIVATE_KEY",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::PsiSetupMissing => "PSI_SETUP_MISSING",
            ErrorCode::PsiRequestNotFound => "PSI_REQUEST_NOT_FOUND",
            ErrorCode::PsiResponseGone => "PSI_RESPONSE_GONE",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::CryptoError => "CRYPTO_ERROR",
            ErrorCode::TransportError => "TRANSPORT_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Transient failures the caller may retry; everything else is permanent-by-design.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCode::ServiceUnavailable | ErrorCode::StorageError | ErrorCode::TransportError)
    }
}

/// Error payload shape handed to the outer HTTP surface.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum RendezvousError {
    #[error("pool not found: {0}")]
    PoolNotFound(String),

    #[error("pool is closed: {0}")]
    PoolClosed(String),

    #[error("pool is not in commit phase (effective: {effective})")]
    PoolNotInCommitPhase { effective: String },

    #[error("pool is not in reveal phase (effective: {effective})")]
    PoolNotInRevealPhase { effective: String },

    #[error("participant already registered in pool {0}")]
    AlreadyRegistered(String),

    #[error("participant not found in pool {0}")]
    ParticipantNotFound(String),

    #[error("nullifier already used for this pool")]
    DuplicateNullifier,

    #[error("preference count {submitted} exceeds pool limit {limit}")]
    PreferenceLimitExceeded { submitted: usize, limit: u32 },

    #[error("eligibility proof rejected: {0}")]
    InvalidEligibilityProof(String),

    #[error("no commitment found for nullifier in pool {0}")]
    CommitmentNotFound(String),

    #[error("revealed tokens do not match any stored commitment")]
    CommitmentMismatch,

    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    #[error("invalid private key: {reason}")]
    InvalidPrivateKey { reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("pool {0} has no PSI setup")]
    PsiSetupMissing(String),

    #[error("PSI request not found: {0}")]
    PsiRequestNotFound(String),

    #[error("PSI response expired or was never produced")]
    PsiResponseGone,

    #[error("{service} unavailable: {details}")]
    ServiceUnavailable { service: String, details: String },

    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("transport error during {operation}: {details}")]
    TransportError { operation: String, details: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RendezvousError>;

impl RendezvousError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RendezvousError::PoolNotFound(_) => ErrorCode::PoolNotFound,
            RendezvousError::PoolClosed(_) => ErrorCode::PoolClosed,
            RendezvousError::PoolNotInCommitPhase { .. } => ErrorCode::PoolNotInCommitPhase,
            RendezvousError::PoolNotInRevealPhase { .. } => ErrorCode::PoolNotInRevealPhase,
            RendezvousError::AlreadyRegistered(_) => ErrorCode::AlreadyRegistered,
            RendezvousError::ParticipantNotFound(_) => ErrorCode::ParticipantNotFound,
            RendezvousError::DuplicateNullifier => ErrorCode::DuplicateNullifier,
            RendezvousError::PreferenceLimitExceeded { .. } => ErrorCode::PreferenceLimitExceeded,
            RendezvousError::InvalidEligibilityProof(_) => ErrorCode::InvalidEligibilityProof,
            RendezvousError::CommitmentNotFound(_) => ErrorCode::CommitmentNotFound,
            RendezvousError::CommitmentMismatch => ErrorCode::CommitmentMismatch,
            RendezvousError::InvalidPublicKey { .. } => ErrorCode::InvalidPublicKey,
            RendezvousError::InvalidPrivateKey { .. } => ErrorCode::InvalidPrivateKey,
            RendezvousError::InvalidInput(_) => ErrorCode::InvalidInput,
            RendezvousError::Unauthorized(_) => ErrorCode::Unauthorized,
            RendezvousError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            RendezvousError::PsiSetupMissing(_) => ErrorCode::PsiSetupMissing,
            RendezvousError::PsiRequestNotFound(_) => ErrorCode::PsiRequestNotFound,
            RendezvousError::PsiResponseGone => ErrorCode::PsiResponseGone,
            RendezvousError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            RendezvousError::StorageError { .. } => ErrorCode::StorageError,
            RendezvousError::SerializationError { .. } => ErrorCode::SerializationError,
            RendezvousError::CryptoError { .. } => ErrorCode::CryptoError,
            RendezvousError::TransportError { .. } => ErrorCode::TransportError,
            RendezvousError::ConfigError(_) => ErrorCode::ConfigError,
            RendezvousError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }

    pub fn storage(operation: impl Into<String>, details: impl std::fmt::Display) -> Self {
        RendezvousError::StorageError { operation: operation.into(), details: details.to_string() }
    }

    pub fn crypto(operation: impl Into<String>, details: impl std::fmt::Display) -> Self {
        RendezvousError::CryptoError { operation: operation.into(), details: details.to_string() }
    }

    pub fn unavailable(service: impl Into<String>, details: impl std::fmt::Display) -> Self {
        RendezvousError::ServiceUnavailable { service: service.into(), details: details.to_string() }
    }
}

impl From<hex::FromHexError> for RendezvousError {
    fn from(err: hex::FromHexError) -> Self {
        RendezvousError::InvalidInput(format!("hex decode error: {}", err))
    }
}

impl From<io::Error> for RendezvousError {
    fn from(err: io::Error) -> Self {
        RendezvousError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for RendezvousError {
    fn from(err: serde_json::Error) -> Self {
        RendezvousError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<bincode::Error> for RendezvousError {
    fn from(err: bincode::Error) -> Self {
        RendezvousError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<toml::de::Error> for RendezvousError {
    fn from(err: toml::de::Error) -> Self {
        RendezvousError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<rocksdb::Error> for RendezvousError {
    fn from(err: rocksdb::Error) -> Self {
        RendezvousError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

// NOTE: Avoid adding generic "stringly" error conversions here.
// Use structured `RendezvousError` variants at the call site to preserve context.
