//! Error types for EdgeGuard authentication.
//!
//! Variants carry precise diagnostics for logs. What a client sees is
//! decided by [`AuthError::client_message`], which deliberately collapses
//! every authentication-path failure into one string.

use edgeguard_crypto::ZkError;
use thiserror::Error;

/// Message returned to clients for any authentication-path failure.
pub const AUTH_FAILED_MESSAGE: &str = "authentication failed";
/// Message returned to clients for server-side faults.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

/// Errors that can occur during device authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Device unknown, or not in an authenticatable state
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// No challenge with this id
    #[error("Challenge not found: {0}")]
    ChallengeNotFound(String),

    /// Challenge TTL elapsed
    #[error("Challenge expired: {0}")]
    ChallengeExpired(String),

    /// Challenge was already consumed
    #[error("Challenge already used: {0}")]
    ChallengeAlreadyUsed(String),

    /// Too many consecutive failures for this device
    #[error("Device locked out: {device_id} ({failures} consecutive failures)")]
    LockedOut { device_id: String, failures: u32 },

    /// Entitlement check refused the request
    #[error("License denied: {0}")]
    LicenseDenied(String),

    /// Public witness does not match the challenge or enrollment record
    #[error("Public witness mismatch: {0}")]
    WitnessMismatch(String),

    /// Proof is well-formed but does not verify
    #[error("Invalid proof")]
    InvalidProof,

    /// Proof bytes could not be decoded
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// Session exists but its TTL elapsed
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// No live session with this id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Token failed signature, format or time checks
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Request data that cannot be encoded
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persistence failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Proof backend failure unrelated to the submitted proof
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Service misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Poisoned lock or broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this outcome increments the device's retry counter when it
    /// ends a verification attempt.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            AuthError::DeviceNotFound(_)
                | AuthError::ChallengeNotFound(_)
                | AuthError::ChallengeExpired(_)
                | AuthError::ChallengeAlreadyUsed(_)
                | AuthError::WitnessMismatch(_)
                | AuthError::InvalidProof
                | AuthError::MalformedProof(_)
                | AuthError::InvalidInput(_)
        )
    }

    /// Whether this is a server-side fault rather than a rejected request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Storage(_)
                | AuthError::Crypto(_)
                | AuthError::Config(_)
                | AuthError::Serialization(_)
                | AuthError::Internal(_)
        )
    }

    /// Client-visible message. Never distinguishes which check failed.
    pub fn client_message(&self) -> &'static str {
        if self.is_internal() {
            INTERNAL_ERROR_MESSAGE
        } else {
            AUTH_FAILED_MESSAGE
        }
    }
}

impl From<ZkError> for AuthError {
    fn from(err: ZkError) -> Self {
        match err {
            ZkError::MalformedProof(msg) => AuthError::MalformedProof(msg),
            ZkError::InvalidEncoding(_) | ZkError::DeviceIdTooLong { .. } | ZkError::EmptyDeviceId => {
                AuthError::InvalidInput(err.to_string())
            }
            other => AuthError::Crypto(other.to_string()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
