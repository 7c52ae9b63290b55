//! Error types for Zero-Knowledge proof operations.

use thiserror::Error;

/// Result type for ZK operations
pub type ZkResult<T> = std::result::Result<T, ZkError>;

/// Error types for Zero-Knowledge proof operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZkError {
    /// Prover or verifier used before its key was loaded
    #[error("ZK backend not initialized")]
    NotInitialized,

    /// Proving key not found
    #[error("Proving key not found: {0}")]
    ProvingKeyNotFound(String),

    /// Verification key not found
    #[error("Verification key not found: {0}")]
    VerificationKeyNotFound(String),

    /// Key artifact could not be (de)serialized
    #[error("Key serialization error: {0}")]
    KeySerialization(String),

    /// Trusted setup failed
    #[error("Circuit setup failed: {0}")]
    SetupFailed(String),

    /// Hex or field encoding rejected
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Device id cannot be represented as a single field element
    #[error("Device id is {len} bytes, maximum is {max}")]
    DeviceIdTooLong { len: usize, max: usize },

    /// Device id is empty
    #[error("Device id is empty")]
    EmptyDeviceId,

    /// Commitment does not open to the supplied secret
    #[error("Commitment mismatch: {0}")]
    CommitmentMismatch(String),

    /// Proof generation failed
    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// Proof bytes could not be decoded
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// Verification could not be carried out
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Insecure backend requested without the explicit opt-in flag
    #[error("Insecure verifier backend refused: {0}")]
    InsecureBackendRefused(String),
}
