//! Input and output types for the auth proof.

use ark_bn254::Fr;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::circuit::NUM_PUBLIC_INPUTS;
use super::encoding::FieldBytes;
use super::error::{ZkError, ZkResult};

/// Public inputs of the auth relation, exchanged openly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicWitness {
    /// Field encoding of the device id
    pub device_id: FieldBytes,
    /// Challenge nonce
    pub challenge: FieldBytes,
    /// Enrollment commitment `MiMC(secret, device_id)`
    pub commitment: FieldBytes,
    /// Challenge response `MiMC(secret, challenge)`
    pub response: FieldBytes,
}

impl PublicWitness {
    /// Field elements in circuit input order.
    pub fn to_field_elements(&self) -> ZkResult<[Fr; NUM_PUBLIC_INPUTS]> {
        Ok([
            self.device_id.to_field()?,
            self.challenge.to_field()?,
            self.commitment.to_field()?,
            self.response.to_field()?,
        ])
    }
}

/// Device-side inputs to proof generation.
///
/// The secret is wiped when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ProverInputs {
    /// Device secret (private)
    pub secret: FieldBytes,
    /// Human-readable device id
    pub device_id: String,
    /// Nonce received from the gateway
    pub challenge: FieldBytes,
    /// Commitment recorded at enrollment
    pub commitment: FieldBytes,
}

impl ProverInputs {
    /// Build prover inputs from their hex wire forms.
    pub fn from_hex(
        secret_hex: &str,
        device_id: &str,
        challenge_hex: &str,
        commitment_hex: &str,
    ) -> ZkResult<Self> {
        Ok(Self {
            secret: FieldBytes::from_hex(secret_hex)?,
            device_id: device_id.to_string(),
            challenge: FieldBytes::from_hex(challenge_hex)?,
            commitment: FieldBytes::from_hex(commitment_hex)?,
        })
    }
}

impl std::fmt::Debug for ProverInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProverInputs")
            .field("secret", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("challenge", &self.challenge)
            .field("commitment", &self.commitment)
            .finish()
    }
}

/// Output of the prover: serialized proof plus the public witness it proves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBundle {
    /// Compressed Groth16 proof
    pub proof: Vec<u8>,
    /// Public inputs the proof was generated for
    pub public_witness: PublicWitness,
}

/// JSON form of a proof: base64 proof bytes plus hex public witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofPayload {
    pub proof: String,
    pub public_witness: PublicWitness,
}

impl ProofPayload {
    /// Decode the base64 proof bytes.
    pub fn proof_bytes(&self) -> ZkResult<Vec<u8>> {
        BASE64
            .decode(self.proof.trim())
            .map_err(|e| ZkError::MalformedProof(format!("invalid base64: {}", e)))
    }
}

impl From<&ProofBundle> for ProofPayload {
    fn from(bundle: &ProofBundle) -> Self {
        Self {
            proof: BASE64.encode(&bundle.proof),
            public_witness: bundle.public_witness,
        }
    }
}
