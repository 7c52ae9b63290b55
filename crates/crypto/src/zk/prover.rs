//! Device-side proof generation.
//!
//! The prover computes `response = MiMC(secret, challenge)`, assigns the
//! full circuit and produces a compressed Groth16 proof over BN254. It never
//! talks to the network; callers obtain the challenge from the gateway and
//! submit the resulting [`ProofBundle`].

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey};
use ark_serialize::CanonicalSerialize;
use ark_snark::SNARK;
use rand::{CryptoRng, RngCore};
use std::path::Path;
use tracing::debug;

use super::circuit::AuthCircuit;
use super::encoding::{encode_device_id, FieldBytes};
use super::error::{ZkError, ZkResult};
use super::inputs::{ProofBundle, ProverInputs, PublicWitness};
use super::keys::load_proving_key;
use super::mimc::mimc_hash;

/// Enrollment commitment `MiMC(secret, encode(device_id))`.
pub fn compute_commitment(secret: &FieldBytes, device_id: &str) -> ZkResult<FieldBytes> {
    let device = encode_device_id(device_id)?;
    let digest = mimc_hash(&[secret.to_field()?, device.to_field()?]);
    Ok(FieldBytes::from_field(&digest))
}

/// Challenge response `MiMC(secret, challenge)`.
pub fn compute_response(secret: &FieldBytes, challenge: &FieldBytes) -> ZkResult<FieldBytes> {
    let digest = mimc_hash(&[secret.to_field()?, challenge.to_field()?]);
    Ok(FieldBytes::from_field(&digest))
}

/// Groth16 prover for the auth circuit.
#[derive(Clone, Default)]
pub struct AuthProver {
    proving_key: Option<ProvingKey<Bn254>>,
}

impl AuthProver {
    /// Create an uninitialized prover.
    pub fn new() -> Self {
        Self { proving_key: None }
    }

    /// Create a prover from an in-memory proving key.
    pub fn with_proving_key(proving_key: ProvingKey<Bn254>) -> Self {
        Self {
            proving_key: Some(proving_key),
        }
    }

    /// Load the proving key artifact.
    ///
    /// # Fail-Visible Pattern
    /// If the artifact is missing this returns an error with clear
    /// diagnostics; proof generation stays unavailable.
    pub fn initialize(&mut self, proving_key_path: &Path) -> ZkResult<()> {
        self.proving_key = Some(load_proving_key(proving_key_path)?);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.proving_key.is_some()
    }

    /// Generate a proof for `inputs`.
    pub fn prove<R: RngCore + CryptoRng>(
        &self,
        inputs: &ProverInputs,
        rng: &mut R,
    ) -> ZkResult<ProofBundle> {
        // Fail before touching any input so a misprovisioned device stops early.
        let proving_key = self.proving_key.as_ref().ok_or(ZkError::NotInitialized)?;

        let device_id = encode_device_id(&inputs.device_id)?;
        let secret = inputs.secret.to_field()?;
        let device_field = device_id.to_field()?;
        let challenge = inputs.challenge.to_field()?;
        let commitment = inputs.commitment.to_field()?;

        // Groth16 will happily produce a proof for an unsatisfied circuit, so
        // check the commitment opening here.
        if mimc_hash(&[secret, device_field]) != commitment {
            return Err(ZkError::CommitmentMismatch(
                "secret does not open the enrollment commitment".to_string(),
            ));
        }

        let response = mimc_hash(&[secret, challenge]);
        let circuit = AuthCircuit::assigned(secret, device_field, challenge, commitment, response);

        let proof = Groth16::<Bn254>::prove(proving_key, circuit, rng)
            .map_err(|e| ZkError::ProofGenerationFailed(e.to_string()))?;

        let mut proof_bytes = Vec::with_capacity(proof.compressed_size());
        proof
            .serialize_compressed(&mut proof_bytes)
            .map_err(|e| ZkError::ProofGenerationFailed(e.to_string()))?;

        debug!(device_id = %inputs.device_id, proof_len = proof_bytes.len(), "Auth proof generated");

        Ok(ProofBundle {
            proof: proof_bytes,
            public_witness: PublicWitness {
                device_id,
                challenge: inputs.challenge,
                commitment: inputs.commitment,
                response: FieldBytes::from_field(&response),
            },
        })
    }
}
