//! Gateway-side proof verification.
//!
//! Verification is a strategy selected once at startup:
//! - [`Groth16Verifier`] checks proofs against a pre-generated verifying key.
//! - [`AcceptAllVerifier`] accepts any non-empty proof. It exists for bench
//!   setups without key artifacts and can only be built when the
//!   configuration opts in explicitly.
//!
//! A cryptographically invalid proof is a normal negative outcome
//! (`Ok(false)`); errors are reserved for malformed input or an unusable
//! backend.

use ark_bn254::Bn254;
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_serialize::CanonicalDeserialize;
use ark_snark::SNARK;
use edgeguard_core::{VerifierBackendKind, ZkpConfig};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use super::circuit::NUM_PUBLIC_INPUTS;
use super::error::{ZkError, ZkResult};
use super::inputs::PublicWitness;
use super::keys::load_verifying_key;

/// Trait for proof verification (dependency injection)
pub trait ProofVerifier: Send + Sync {
    /// Check `proof` against `witness`.
    fn verify(&self, proof: &[u8], witness: &PublicWitness) -> ZkResult<bool>;

    /// Short backend identifier for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Groth16/BN254 verifier with a one-time key load.
#[derive(Default)]
pub struct Groth16Verifier {
    key: RwLock<Option<PreparedVerifyingKey<Bn254>>>,
}

impl Groth16Verifier {
    /// Create an uninitialized verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a verifier that is ready immediately.
    pub fn with_verifying_key(key: &VerifyingKey<Bn254>) -> ZkResult<Self> {
        let verifier = Self::new();
        verifier.initialize_with_key(key)?;
        Ok(verifier)
    }

    /// Load the verifying key from disk. Subsequent calls are no-ops.
    pub fn initialize(&self, verifying_key_path: &Path) -> ZkResult<()> {
        let mut guard = self.key.write().map_err(|_| ZkError::NotInitialized)?;
        if guard.is_some() {
            return Ok(());
        }

        info!(key_path = %verifying_key_path.display(), "Initializing ZKP verifier");
        let key = load_verifying_key(verifying_key_path)?;
        *guard = Some(prepare(&key)?);
        info!("ZKP verifier initialized with pre-generated verifying key");
        Ok(())
    }

    /// Install an in-memory verifying key. Subsequent calls are no-ops.
    pub fn initialize_with_key(&self, key: &VerifyingKey<Bn254>) -> ZkResult<()> {
        let mut guard = self.key.write().map_err(|_| ZkError::NotInitialized)?;
        if guard.is_none() {
            *guard = Some(prepare(key)?);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.key.read().map(|guard| guard.is_some()).unwrap_or(false)
    }
}

fn prepare(key: &VerifyingKey<Bn254>) -> ZkResult<PreparedVerifyingKey<Bn254>> {
    if key.gamma_abc_g1.len() != NUM_PUBLIC_INPUTS + 1 {
        return Err(ZkError::KeySerialization(format!(
            "verifying key expects {} public inputs, auth circuit has {}",
            key.gamma_abc_g1.len().saturating_sub(1),
            NUM_PUBLIC_INPUTS
        )));
    }
    Groth16::<Bn254>::process_vk(key).map_err(|e| ZkError::KeySerialization(e.to_string()))
}

/// Decode a compressed proof, validating that every point is on-curve and in
/// the prime-order subgroup.
pub fn decode_proof(bytes: &[u8]) -> ZkResult<Proof<Bn254>> {
    if bytes.is_empty() {
        return Err(ZkError::MalformedProof("empty proof".to_string()));
    }
    let mut reader = bytes;
    let proof = Proof::<Bn254>::deserialize_compressed(&mut reader)
        .map_err(|e| ZkError::MalformedProof(e.to_string()))?;
    if !reader.is_empty() {
        return Err(ZkError::MalformedProof(format!(
            "{} trailing bytes after proof",
            reader.len()
        )));
    }
    Ok(proof)
}

impl ProofVerifier for Groth16Verifier {
    fn verify(&self, proof: &[u8], witness: &PublicWitness) -> ZkResult<bool> {
        let guard = self.key.read().map_err(|_| ZkError::NotInitialized)?;
        let key = guard.as_ref().ok_or(ZkError::NotInitialized)?;

        let proof = decode_proof(proof)?;
        let inputs = witness.to_field_elements()?;

        let valid = Groth16::<Bn254>::verify_with_processed_vk(key, &inputs, &proof)
            .map_err(|e| ZkError::VerificationFailed(e.to_string()))?;
        if !valid {
            debug!("Groth16 pairing check rejected proof");
        }
        Ok(valid)
    }

    fn backend_name(&self) -> &'static str {
        "groth16"
    }
}

/// Verifier that accepts every non-empty proof. Never use in production.
pub struct AcceptAllVerifier {
    _private: (),
}

impl AcceptAllVerifier {
    /// Build the insecure verifier. Requires the explicit opt-in flag.
    pub fn new(allow_insecure_backend: bool) -> ZkResult<Self> {
        if !allow_insecure_backend {
            return Err(ZkError::InsecureBackendRefused(
                "accept-all verifier requires allow_insecure_backend = true".to_string(),
            ));
        }
        warn!("INSECURE: accept-all proof verifier enabled; any non-empty proof authenticates");
        Ok(Self { _private: () })
    }
}

impl ProofVerifier for AcceptAllVerifier {
    fn verify(&self, proof: &[u8], witness: &PublicWitness) -> ZkResult<bool> {
        if proof.is_empty() {
            return Err(ZkError::MalformedProof("empty proof".to_string()));
        }
        witness.to_field_elements()?;
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "accept-all"
    }
}

/// Construct the verifier selected by configuration, fully initialized.
pub fn build_verifier(config: &ZkpConfig) -> ZkResult<Arc<dyn ProofVerifier>> {
    match config.backend {
        VerifierBackendKind::Groth16 => {
            let path = config.verifying_key_path.as_deref().ok_or_else(|| {
                ZkError::VerificationKeyNotFound("zkp.verifying_key_path not set".to_string())
            })?;
            let verifier = Groth16Verifier::new();
            verifier.initialize(path)?;
            Ok(Arc::new(verifier))
        }
        VerifierBackendKind::AcceptAll => {
            Ok(Arc::new(AcceptAllVerifier::new(config.allow_insecure_backend)?))
        }
    }
}
