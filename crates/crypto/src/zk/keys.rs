//! Groth16 key generation and key artifact I/O.
//!
//! Keys are produced once by a circuit-specific setup over [`AuthCircuit`]
//! and distributed as compressed `ark-serialize` blobs: the proving key to
//! devices, the verifying key to gateways.

use ark_bn254::Bn254;
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use rand::{CryptoRng, RngCore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::circuit::AuthCircuit;
use super::error::{ZkError, ZkResult};

/// Default proving key file name.
pub const PROVING_KEY_FILE: &str = "auth_proving.key";
/// Default verifying key file name.
pub const VERIFYING_KEY_FILE: &str = "auth_verifying.key";

/// Proving/verifying key pair bound to the auth circuit.
#[derive(Clone)]
pub struct CircuitKeys {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
}

impl CircuitKeys {
    /// Run the circuit-specific Groth16 setup.
    pub fn setup<R: RngCore + CryptoRng>(rng: &mut R) -> ZkResult<Self> {
        let (proving_key, verifying_key) =
            Groth16::<Bn254>::circuit_specific_setup(AuthCircuit::blank(), rng)
                .map_err(|e| ZkError::SetupFailed(e.to_string()))?;
        info!(
            public_inputs = verifying_key.gamma_abc_g1.len() - 1,
            "Auth circuit setup complete"
        );
        Ok(Self {
            proving_key,
            verifying_key,
        })
    }

    /// Write both keys into `dir` using the default file names.
    pub fn write_to_dir(&self, dir: &Path) -> ZkResult<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)
            .map_err(|e| ZkError::KeySerialization(format!("{}: {}", dir.display(), e)))?;
        let pk_path = dir.join(PROVING_KEY_FILE);
        let vk_path = dir.join(VERIFYING_KEY_FILE);
        write_artifact(&pk_path, &encode_proving_key(&self.proving_key)?)?;
        write_artifact(&vk_path, &encode_verifying_key(&self.verifying_key)?)?;
        Ok((pk_path, vk_path))
    }
}

fn write_artifact(path: &Path, bytes: &[u8]) -> ZkResult<()> {
    fs::write(path, bytes)
        .map_err(|e| ZkError::KeySerialization(format!("{}: {}", path.display(), e)))
}

/// Serialize a proving key (compressed).
pub fn encode_proving_key(key: &ProvingKey<Bn254>) -> ZkResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(key.compressed_size());
    key.serialize_compressed(&mut bytes)
        .map_err(|e| ZkError::KeySerialization(e.to_string()))?;
    Ok(bytes)
}

/// Serialize a verifying key (compressed).
pub fn encode_verifying_key(key: &VerifyingKey<Bn254>) -> ZkResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(key.compressed_size());
    key.serialize_compressed(&mut bytes)
        .map_err(|e| ZkError::KeySerialization(e.to_string()))?;
    Ok(bytes)
}

/// Deserialize a verifying key, validating curve points.
pub fn decode_verifying_key(bytes: &[u8]) -> ZkResult<VerifyingKey<Bn254>> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::KeySerialization(e.to_string()))
}

/// Deserialize a proving key, validating curve points.
pub fn decode_proving_key(bytes: &[u8]) -> ZkResult<ProvingKey<Bn254>> {
    ProvingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::KeySerialization(e.to_string()))
}

/// Load a proving key artifact.
///
/// A missing file is reported loudly; there is no silent fallback.
pub fn load_proving_key(path: &Path) -> ZkResult<ProvingKey<Bn254>> {
    let bytes = fs::read(path).map_err(|e| {
        ZkError::ProvingKeyNotFound(format!(
            "CRITICAL: proving key missing at {}. Device cannot authenticate. Error: {}",
            path.display(),
            e
        ))
    })?;
    decode_proving_key(&bytes)
}

/// Load a verifying key artifact.
pub fn load_verifying_key(path: &Path) -> ZkResult<VerifyingKey<Bn254>> {
    let bytes = fs::read(path).map_err(|e| {
        ZkError::VerificationKeyNotFound(format!(
            "CRITICAL: verifying key missing at {}. Deployment unsafe. Error: {}",
            path.display(),
            e
        ))
    })?;
    decode_verifying_key(&bytes)
}
