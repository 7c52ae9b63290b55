//! Zero-knowledge device authentication.
//!
//! A device proves knowledge of a secret `s` such that
//! `MiMC(s, device_id) == commitment` and `MiMC(s, challenge) == response`,
//! with `device_id`, `challenge`, `commitment` and `response` public. The
//! proof system is Groth16 over BN254.

pub mod circuit;
pub mod encoding;
pub mod error;
pub mod inputs;
pub mod keys;
pub mod mimc;
pub mod prover;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use circuit::{AuthCircuit, NUM_PUBLIC_INPUTS};
pub use encoding::{encode_device_id, FieldBytes, FIELD_BYTES, MAX_DEVICE_ID_LEN};
pub use error::{ZkError, ZkResult};
pub use inputs::{ProofBundle, ProofPayload, ProverInputs, PublicWitness};
pub use keys::{
    load_proving_key, load_verifying_key, CircuitKeys, PROVING_KEY_FILE, VERIFYING_KEY_FILE,
};
pub use mimc::{mimc_hash, mimc_hash_2, MIMC_ROUNDS};
pub use prover::{compute_commitment, compute_response, AuthProver};
pub use verifier::{
    build_verifier, decode_proof, AcceptAllVerifier, Groth16Verifier, ProofVerifier,
};
