//! Cryptographic primitives for EdgeGuard device authentication.
//!
//! This crate holds everything that touches a proof:
//!
//! - **Encoding**: canonical 32-byte big-endian BN254 scalar field encoding
//! - **Hashing**: MiMC over BN254, natively and as an R1CS gadget
//! - **Circuit**: the auth relation binding a device secret to its
//!   enrollment commitment and a gateway challenge
//! - **Proving / Verification**: Groth16 over BN254 via arkworks
//!
//! # Security Principles
//!
//! - Device secrets never leave the prover and are zeroized on drop
//! - Non-canonical field encodings are rejected, never reduced
//! - Proof points are subgroup-checked on deserialization
//! - Missing key artifacts fail loudly; there is no silent fallback

pub mod zk;

pub use zk::{
    build_verifier, compute_commitment, compute_response, encode_device_id, AuthProver,
    CircuitKeys, FieldBytes, Groth16Verifier, ProofBundle, ProofPayload, ProofVerifier,
    ProverInputs, PublicWitness, ZkError, ZkResult,
};
