//! MiMC hash over the BN254 scalar field.
//!
//! Parameters: exponent 5, [`MIMC_ROUNDS`] rounds, Miyaguchi-Preneel
//! absorption. Each input block `m` updates the state as
//! `h = E_h(m) + h + m`, starting from `h = 0`, where `E_k` is the keyed
//! MiMC permutation. Round constants come from a BLAKE3 XOF under a fixed
//! derive-key context, so every party derives the same table.
//!
//! The same construction is exposed twice: natively over [`Fr`] for the
//! prover and enrollment tooling, and as an R1CS gadget for the circuit.
//! Both must stay bit-for-bit identical.

use ark_bn254::Fr;
use ark_ff::{Field, PrimeField, Zero};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;
use std::sync::OnceLock;

use super::encoding::FieldBytes;
use super::error::ZkResult;

/// Number of MiMC rounds.
pub const MIMC_ROUNDS: usize = 110;

/// BLAKE3 derive-key context for the round constant stream.
const ROUND_CONSTANT_CONTEXT: &str = "edgeguard mimc-bn254 round constants v1";

static ROUND_CONSTANTS: OnceLock<Vec<Fr>> = OnceLock::new();

/// Round constant table, derived on first use.
pub fn round_constants() -> &'static [Fr] {
    ROUND_CONSTANTS.get_or_init(|| {
        let mut hasher = blake3::Hasher::new_derive_key(ROUND_CONSTANT_CONTEXT);
        hasher.update(&(MIMC_ROUNDS as u64).to_le_bytes());
        let mut stream = hasher.finalize_xof();
        (0..MIMC_ROUNDS)
            .map(|_| {
                // 64 bytes per constant keeps the reduction bias negligible.
                let mut wide = [0u8; 64];
                stream.fill(&mut wide);
                Fr::from_le_bytes_mod_order(&wide)
            })
            .collect()
    })
}

/// Keyed MiMC permutation `E_k(x)`.
pub fn mimc_encrypt(key: Fr, message: Fr) -> Fr {
    let mut x = message;
    for constant in round_constants() {
        let t = x + key + constant;
        let t2 = t.square();
        x = t2.square() * t;
    }
    x + key
}

/// MiMC hash of a sequence of field elements.
pub fn mimc_hash(inputs: &[Fr]) -> Fr {
    inputs.iter().fold(Fr::zero(), |state, block| {
        mimc_encrypt(state, *block) + state + block
    })
}

/// `Hash(a, b)` in the byte encoding used on the wire.
pub fn mimc_hash_2(a: &FieldBytes, b: &FieldBytes) -> ZkResult<FieldBytes> {
    let digest = mimc_hash(&[a.to_field()?, b.to_field()?]);
    Ok(FieldBytes::from_field(&digest))
}

/// In-circuit keyed permutation matching [`mimc_encrypt`].
pub fn mimc_encrypt_gadget(key: &FpVar<Fr>, message: &FpVar<Fr>) -> Result<FpVar<Fr>, SynthesisError> {
    let mut x = message.clone();
    for constant in round_constants() {
        let t = (&x + key) + *constant;
        let t2 = t.square()?;
        let t4 = t2.square()?;
        x = &t4 * &t;
    }
    Ok(&x + key)
}

/// In-circuit hash matching [`mimc_hash`].
pub fn mimc_hash_gadget(inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError> {
    let mut state = FpVar::<Fr>::zero();
    for block in inputs {
        let permuted = mimc_encrypt_gadget(&state, block)?;
        state = &(&permuted + &state) + block;
    }
    Ok(state)
}
