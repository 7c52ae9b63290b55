//! The device authentication relation.
//!
//! Statement (public, in this order):
//! - `device_id`:  field encoding of the device id
//! - `challenge`:  nonce issued by the gateway
//! - `commitment`: enrollment commitment
//! - `response`:   challenge response
//!
//! Witness (private):
//! - `secret`: the device's long-term secret
//!
//! Constraints:
//! 1) `commitment == MiMC(secret, device_id)`
//! 2) `response   == MiMC(secret, challenge)`

use ark_bn254::Fr;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::mimc::mimc_hash_gadget;

/// Number of public inputs exposed by [`AuthCircuit`].
pub const NUM_PUBLIC_INPUTS: usize = 4;

/// Auth circuit. All fields are `None` during key generation.
#[derive(Clone, Default)]
pub struct AuthCircuit {
    /// PRIVATE: device secret
    pub secret: Option<Fr>,
    /// PUBLIC: encoded device id
    pub device_id: Option<Fr>,
    /// PUBLIC: challenge nonce
    pub challenge: Option<Fr>,
    /// PUBLIC: enrollment commitment
    pub commitment: Option<Fr>,
    /// PUBLIC: challenge response
    pub response: Option<Fr>,
}

impl AuthCircuit {
    /// Circuit shape used for the one-time setup.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Fully assigned circuit for proving.
    pub fn assigned(secret: Fr, device_id: Fr, challenge: Fr, commitment: Fr, response: Fr) -> Self {
        Self {
            secret: Some(secret),
            device_id: Some(device_id),
            challenge: Some(challenge),
            commitment: Some(commitment),
            response: Some(response),
        }
    }
}

fn value_or_missing(value: Option<Fr>) -> impl FnOnce() -> Result<Fr, SynthesisError> {
    move || value.ok_or(SynthesisError::AssignmentMissing)
}

impl ConstraintSynthesizer<Fr> for AuthCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        // Public input order is part of the verifying key contract.
        let device_id = FpVar::new_input(cs.clone(), value_or_missing(self.device_id))?;
        let challenge = FpVar::new_input(cs.clone(), value_or_missing(self.challenge))?;
        let commitment = FpVar::new_input(cs.clone(), value_or_missing(self.commitment))?;
        let response = FpVar::new_input(cs.clone(), value_or_missing(self.response))?;

        let secret = FpVar::new_witness(cs, value_or_missing(self.secret))?;

        let computed_commitment = mimc_hash_gadget(&[secret.clone(), device_id])?;
        computed_commitment.enforce_equal(&commitment)?;

        let computed_response = mimc_hash_gadget(&[secret, challenge])?;
        computed_response.enforce_equal(&response)?;

        Ok(())
    }
}
