//! End-to-end tests for the EdgeGuard authentication protocol
//!
//! These drive the full device/gateway exchange with real Groth16 proofs:
//! enrollment, challenge issuance, proof verification, session lifecycle,
//! replay and lockout handling, and the license gate.

pub mod test_utils;

#[cfg(test)]
mod auth_flow_tests;

#[cfg(test)]
mod replay_attack_tests;

#[cfg(test)]
mod lockout_tests;

#[cfg(test)]
mod license_gate_tests;
