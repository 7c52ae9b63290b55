//! Replay and substitution attacks against the challenge protocol.

use crate::test_utils::*;
use edgeguard_auth::AuthError;
use std::sync::Arc;
use std::thread;

#[test]
fn test_replayed_proof_rejected() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-01", 11);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let bundle = device.prove(challenge.nonce, 200);
    gateway
        .service
        .verify_proof("SENSOR-01", &challenge.challenge_id, &bundle.proof, &bundle.public_witness)
        .unwrap();

    let replay = gateway.service.verify_proof(
        "SENSOR-01",
        &challenge.challenge_id,
        &bundle.proof,
        &bundle.public_witness,
    );
    assert!(matches!(replay, Err(AuthError::ChallengeAlreadyUsed(_))));
    assert_eq!(gateway.service.retry_count("SENSOR-01").unwrap(), 1);
}

#[test]
fn test_old_proof_against_fresh_challenge_rejected() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-01", 12);
    gateway.enroll(&device);

    let first = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let stale = device.prove(first.nonce, 201);
    let second = gateway.service.generate_challenge("SENSOR-01").unwrap();
    assert_ne!(first.nonce, second.nonce);

    let result = gateway.service.verify_proof(
        "SENSOR-01",
        &second.challenge_id,
        &stale.proof,
        &stale.public_witness,
    );
    assert!(matches!(result, Err(AuthError::WitnessMismatch(_))));
}

#[test]
fn test_proof_bytes_bound_to_their_challenge() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-01", 13);
    gateway.enroll(&device);

    let a = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let b = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let proof_a = device.prove(a.nonce, 202);
    let proof_b = device.prove(b.nonce, 203);

    // Correct witness for B, proof bytes from A.
    let result = gateway.service.verify_proof(
        "SENSOR-01",
        &b.challenge_id,
        &proof_a.proof,
        &proof_b.public_witness,
    );
    assert!(matches!(result, Err(AuthError::InvalidProof)));

    // B is still unconsumed after the failed attempt.
    gateway
        .service
        .verify_proof("SENSOR-01", &b.challenge_id, &proof_b.proof, &proof_b.public_witness)
        .unwrap();
}

#[test]
fn test_challenge_not_transferable_between_devices() {
    let gateway = TestGateway::default();
    let victim = TestDevice::new("SENSOR-01", 14);
    let attacker = TestDevice::new("SENSOR-02", 15);
    gateway.enroll(&victim);
    gateway.enroll(&attacker);

    let challenge = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let bundle = attacker.prove(challenge.nonce, 204);

    let result = gateway.service.verify_proof(
        "SENSOR-02",
        &challenge.challenge_id,
        &bundle.proof,
        &bundle.public_witness,
    );
    assert!(matches!(result, Err(AuthError::WitnessMismatch(_))));
}

#[test]
fn test_wrong_secret_with_enrolled_commitment_rejected() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-01", 16);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let impostor = TestDevice::new("SENSOR-01", 17);
    let forged = device.prove_with_secret(impostor.secret, challenge.nonce, 205);
    let mut witness = forged.public_witness;
    witness.commitment = device.commitment;

    let result =
        gateway
            .service
            .verify_proof("SENSOR-01", &challenge.challenge_id, &forged.proof, &witness);
    assert!(matches!(result, Err(AuthError::InvalidProof)));
}

#[test]
fn test_concurrent_submissions_yield_one_session() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-01", 18);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let bundle = Arc::new(device.prove(challenge.nonce, 206));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&gateway.service);
            let bundle = Arc::clone(&bundle);
            let challenge_id = challenge.challenge_id.clone();
            thread::spawn(move || {
                service.verify_proof(
                    "SENSOR-01",
                    &challenge_id,
                    &bundle.proof,
                    &bundle.public_witness,
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AuthError::ChallengeAlreadyUsed(_))));
    assert_eq!(
        gateway.service.sessions().live_device_ids().unwrap().len(),
        1
    );
}
