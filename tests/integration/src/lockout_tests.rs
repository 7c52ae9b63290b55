//! Retry counting and lockout.

use crate::test_utils::*;
use edgeguard_auth::AuthError;
use edgeguard_core::AuthConfig;
use edgeguard_crypto::zk::FieldBytes;

fn gateway_with_limit(max_retry: u32) -> TestGateway {
    TestGateway::new(AuthConfig {
        max_retry,
        ..AuthConfig::default()
    })
}

#[test]
fn test_lockout_reset_and_recovery() {
    let gateway = gateway_with_limit(3);
    let device = TestDevice::new("SENSOR-01", 21);
    gateway.enroll(&device);

    for attempt in 1..=3u32 {
        let challenge = gateway.service.generate_challenge("SENSOR-01").unwrap();
        let result = gateway.service.verify_proof(
            "SENSOR-01",
            &challenge.challenge_id,
            &[0u8; 128],
            &device.prove(challenge.nonce, 300 + attempt as u64).public_witness,
        );
        assert!(result.is_err());
        assert_eq!(gateway.service.retry_count("SENSOR-01").unwrap(), attempt);
    }

    assert!(matches!(
        gateway.service.generate_challenge("SENSOR-01"),
        Err(AuthError::LockedOut { failures: 3, .. })
    ));

    gateway.service.reset_retry_counter("SENSOR-01").unwrap();
    let challenge = gateway.service.generate_challenge("SENSOR-01").unwrap();
    let bundle = device.prove(challenge.nonce, 310);
    gateway
        .service
        .verify_proof("SENSOR-01", &challenge.challenge_id, &bundle.proof, &bundle.public_witness)
        .unwrap();
    assert_eq!(gateway.service.retry_count("SENSOR-01").unwrap(), 0);
}

#[test]
fn test_success_clears_partial_failures() {
    let gateway = gateway_with_limit(3);
    let device = TestDevice::new("SENSOR-02", 22);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-02").unwrap();
    let bundle = device.prove(challenge.nonce, 320);
    let mut witness = bundle.public_witness;
    witness.response = FieldBytes::from_bytes_unchecked([0u8; 32]);
    assert!(matches!(
        gateway
            .service
            .verify_proof("SENSOR-02", &challenge.challenge_id, &bundle.proof, &witness),
        Err(AuthError::InvalidProof)
    ));
    assert_eq!(gateway.service.retry_count("SENSOR-02").unwrap(), 1);

    gateway
        .service
        .verify_proof("SENSOR-02", &challenge.challenge_id, &bundle.proof, &bundle.public_witness)
        .unwrap();
    assert_eq!(gateway.service.retry_count("SENSOR-02").unwrap(), 0);
}

#[test]
fn test_lockout_is_per_device() {
    let gateway = gateway_with_limit(1);
    let noisy = TestDevice::new("SENSOR-03", 23);
    let quiet = TestDevice::new("SENSOR-04", 24);
    gateway.enroll(&noisy);
    gateway.enroll(&quiet);

    let challenge = gateway.service.generate_challenge("SENSOR-03").unwrap();
    let witness = noisy.prove(challenge.nonce, 330).public_witness;
    let result = gateway
        .service
        .verify_proof("SENSOR-03", &challenge.challenge_id, &[], &witness);
    assert!(matches!(result, Err(AuthError::MalformedProof(_))));

    assert!(matches!(
        gateway.service.generate_challenge("SENSOR-03"),
        Err(AuthError::LockedOut { .. })
    ));
    assert!(gateway.service.generate_challenge("SENSOR-04").is_ok());
}
