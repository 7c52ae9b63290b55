//! Full device authentication flow: challenge, proof, session lifecycle.

use crate::test_utils::*;
use edgeguard_auth::{AuthError, DeviceStatus, VerifyRequest};
use edgeguard_core::AuthConfig;
use edgeguard_crypto::zk::ProofPayload;

#[test]
fn test_sensor_authenticates_and_uses_token() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-01", 1);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-01").unwrap();
    assert_eq!(challenge.device_id, "SENSOR-01");
    assert!(!challenge.used);

    let bundle = device.prove(challenge.nonce, 100);
    assert_eq!(bundle.proof.len(), 128);

    let session = gateway
        .service
        .verify_proof("SENSOR-01", &challenge.challenge_id, &bundle.proof, &bundle.public_witness)
        .unwrap();
    assert_eq!(session.device_id, "SENSOR-01");

    let claims = gateway.service.validate_token(&session.token).unwrap();
    assert_eq!(claims.device_id, "SENSOR-01");
    assert_eq!(claims.session_id, session.session_id);
    assert_eq!(gateway.service.retry_count("SENSOR-01").unwrap(), 0);
}

#[test]
fn test_wire_request_round_trip() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-02", 2);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-02").unwrap();
    let bundle = device.prove(challenge.nonce, 101);

    // Serialize the request the way a device would put it on the wire.
    let body = serde_json::json!({
        "device_id": "SENSOR-02",
        "challenge_id": challenge.challenge_id,
        "proof": ProofPayload::from(&bundle),
    });
    let request: VerifyRequest = serde_json::from_value(body).unwrap();

    let session = gateway.service.verify_request(&request).unwrap();
    assert!(gateway.service.validate_token(&session.token).is_ok());
}

#[test]
fn test_unknown_and_inactive_devices_get_no_challenge() {
    let gateway = TestGateway::default();
    let revoked = TestDevice::new("SENSOR-R", 3);
    gateway.enroll_with_status(&revoked, DeviceStatus::Revoked);

    assert!(matches!(
        gateway.service.generate_challenge("SENSOR-404"),
        Err(AuthError::DeviceNotFound(_))
    ));
    assert!(matches!(
        gateway.service.generate_challenge("SENSOR-R"),
        Err(AuthError::DeviceNotFound(_))
    ));
}

#[test]
fn test_device_disabled_between_challenge_and_proof() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-03", 4);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-03").unwrap();
    let bundle = device.prove(challenge.nonce, 102);
    gateway.enroll_with_status(&device, DeviceStatus::Inactive);

    let result = gateway.service.verify_proof(
        "SENSOR-03",
        &challenge.challenge_id,
        &bundle.proof,
        &bundle.public_witness,
    );
    assert!(matches!(result, Err(AuthError::DeviceNotFound(_))));
}

#[test]
fn test_expired_challenge_rejected() {
    let gateway = TestGateway::new(AuthConfig {
        challenge_ttl_secs: 30,
        ..AuthConfig::default()
    });
    let device = TestDevice::new("SENSOR-04", 5);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-04").unwrap();
    let bundle = device.prove(challenge.nonce, 103);
    gateway.advance(31);

    let result = gateway.service.verify_proof(
        "SENSOR-04",
        &challenge.challenge_id,
        &bundle.proof,
        &bundle.public_witness,
    );
    assert!(matches!(result, Err(AuthError::ChallengeExpired(_))));

    // Expired challenges are swept by housekeeping.
    let (challenges, _) = gateway.service.purge_expired().unwrap();
    assert_eq!(challenges, 1);
}

#[test]
fn test_revoked_session_stops_validating() {
    let gateway = TestGateway::default();
    let device = TestDevice::new("SENSOR-05", 6);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-05").unwrap();
    let bundle = device.prove(challenge.nonce, 104);
    let session = gateway
        .service
        .verify_proof("SENSOR-05", &challenge.challenge_id, &bundle.proof, &bundle.public_witness)
        .unwrap();

    gateway.service.revoke_session(&session.session_id).unwrap();
    assert!(matches!(
        gateway.service.validate_token(&session.token),
        Err(AuthError::SessionNotFound(_))
    ));
    assert!(matches!(
        gateway.service.revoke_session(&session.session_id),
        Err(AuthError::SessionNotFound(_))
    ));
}

#[test]
fn test_refresh_extends_session() {
    let gateway = TestGateway::new(AuthConfig {
        session_ttl_secs: 600,
        ..AuthConfig::default()
    });
    let device = TestDevice::new("SENSOR-06", 7);
    gateway.enroll(&device);

    let challenge = gateway.service.generate_challenge("SENSOR-06").unwrap();
    let bundle = device.prove(challenge.nonce, 105);
    let session = gateway
        .service
        .verify_proof("SENSOR-06", &challenge.challenge_id, &bundle.proof, &bundle.public_witness)
        .unwrap();

    gateway.advance(500);
    let refreshed = gateway.service.refresh_session(&session.token).unwrap();
    assert_eq!(refreshed.session_id, session.session_id);
    assert!(refreshed.expires_at > session.expires_at);

    // Past the first expiry only the replacement token still works.
    gateway.advance(200);
    assert!(gateway.service.validate_token(&refreshed.token).is_ok());
    assert!(gateway.service.validate_token(&session.token).is_err());

    gateway.advance(601);
    assert!(matches!(
        gateway.service.refresh_session(&refreshed.token),
        Err(AuthError::SessionExpired(_))
    ));
}

#[test]
fn test_token_from_other_gateway_rejected() {
    let first = TestGateway::default();
    let device = TestDevice::new("SENSOR-07", 8);
    first.enroll(&device);

    let challenge = first.service.generate_challenge("SENSOR-07").unwrap();
    let bundle = device.prove(challenge.nonce, 106);
    let session = first
        .service
        .verify_proof("SENSOR-07", &challenge.challenge_id, &bundle.proof, &bundle.public_witness)
        .unwrap();

    // Same signing secret, but the session only exists on the first gateway.
    let second = TestGateway::default();
    assert!(matches!(
        second.service.validate_token(&session.token),
        Err(AuthError::SessionNotFound(_))
    ));
}
