//! License gate on challenge issuance.

use crate::test_utils::*;
use chrono::Duration;
use ed25519_dalek::SigningKey;
use edgeguard_auth::{AuthError, LicenseClaims, LicenseGate, LicenseService};
use edgeguard_core::{AuthConfig, Clock, ManualClock};
use std::sync::Arc;

fn issuer() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

fn licensed_gateway(max_devices: u32, valid_for: Duration) -> (TestGateway, Arc<LicenseService>) {
    let clock = Arc::new(ManualClock::starting_now());
    let license = Arc::new(LicenseService::new(
        issuer().verifying_key(),
        Duration::days(7),
        clock.clone(),
    ));
    let signed = LicenseClaims {
        license_id: "LIC-INTEGRATION".to_string(),
        max_devices,
        expires_at: clock.now() + valid_for,
    }
    .sign(&issuer())
    .unwrap();
    license.install(&signed).unwrap();

    let gateway = TestGateway::with_license(AuthConfig::default(), license.clone(), clock);
    (gateway, license)
}

fn authenticate(gateway: &TestGateway, device: &TestDevice, seed: u64) {
    let challenge = gateway.service.generate_challenge(&device.device_id).unwrap();
    let bundle = device.prove(challenge.nonce, seed);
    gateway
        .service
        .verify_proof(
            &device.device_id,
            &challenge.challenge_id,
            &bundle.proof,
            &bundle.public_witness,
        )
        .unwrap();
}

#[test]
fn test_device_quota_counts_live_sessions() {
    let (gateway, _license) = licensed_gateway(1, Duration::days(30));
    let first = TestDevice::new("SENSOR-01", 31);
    let second = TestDevice::new("SENSOR-02", 32);
    gateway.enroll(&first);
    gateway.enroll(&second);

    authenticate(&gateway, &first, 400);

    assert!(matches!(
        gateway.service.generate_challenge("SENSOR-02"),
        Err(AuthError::LicenseDenied(_))
    ));
    // A device that already holds a session may re-authenticate.
    assert!(gateway.service.generate_challenge("SENSOR-01").is_ok());

    // Once the first session lapses the slot frees up.
    gateway.advance(3601);
    authenticate(&gateway, &second, 401);
}

#[test]
fn test_expired_license_honours_grace_period() {
    let (gateway, license) = licensed_gateway(0, Duration::days(1));
    let device = TestDevice::new("SENSOR-01", 33);
    gateway.enroll(&device);

    authenticate(&gateway, &device, 402);

    gateway.advance(2 * 24 * 3600);
    let status = license.status();
    assert!(status.expired);
    assert!(status.in_grace_period);
    authenticate(&gateway, &device, 403);

    gateway.advance(7 * 24 * 3600);
    assert!(!license.status().in_grace_period);
    assert!(matches!(
        gateway.service.generate_challenge("SENSOR-01"),
        Err(AuthError::LicenseDenied(_))
    ));
}

#[test]
fn test_license_from_foreign_issuer_refused() {
    let clock = Arc::new(ManualClock::starting_now());
    let license = Arc::new(LicenseService::new(
        issuer().verifying_key(),
        Duration::days(7),
        clock.clone(),
    ));
    let forged = LicenseClaims {
        license_id: "LIC-FORGED".to_string(),
        max_devices: 0,
        expires_at: clock.now() + Duration::days(365),
    }
    .sign(&SigningKey::from_bytes(&[7u8; 32]))
    .unwrap();
    assert!(license.install(&forged).is_err());
    assert!(license.check().is_err());

    let gateway = TestGateway::with_license(AuthConfig::default(), license, clock);
    let device = TestDevice::new("SENSOR-01", 34);
    gateway.enroll(&device);
    assert!(matches!(
        gateway.service.generate_challenge("SENSOR-01"),
        Err(AuthError::LicenseDenied(_))
    ));
}

#[test]
fn test_license_file_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("license.json");
    let clock = Arc::new(ManualClock::starting_now());
    let signed = LicenseClaims {
        license_id: "LIC-FILE".to_string(),
        max_devices: 5,
        expires_at: clock.now() + Duration::days(90),
    }
    .sign(&issuer())
    .unwrap();
    std::fs::write(&path, serde_json::to_vec_pretty(&signed).unwrap()).unwrap();

    let license = LicenseService::new(issuer().verifying_key(), Duration::days(7), clock);
    license.load_from_file(&path).unwrap();
    assert_eq!(license.max_devices(), 5);
    assert_eq!(license.status().license_id.as_deref(), Some("LIC-FILE"));
}
