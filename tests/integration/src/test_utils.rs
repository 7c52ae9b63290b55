//! Shared fixtures for end-to-end authentication tests

use chrono::Duration;
use edgeguard_auth::{
    AuthService, DeviceCredential, DeviceStatus, DeviceStore, InMemoryDeviceStore, LicenseGate,
    TokenSecret,
};
use edgeguard_core::{AuthConfig, ManualClock};
use edgeguard_crypto::zk::{
    compute_commitment, AuthProver, CircuitKeys, FieldBytes, Groth16Verifier, ProofBundle,
    ProverInputs,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Once, OnceLock};

/// Token secret shared by every test gateway.
pub const TEST_TOKEN_SECRET: &str = "edgeguard-integration-token-secret-0001";

/// Route gateway logs through the test harness writer. Safe to call repeatedly.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Circuit keys generated once per test binary; setup is the slow part.
pub fn circuit_keys() -> &'static CircuitKeys {
    static KEYS: OnceLock<CircuitKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        CircuitKeys::setup(&mut StdRng::seed_from_u64(0x45_47_54))
            .expect("circuit setup failed")
    })
}

/// A sensor device holding its enrollment secret.
#[derive(Clone)]
pub struct TestDevice {
    pub device_id: String,
    pub secret: FieldBytes,
    pub commitment: FieldBytes,
}

impl TestDevice {
    /// Derive a device with a deterministic secret.
    pub fn new(device_id: &str, seed: u64) -> Self {
        let secret = FieldBytes::random(&mut StdRng::seed_from_u64(seed));
        let commitment = compute_commitment(&secret, device_id).expect("commitment");
        Self {
            device_id: device_id.to_string(),
            secret,
            commitment,
        }
    }

    pub fn credential(&self, status: DeviceStatus) -> DeviceCredential {
        let mut credential =
            DeviceCredential::new(&self.device_id, "00", self.commitment).expect("credential");
        credential.status = status;
        credential
    }

    /// Prove knowledge of the secret against `nonce`.
    pub fn prove(&self, nonce: FieldBytes, seed: u64) -> ProofBundle {
        self.prove_with_secret(self.secret, nonce, seed)
    }

    /// Prove with an arbitrary secret; the commitment is recomputed so the
    /// prover accepts it.
    pub fn prove_with_secret(&self, secret: FieldBytes, nonce: FieldBytes, seed: u64) -> ProofBundle {
        let prover = AuthProver::with_proving_key(circuit_keys().proving_key.clone());
        let inputs = ProverInputs {
            secret,
            device_id: self.device_id.clone(),
            challenge: nonce,
            commitment: compute_commitment(&secret, &self.device_id).expect("commitment"),
        };
        prover
            .prove(&inputs, &mut StdRng::seed_from_u64(seed))
            .expect("proof generation failed")
    }
}

/// Gateway-side harness around an [`AuthService`] with a manual clock.
pub struct TestGateway {
    pub service: Arc<AuthService>,
    pub devices: Arc<InMemoryDeviceStore>,
    pub clock: Arc<ManualClock>,
}

impl TestGateway {
    pub fn new(settings: AuthConfig) -> Self {
        Self::build(settings, None, Arc::new(ManualClock::starting_now()))
    }

    /// Build with a license gate sharing `clock`.
    pub fn with_license(
        settings: AuthConfig,
        license: Arc<dyn LicenseGate>,
        clock: Arc<ManualClock>,
    ) -> Self {
        Self::build(settings, Some(license), clock)
    }

    fn build(
        settings: AuthConfig,
        license: Option<Arc<dyn LicenseGate>>,
        clock: Arc<ManualClock>,
    ) -> Self {
        init_test_logging();

        let devices = Arc::new(InMemoryDeviceStore::new());
        let verifier = Groth16Verifier::with_verifying_key(&circuit_keys().verifying_key)
            .expect("verifying key");

        let mut builder = AuthService::builder(Arc::new(verifier))
            .device_store(devices.clone())
            .clock(clock.clone())
            .settings(&settings)
            .token_secret(TokenSecret::configured(TEST_TOKEN_SECRET));
        if let Some(license) = license {
            builder = builder.license_gate(license);
        }

        Self {
            service: Arc::new(builder.build().expect("auth service")),
            devices,
            clock,
        }
    }

    pub fn enroll(&self, device: &TestDevice) {
        self.enroll_with_status(device, DeviceStatus::Active);
    }

    pub fn enroll_with_status(&self, device: &TestDevice, status: DeviceStatus) {
        self.devices
            .upsert_device(&device.credential(status))
            .expect("enroll device");
        tracing::debug!(device_id = %device.device_id, %status, "Enrolled test device");
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(Duration::seconds(seconds));
    }
}

impl Default for TestGateway {
    fn default() -> Self {
        Self::new(AuthConfig::default())
    }
}
