//! Authentication protocol orchestration.
//!
//! [`AuthService`] is built once at startup and shared by reference. Every
//! operation is synchronous; proof verification is CPU-bound and should be
//! moved off async executors by the caller.

use chrono::Duration;
use edgeguard_core::{AuthConfig, Clock, SystemClock};
use edgeguard_crypto::zk::{encode_device_id, FieldBytes, ProofVerifier, PublicWitness};
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::challenge::{Challenge, ChallengeStore, InMemoryChallengeStore};
use crate::device::{DeviceCredential, DeviceStore, InMemoryDeviceStore};
use crate::error::{AuthError, AuthResult};
use crate::license::{DisabledLicense, LicenseGate};
use crate::retry::{InMemoryRetryGuard, RetryGuard};
use crate::session::{InMemorySessionStore, Session, SessionManager, SessionStore};
use crate::token::{TokenClaims, TokenSecret};
use crate::wire::VerifyRequest;

/// The device authentication core.
pub struct AuthService {
    devices: Arc<dyn DeviceStore>,
    challenges: Arc<dyn ChallengeStore>,
    retry: Arc<dyn RetryGuard>,
    license: Arc<dyn LicenseGate>,
    verifier: Arc<dyn ProofVerifier>,
    sessions: SessionManager,
    clock: Arc<dyn Clock>,
    challenge_ttl: Duration,
    max_retry: u32,
}

impl AuthService {
    pub fn builder(verifier: Arc<dyn ProofVerifier>) -> AuthServiceBuilder {
        AuthServiceBuilder::new(verifier)
    }

    /// Issue a single-use challenge to `device_id`.
    pub fn generate_challenge(&self, device_id: &str) -> AuthResult<Challenge> {
        self.active_device(device_id)?;

        let failures = self.retry.count(device_id)?;
        if failures >= self.max_retry {
            warn!(device_id = %device_id, failures, "Challenge refused: device locked out");
            return Err(AuthError::LockedOut {
                device_id: device_id.to_string(),
                failures,
            });
        }

        if self.license.is_enabled() {
            self.license.check()?;
            self.check_device_quota(device_id)?;
        }

        let now = self.clock.now();
        let challenge = Challenge {
            challenge_id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            nonce: FieldBytes::random(&mut OsRng),
            created_at: now,
            expires_at: now + self.challenge_ttl,
            used: false,
        };
        self.challenges.insert_challenge(&challenge)?;

        info!(
            device_id = %device_id,
            challenge_id = %challenge.challenge_id,
            expires_at = %challenge.expires_at.to_rfc3339(),
            "Challenge issued"
        );
        Ok(challenge)
    }

    /// Verify a proof for a previously issued challenge and open a session.
    ///
    /// Every rejection increments the retry counter of an enrolled device.
    /// The challenge is consumed only when the proof verifies.
    pub fn verify_proof(
        &self,
        device_id: &str,
        challenge_id: &str,
        proof: &[u8],
        witness: &PublicWitness,
    ) -> AuthResult<Session> {
        match self.verify_inner(device_id, challenge_id, proof, witness) {
            Ok(session) => Ok(session),
            Err(err) => Err(self.record_outcome(device_id, challenge_id, err)),
        }
    }

    /// Decode a wire request and run [`verify_proof`](Self::verify_proof).
    pub fn verify_request(&self, request: &VerifyRequest) -> AuthResult<Session> {
        let proof = match request.proof.proof_bytes() {
            Ok(proof) => proof,
            Err(e) => {
                return Err(self.record_outcome(
                    &request.device_id,
                    &request.challenge_id,
                    AuthError::from(e),
                ))
            }
        };
        self.verify_proof(
            &request.device_id,
            &request.challenge_id,
            &proof,
            &request.proof.public_witness,
        )
    }

    pub fn validate_token(&self, token: &str) -> AuthResult<TokenClaims> {
        self.sessions.validate_token(token)
    }

    pub fn refresh_session(&self, token: &str) -> AuthResult<Session> {
        self.sessions.refresh_session(token)
    }

    pub fn revoke_session(&self, session_id: &str) -> AuthResult<()> {
        self.sessions.revoke_session(session_id)
    }

    /// Operator action: clear a device's lockout.
    pub fn reset_retry_counter(&self, device_id: &str) -> AuthResult<()> {
        self.retry.reset(device_id)?;
        info!(device_id = %device_id, "Retry counter reset by operator");
        Ok(())
    }

    /// Housekeeping: drop expired challenges and sessions.
    pub fn purge_expired(&self) -> AuthResult<(usize, usize)> {
        let now = self.clock.now();
        let challenges = self.challenges.purge_expired_challenges(now)?;
        let sessions = self.sessions.store().purge_expired_sessions(now)?;
        debug!(challenges, sessions, "Purged expired records");
        Ok((challenges, sessions))
    }

    pub fn retry_count(&self, device_id: &str) -> AuthResult<u32> {
        self.retry.count(device_id)
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn verifier_backend(&self) -> &'static str {
        self.verifier.backend_name()
    }

    pub fn license(&self) -> &Arc<dyn LicenseGate> {
        &self.license
    }

    fn verify_inner(
        &self,
        device_id: &str,
        challenge_id: &str,
        proof: &[u8],
        witness: &PublicWitness,
    ) -> AuthResult<Session> {
        let now = self.clock.now();

        let challenge = self
            .challenges
            .get_challenge(challenge_id)?
            .ok_or_else(|| AuthError::ChallengeNotFound(challenge_id.to_string()))?;
        if challenge.is_expired(now) {
            return Err(AuthError::ChallengeExpired(challenge_id.to_string()));
        }
        if challenge.used {
            return Err(AuthError::ChallengeAlreadyUsed(challenge_id.to_string()));
        }

        let device = self.active_device(device_id)?;

        // Cheap consistency checks before any pairing work.
        if challenge.device_id != device.device_id {
            return Err(AuthError::WitnessMismatch(
                "challenge was issued to another device".to_string(),
            ));
        }
        if witness.device_id != encode_device_id(&device.device_id)? {
            return Err(AuthError::WitnessMismatch("device_id".to_string()));
        }
        if witness.challenge != challenge.nonce {
            return Err(AuthError::WitnessMismatch("challenge".to_string()));
        }
        if witness.commitment != device.commitment {
            return Err(AuthError::WitnessMismatch("commitment".to_string()));
        }

        if !self.verifier.verify(proof, witness)? {
            return Err(AuthError::InvalidProof);
        }

        if !self.challenges.mark_used(challenge_id)? {
            return Err(AuthError::ChallengeAlreadyUsed(challenge_id.to_string()));
        }
        self.retry.reset(device_id)?;

        let session = self.sessions.create_session(&device.device_id)?;
        info!(
            device_id = %device_id,
            challenge_id = %challenge_id,
            session_id = %session.session_id,
            "Device authenticated"
        );
        Ok(session)
    }

    /// Failures are only counted against enrolled devices, so request data
    /// never creates retry state on its own.
    fn record_outcome(&self, device_id: &str, challenge_id: &str, err: AuthError) -> AuthError {
        if !self.is_enrolled(device_id) {
            warn!(
                device_id_len = device_id.len(),
                challenge_id_len = challenge_id.len(),
                error = %err,
                "Verification rejected for unenrolled device"
            );
            return err;
        }
        if !err.counts_as_failure() {
            warn!(device_id = %device_id, challenge_id = %challenge_id, error = %err, "Verification aborted");
            return err;
        }
        match self.retry.record_failure(device_id) {
            Ok(failures) => warn!(
                device_id = %device_id,
                challenge_id = %challenge_id,
                failures,
                error = %err,
                "Verification failed"
            ),
            Err(counter_err) => warn!(
                device_id = %device_id,
                error = %counter_err,
                "Failed to record verification failure"
            ),
        }
        err
    }

    fn is_enrolled(&self, device_id: &str) -> bool {
        encode_device_id(device_id).is_ok() && matches!(self.devices.get_device(device_id), Ok(Some(_)))
    }

    fn active_device(&self, device_id: &str) -> AuthResult<DeviceCredential> {
        match self.devices.get_device(device_id)? {
            Some(device) if device.is_active() => Ok(device),
            Some(device) => {
                debug!(device_id = %device_id, status = %device.status, "Device not active");
                Err(AuthError::DeviceNotFound(device_id.to_string()))
            }
            None => Err(AuthError::DeviceNotFound(device_id.to_string())),
        }
    }

    fn check_device_quota(&self, device_id: &str) -> AuthResult<()> {
        let max = self.license.max_devices();
        if max == 0 {
            return Ok(());
        }
        let live = self.sessions.live_device_ids()?;
        if !live.contains(device_id) && live.len() >= max as usize {
            warn!(device_id = %device_id, max_devices = max, "Challenge refused: device quota reached");
            return Err(AuthError::LicenseDenied(format!(
                "license allows {} concurrently authenticated devices",
                max
            )));
        }
        Ok(())
    }
}

/// Assembles an [`AuthService`]. Unset collaborators default to in-memory
/// implementations, licensing disabled and the system clock.
pub struct AuthServiceBuilder {
    verifier: Arc<dyn ProofVerifier>,
    devices: Option<Arc<dyn DeviceStore>>,
    challenges: Option<Arc<dyn ChallengeStore>>,
    sessions: Option<Arc<dyn SessionStore>>,
    retry: Option<Arc<dyn RetryGuard>>,
    license: Option<Arc<dyn LicenseGate>>,
    clock: Option<Arc<dyn Clock>>,
    settings: AuthConfig,
    secret: Option<TokenSecret>,
}

impl AuthServiceBuilder {
    pub fn new(verifier: Arc<dyn ProofVerifier>) -> Self {
        Self {
            verifier,
            devices: None,
            challenges: None,
            sessions: None,
            retry: None,
            license: None,
            clock: None,
            settings: AuthConfig::default(),
            secret: None,
        }
    }

    pub fn device_store(mut self, store: Arc<dyn DeviceStore>) -> Self {
        self.devices = Some(store);
        self
    }

    pub fn challenge_store(mut self, store: Arc<dyn ChallengeStore>) -> Self {
        self.challenges = Some(store);
        self
    }

    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(store);
        self
    }

    pub fn retry_guard(mut self, guard: Arc<dyn RetryGuard>) -> Self {
        self.retry = Some(guard);
        self
    }

    pub fn license_gate(mut self, gate: Arc<dyn LicenseGate>) -> Self {
        self.license = Some(gate);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// TTLs, retry limit and token secret policy.
    pub fn settings(mut self, settings: &AuthConfig) -> Self {
        self.settings = settings.clone();
        self
    }

    /// Override the token secret from settings.
    pub fn token_secret(mut self, secret: TokenSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn build(self) -> AuthResult<AuthService> {
        let settings = self.settings;
        let challenge_ttl = duration_secs(settings.challenge_ttl_secs, "challenge_ttl_secs")?;
        let session_ttl = duration_secs(settings.session_ttl_secs, "session_ttl_secs")?;
        if settings.max_retry == 0 {
            return Err(AuthError::Config("max_retry must be greater than 0".to_string()));
        }

        let secret = match (self.secret, settings.token_secret.as_deref()) {
            (Some(secret), _) => secret,
            (None, Some(configured)) => TokenSecret::configured(configured),
            (None, None) if settings.allow_ephemeral_secret => {
                warn!(
                    "No token secret configured; using an ephemeral secret. \
                     All sessions will be invalidated on restart"
                );
                TokenSecret::ephemeral()
            }
            (None, None) => {
                return Err(AuthError::Config(
                    "no token secret configured and ephemeral secrets are not allowed".to_string(),
                ))
            }
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let session_store = self
            .sessions
            .unwrap_or_else(|| Arc::new(InMemorySessionStore::new()));

        Ok(AuthService {
            devices: self
                .devices
                .unwrap_or_else(|| Arc::new(InMemoryDeviceStore::new())),
            challenges: self
                .challenges
                .unwrap_or_else(|| Arc::new(InMemoryChallengeStore::new())),
            retry: self.retry.unwrap_or_else(|| Arc::new(InMemoryRetryGuard::new())),
            license: self.license.unwrap_or_else(|| Arc::new(DisabledLicense)),
            verifier: self.verifier,
            sessions: SessionManager::new(session_store, &secret, session_ttl, clock.clone()),
            clock,
            challenge_ttl,
            max_retry: settings.max_retry,
        })
    }
}

fn duration_secs(secs: u64, name: &str) -> AuthResult<Duration> {
    match i64::try_from(secs) {
        Ok(secs) if secs > 0 => Ok(Duration::seconds(secs)),
        _ => Err(AuthError::Config(format!("{} must be a positive number of seconds", name))),
    }
}
