//! License gate consulted once per challenge issuance.
//!
//! A license is a small JSON document signed with the issuer's Ed25519 key.
//! When the gate is enabled and [`LicenseGate::check`] fails, no device gets
//! a challenge.

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use edgeguard_core::{Clock, LicenseConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

use crate::error::{AuthError, AuthResult};

/// Domain separator prepended to the signed license bytes.
const LICENSE_CONTEXT: &[u8] = b"edgeguard-license-v1:";

/// Entitlement contract consumed by the challenge issuer.
pub trait LicenseGate: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// `Err(LicenseDenied)` when issuance must be refused.
    fn check(&self) -> AuthResult<()>;

    /// Maximum number of concurrently authenticated devices; 0 is unlimited.
    fn max_devices(&self) -> u32;
}

/// Gate used when licensing is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLicense;

impl LicenseGate for DisabledLicense {
    fn is_enabled(&self) -> bool {
        false
    }

    fn check(&self) -> AuthResult<()> {
        Ok(())
    }

    fn max_devices(&self) -> u32 {
        0
    }
}

/// Signed portion of a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseClaims {
    pub license_id: String,
    pub max_devices: u32,
    pub expires_at: DateTime<Utc>,
}

impl LicenseClaims {
    fn signing_bytes(&self) -> AuthResult<Vec<u8>> {
        let mut message = LICENSE_CONTEXT.to_vec();
        message.extend_from_slice(&serde_json::to_vec(self)?);
        Ok(message)
    }

    /// Issue a license. Used by vendor tooling and tests.
    pub fn sign(self, issuer: &SigningKey) -> AuthResult<SignedLicense> {
        let signature = issuer.sign(&self.signing_bytes()?);
        Ok(SignedLicense {
            license: self,
            signature: hex::encode(signature.to_bytes()),
        })
    }
}

/// License file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLicense {
    #[serde(flatten)]
    pub license: LicenseClaims,
    /// Hex-encoded Ed25519 signature
    pub signature: String,
}

impl SignedLicense {
    /// Check the signature against `issuer` and return the claims.
    pub fn verify(&self, issuer: &VerifyingKey) -> AuthResult<&LicenseClaims> {
        let raw = hex::decode(&self.signature)
            .map_err(|e| AuthError::LicenseDenied(format!("signature is not hex: {}", e)))?;
        let bytes: [u8; 64] = raw
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::LicenseDenied("signature must be 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&bytes);
        issuer
            .verify(&self.license.signing_bytes()?, &signature)
            .map_err(|_| AuthError::LicenseDenied("license signature invalid".to_string()))?;
        Ok(&self.license)
    }
}

/// Parse a hex-encoded Ed25519 public key.
pub fn parse_issuer_key(encoded: &str) -> AuthResult<VerifyingKey> {
    let raw = hex::decode(encoded.trim())
        .map_err(|e| AuthError::Config(format!("issuer key is not hex: {}", e)))?;
    let bytes: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| AuthError::Config("issuer key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| AuthError::Config(format!("issuer key rejected: {}", e)))
}

#[derive(Debug, Clone)]
enum LicenseState {
    /// Nothing installed yet. Checks pass until a license arrives.
    Pending,
    Loaded(LicenseClaims),
    Rejected(String),
}

/// Snapshot of the license for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseStatus {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_id: Option<String>,
    pub max_devices: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub in_grace_period: bool,
}

/// Ed25519-verified license gate with an expiry grace period.
pub struct LicenseService {
    issuer: VerifyingKey,
    grace_period: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<LicenseState>,
}

impl LicenseService {
    /// Create a gate with no license installed yet. Checks pass in
    /// unlicensed mode until a license is installed or one fails verification.
    pub fn new(issuer: VerifyingKey, grace_period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer,
            grace_period,
            clock,
            state: RwLock::new(LicenseState::Pending),
        }
    }

    /// Build from configuration. A missing license file leaves the gate in
    /// unlicensed mode; an unverifiable one leaves it denying.
    pub fn from_config(config: &LicenseConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let issuer_hex = config.issuer_public_key.as_deref().ok_or_else(|| {
            AuthError::Config("license.issuer_public_key is required".to_string())
        })?;
        let grace = Duration::seconds(i64::try_from(config.grace_period_secs).map_err(|_| {
            AuthError::Config("license.grace_period_secs out of range".to_string())
        })?);
        let service = Self::new(parse_issuer_key(issuer_hex)?, grace, clock);

        match config.license_path.as_deref() {
            Some(path) => {
                if let Err(e) = service.load_from_file(path) {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "License not loaded"
                    );
                }
            }
            None => warn!("No license path configured; running unlicensed"),
        }
        Ok(service)
    }

    /// Read, verify and install a license file. An unreadable file changes
    /// nothing; a file that does not parse or verify is a rejection.
    pub fn load_from_file(&self, path: &Path) -> AuthResult<()> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuthError::LicenseDenied(format!("{}: {}", path.display(), e)))?;
        let license = match serde_json::from_str::<SignedLicense>(&raw) {
            Ok(license) => license,
            Err(e) => {
                let err = AuthError::from(e);
                self.reject(&err)?;
                return Err(err);
            }
        };
        self.install(&license)
    }

    /// Verify and install an already-parsed license. A license that fails
    /// verification never replaces a valid one.
    pub fn install(&self, license: &SignedLicense) -> AuthResult<()> {
        let claims = match license.verify(&self.issuer) {
            Ok(claims) => claims.clone(),
            Err(err) => {
                self.reject(&err)?;
                return Err(err);
            }
        };
        info!(
            license_id = %claims.license_id,
            max_devices = claims.max_devices,
            expires_at = %claims.expires_at.to_rfc3339(),
            "License installed"
        );
        self.set_state(LicenseState::Loaded(claims))
    }

    pub fn status(&self) -> LicenseStatus {
        let now = self.clock.now();
        match self.state.read().map(|s| s.clone()) {
            Ok(LicenseState::Loaded(claims)) => {
                let expired = now > claims.expires_at;
                LicenseStatus {
                    enabled: true,
                    license_id: Some(claims.license_id),
                    max_devices: claims.max_devices,
                    expires_at: Some(claims.expires_at),
                    expired,
                    in_grace_period: expired && now <= claims.expires_at + self.grace_period,
                }
            }
            _ => LicenseStatus {
                enabled: true,
                license_id: None,
                max_devices: 0,
                expires_at: None,
                expired: false,
                in_grace_period: false,
            },
        }
    }

    fn reject(&self, err: &AuthError) -> AuthResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| AuthError::Internal("license lock poisoned".to_string()))?;
        if !matches!(*guard, LicenseState::Loaded(_)) {
            warn!(error = %err, "License rejected");
            *guard = LicenseState::Rejected(err.to_string());
        }
        Ok(())
    }

    fn set_state(&self, state: LicenseState) -> AuthResult<()> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| AuthError::Internal("license lock poisoned".to_string()))?;
        *guard = state;
        Ok(())
    }
}

impl LicenseGate for LicenseService {
    fn is_enabled(&self) -> bool {
        true
    }

    fn check(&self) -> AuthResult<()> {
        let state = self
            .state
            .read()
            .map_err(|_| AuthError::Internal("license lock poisoned".to_string()))?;
        let claims = match &*state {
            LicenseState::Loaded(claims) => claims,
            LicenseState::Pending => {
                warn!("No license loaded; running unlicensed until one is installed");
                return Ok(());
            }
            LicenseState::Rejected(reason) => {
                return Err(AuthError::LicenseDenied(reason.clone()));
            }
        };

        let now = self.clock.now();
        if now <= claims.expires_at {
            return Ok(());
        }

        let grace_end = claims.expires_at + self.grace_period;
        if now > grace_end {
            error!(
                license_id = %claims.license_id,
                expires_at = %claims.expires_at.to_rfc3339(),
                "License expired and grace period ended"
            );
            return Err(AuthError::LicenseDenied(format!(
                "license {} expired at {}",
                claims.license_id,
                claims.expires_at.to_rfc3339()
            )));
        }

        warn!(
            license_id = %claims.license_id,
            grace_period_end = %grace_end.to_rfc3339(),
            remaining_secs = (grace_end - now).num_seconds(),
            "License expired but within grace period; renew soon"
        );
        Ok(())
    }

    fn max_devices(&self) -> u32 {
        match self.state.read().as_deref() {
            Ok(LicenseState::Loaded(claims)) => claims.max_devices,
            _ => 0,
        }
    }
}
