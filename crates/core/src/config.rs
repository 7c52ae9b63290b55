//! Configuration management for EdgeGuard.
//!
//! Configuration is read from a TOML file and then overlaid with a small set
//! of environment variables so secrets never need to live on disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Environment variable holding the session token signing secret.
pub const ENV_TOKEN_SECRET: &str = "EDGEGUARD_TOKEN_SECRET";
/// Environment variable overriding the HTTP bind address.
pub const ENV_BIND: &str = "EDGEGUARD_BIND";
/// Environment variable overriding the SQLite database path.
pub const ENV_DATABASE: &str = "EDGEGUARD_DATABASE";

/// Minimum accepted length of a configured token secret, in bytes.
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub zkp: ZkpConfig,
    pub license: LicenseConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Persistence settings. Without a database path all stores are in-memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of an issued challenge.
    pub challenge_ttl_secs: u64,
    /// Lifetime of a session from creation or last refresh.
    pub session_ttl_secs: u64,
    /// Consecutive failures after which challenge issuance is refused.
    pub max_retry: u32,
    /// Session token signing secret. Usually supplied via `EDGEGUARD_TOKEN_SECRET`.
    #[serde(skip_serializing)]
    pub token_secret: Option<String>,
    /// Permit a random per-process signing secret when none is configured.
    /// Every restart then invalidates all outstanding sessions.
    pub allow_ephemeral_secret: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_secs: 300,
            session_ttl_secs: 3600,
            max_retry: 5,
            token_secret: None,
            allow_ephemeral_secret: false,
        }
    }
}

/// Which proof verification backend to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifierBackendKind {
    /// Groth16 over BN254 with a pre-generated verifying key.
    #[default]
    Groth16,
    /// Accepts every non-empty proof. Development only.
    AcceptAll,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkpConfig {
    pub backend: VerifierBackendKind,
    pub verifying_key_path: Option<PathBuf>,
    /// Must be set explicitly for `backend = "accept-all"` to be honoured.
    pub allow_insecure_backend: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    pub enabled: bool,
    pub license_path: Option<PathBuf>,
    /// Hex-encoded Ed25519 public key of the license issuer.
    pub issuer_public_key: Option<String>,
    pub grace_period_secs: u64,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            license_path: None,
            issuer_public_key: None,
            grace_period_secs: 7 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Config {
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CoreError::Parse(e.to_string()))
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup; split out so tests do not
    /// have to mutate the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup(ENV_TOKEN_SECRET).filter(|s| !s.is_empty()) {
            self.auth.token_secret = Some(secret);
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|s| !s.is_empty()) {
            self.server.bind = bind;
        }
        if let Some(db) = lookup(ENV_DATABASE).filter(|s| !s.is_empty()) {
            self.storage.database_path = Some(PathBuf::from(db));
        }
    }

    /// Reject configurations that would start an unsafe or unusable gateway.
    pub fn validate(&self) -> Result<()> {
        if self.auth.challenge_ttl_secs == 0 {
            return Err(CoreError::Config(
                "auth.challenge_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.auth.session_ttl_secs == 0 {
            return Err(CoreError::Config(
                "auth.session_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.auth.max_retry == 0 {
            return Err(CoreError::Config(
                "auth.max_retry must be greater than 0".to_string(),
            ));
        }

        match &self.auth.token_secret {
            Some(secret) if secret.len() < MIN_TOKEN_SECRET_LEN => {
                return Err(CoreError::Config(format!(
                    "auth.token_secret must be at least {} bytes",
                    MIN_TOKEN_SECRET_LEN
                )));
            }
            Some(_) => {}
            None if !self.auth.allow_ephemeral_secret => {
                return Err(CoreError::Config(format!(
                    "no token secret configured; set {} or auth.allow_ephemeral_secret = true",
                    ENV_TOKEN_SECRET
                )));
            }
            None => {}
        }

        match self.zkp.backend {
            VerifierBackendKind::Groth16 if self.zkp.verifying_key_path.is_none() => {
                return Err(CoreError::Config(
                    "zkp.verifying_key_path is required for the groth16 backend".to_string(),
                ));
            }
            VerifierBackendKind::AcceptAll if !self.zkp.allow_insecure_backend => {
                return Err(CoreError::Config(
                    "zkp.backend = \"accept-all\" requires zkp.allow_insecure_backend = true"
                        .to_string(),
                ));
            }
            _ => {}
        }

        if self.license.enabled {
            if self.license.license_path.is_none() {
                return Err(CoreError::Config(
                    "license.license_path is required when licensing is enabled".to_string(),
                ));
            }
            if self.license.issuer_public_key.is_none() {
                return Err(CoreError::Config(
                    "license.issuer_public_key is required when licensing is enabled".to_string(),
                ));
            }
        }

        Ok(())
    }
}
