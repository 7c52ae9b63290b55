//! Device credential records and their lookup contract.
//!
//! The registry that enrolls devices lives outside the authentication core;
//! this module only defines what the core reads from it.

use edgeguard_crypto::zk::{encode_device_id, FieldBytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use crate::error::{AuthError, AuthResult};

/// Lifecycle state of an enrolled device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Revoked,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
            DeviceStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeviceStatus::Active),
            "inactive" => Ok(DeviceStatus::Inactive),
            "revoked" => Ok(DeviceStatus::Revoked),
            other => Err(AuthError::Storage(format!("unknown device status: {}", other))),
        }
    }
}

/// Enrollment record for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    pub device_id: String,
    /// Opaque device public key as registered (hex).
    pub public_key: String,
    /// `MiMC(secret, encode(device_id))`, fixed at enrollment.
    pub commitment: FieldBytes,
    pub status: DeviceStatus,
}

impl DeviceCredential {
    /// Build an active credential, checking that the id is encodable.
    pub fn new(
        device_id: impl Into<String>,
        public_key: impl Into<String>,
        commitment: FieldBytes,
    ) -> AuthResult<Self> {
        let device_id = device_id.into();
        encode_device_id(&device_id)?;
        Ok(Self {
            device_id,
            public_key: public_key.into(),
            commitment,
            status: DeviceStatus::Active,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}

/// Read access to the device registry, plus an upsert used by enrollment
/// tooling.
pub trait DeviceStore: Send + Sync {
    fn get_device(&self, device_id: &str) -> AuthResult<Option<DeviceCredential>>;

    fn upsert_device(&self, device: &DeviceCredential) -> AuthResult<()>;
}

/// Process-local device registry.
#[derive(Debug, Default)]
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceCredential>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStore for InMemoryDeviceStore {
    fn get_device(&self, device_id: &str) -> AuthResult<Option<DeviceCredential>> {
        let devices = self
            .devices
            .read()
            .map_err(|_| AuthError::Internal("device store lock poisoned".to_string()))?;
        Ok(devices.get(device_id).cloned())
    }

    fn upsert_device(&self, device: &DeviceCredential) -> AuthResult<()> {
        encode_device_id(&device.device_id)?;
        let mut devices = self
            .devices
            .write()
            .map_err(|_| AuthError::Internal("device store lock poisoned".to_string()))?;
        devices.insert(device.device_id.clone(), device.clone());
        Ok(())
    }
}
