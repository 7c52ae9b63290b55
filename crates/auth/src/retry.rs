//! Per-device consecutive failure tracking.
//!
//! State is process-local and cleared on restart.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{AuthError, AuthResult};

pub trait RetryGuard: Send + Sync {
    /// Current consecutive failure count.
    fn count(&self, device_id: &str) -> AuthResult<u32>;

    /// Increment and return the new count.
    fn record_failure(&self, device_id: &str) -> AuthResult<u32>;

    /// Clear the counter after a success or an operator reset.
    fn reset(&self, device_id: &str) -> AuthResult<()>;

    fn is_locked(&self, device_id: &str, max_retry: u32) -> AuthResult<bool> {
        Ok(self.count(device_id)? >= max_retry)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRetryGuard {
    counts: Mutex<HashMap<String, u32>>,
}

impl InMemoryRetryGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of devices with a non-zero counter.
    pub fn len(&self) -> usize {
        self.counts.lock().map(|counts| counts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AuthError {
    AuthError::Internal("retry guard lock poisoned".to_string())
}

impl RetryGuard for InMemoryRetryGuard {
    fn count(&self, device_id: &str) -> AuthResult<u32> {
        let counts = self.counts.lock().map_err(|_| poisoned())?;
        Ok(counts.get(device_id).copied().unwrap_or(0))
    }

    fn record_failure(&self, device_id: &str) -> AuthResult<u32> {
        let mut counts = self.counts.lock().map_err(|_| poisoned())?;
        let count = counts.entry(device_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    fn reset(&self, device_id: &str) -> AuthResult<()> {
        let mut counts = self.counts.lock().map_err(|_| poisoned())?;
        counts.remove(device_id);
        Ok(())
    }
}
