//! Challenge records and their persistence contract.
//!
//! A challenge is created once, consumed at most once through
//! [`ChallengeStore::mark_used`], and never deleted by the protocol.

use chrono::{DateTime, Utc};
use edgeguard_crypto::zk::FieldBytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{AuthError, AuthResult};

/// Single-use nonce issued to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: String,
    pub device_id: String,
    pub nonce: FieldBytes,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl Challenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

pub trait ChallengeStore: Send + Sync {
    fn insert_challenge(&self, challenge: &Challenge) -> AuthResult<()>;

    fn get_challenge(&self, challenge_id: &str) -> AuthResult<Option<Challenge>>;

    /// Atomically flip `used` from false to true.
    ///
    /// Returns `true` only for the single caller that performed the flip;
    /// every concurrent or later caller gets `false`.
    fn mark_used(&self, challenge_id: &str) -> AuthResult<bool>;

    /// Physically remove challenges that expired before `now`.
    fn purge_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<usize>;
}

#[derive(Debug, Default)]
pub struct InMemoryChallengeStore {
    challenges: RwLock<HashMap<String, Challenge>>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> AuthError {
    AuthError::Internal("challenge store lock poisoned".to_string())
}

impl ChallengeStore for InMemoryChallengeStore {
    fn insert_challenge(&self, challenge: &Challenge) -> AuthResult<()> {
        let mut challenges = self.challenges.write().map_err(|_| poisoned())?;
        if challenges.contains_key(&challenge.challenge_id) {
            return Err(AuthError::Storage(format!(
                "duplicate challenge id {}",
                challenge.challenge_id
            )));
        }
        challenges.insert(challenge.challenge_id.clone(), challenge.clone());
        Ok(())
    }

    fn get_challenge(&self, challenge_id: &str) -> AuthResult<Option<Challenge>> {
        let challenges = self.challenges.read().map_err(|_| poisoned())?;
        Ok(challenges.get(challenge_id).cloned())
    }

    fn mark_used(&self, challenge_id: &str) -> AuthResult<bool> {
        let mut challenges = self.challenges.write().map_err(|_| poisoned())?;
        match challenges.get_mut(challenge_id) {
            Some(challenge) if !challenge.used => {
                challenge.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn purge_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<usize> {
        let mut challenges = self.challenges.write().map_err(|_| poisoned())?;
        let before = challenges.len();
        challenges.retain(|_, c| !c.is_expired(now));
        Ok(before - challenges.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use std::thread;

    fn challenge(id: &str, now: DateTime<Utc>) -> Challenge {
        Challenge {
            challenge_id: id.to_string(),
            device_id: "SENSOR-01".to_string(),
            nonce: FieldBytes::default(),
            created_at: now,
            expires_at: now + Duration::seconds(300),
            used: false,
        }
    }

    #[test]
    fn test_mark_used_once() {
        let store = InMemoryChallengeStore::new();
        store.insert_challenge(&challenge("c1", Utc::now())).unwrap();

        assert!(store.mark_used("c1").unwrap());
        assert!(!store.mark_used("c1").unwrap());
        assert!(!store.mark_used("missing").unwrap());
        assert!(store.get_challenge("c1").unwrap().unwrap().used);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = InMemoryChallengeStore::new();
        let now = Utc::now();
        store.insert_challenge(&challenge("c1", now)).unwrap();
        assert!(matches!(
            store.insert_challenge(&challenge("c1", now)),
            Err(AuthError::Storage(_))
        ));
    }

    #[test]
    fn test_concurrent_mark_used_single_winner() {
        let store = Arc::new(InMemoryChallengeStore::new());
        store.insert_challenge(&challenge("c1", Utc::now())).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.mark_used("c1").unwrap())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_purge_expired() {
        let store = InMemoryChallengeStore::new();
        let now = Utc::now();
        store.insert_challenge(&challenge("old", now - Duration::hours(1))).unwrap();
        store.insert_challenge(&challenge("fresh", now)).unwrap();

        assert_eq!(store.purge_expired_challenges(now).unwrap(), 1);
        assert!(store.get_challenge("old").unwrap().is_none());
        assert!(store.get_challenge("fresh").unwrap().is_some());
    }
}
