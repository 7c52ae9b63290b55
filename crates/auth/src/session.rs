//! Session lifecycle and bearer token issuance.
//!
//! Sessions are the source of truth: a token is only honoured while its
//! session record exists and has not expired, so revocation is a delete.

use chrono::{DateTime, Duration, Utc};
use edgeguard_core::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::token::{TokenClaims, TokenSecret, TokenSigner};

/// Authenticated device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub device_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

pub trait SessionStore: Send + Sync {
    fn insert_session(&self, session: &Session) -> AuthResult<()>;

    fn get_session(&self, session_id: &str) -> AuthResult<Option<Session>>;

    /// Update `last_used_at`. Returns `false` if the session is gone.
    fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> AuthResult<bool>;

    /// Set a new expiry and token. Returns `false` if the session is gone.
    fn renew_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        token: &str,
    ) -> AuthResult<bool>;

    fn delete_session(&self, session_id: &str) -> AuthResult<bool>;

    fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<usize>;

    /// Distinct devices holding a session that is live at `now`.
    fn live_device_ids(&self, now: DateTime<Utc>) -> AuthResult<HashSet<String>>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> AuthError {
    AuthError::Internal("session store lock poisoned".to_string())
}

impl SessionStore for InMemorySessionStore {
    fn insert_session(&self, session: &Session) -> AuthResult<()> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        sessions.insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> AuthResult<Option<Session>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions.get(session_id).cloned())
    }

    fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> AuthResult<bool> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        Ok(match sessions.get_mut(session_id) {
            Some(session) => {
                session.last_used_at = at;
                true
            }
            None => false,
        })
    }

    fn renew_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        token: &str,
    ) -> AuthResult<bool> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        Ok(match sessions.get_mut(session_id) {
            Some(session) => {
                session.expires_at = expires_at;
                session.token = token.to_string();
                true
            }
            None => false,
        })
    }

    fn delete_session(&self, session_id: &str) -> AuthResult<bool> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        Ok(sessions.remove(session_id).is_some())
    }

    fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<usize> {
        let mut sessions = self.sessions.write().map_err(|_| poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - sessions.len())
    }

    fn live_device_ids(&self, now: DateTime<Utc>) -> AuthResult<HashSet<String>> {
        let sessions = self.sessions.read().map_err(|_| poisoned())?;
        Ok(sessions
            .values()
            .filter(|s| !s.is_expired(now))
            .map(|s| s.device_id.clone())
            .collect())
    }
}

/// Issues, validates, refreshes and revokes sessions.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    signer: TokenSigner,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        secret: &TokenSecret,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            signer: TokenSigner::new(secret),
            ttl,
            clock,
        }
    }

    /// True when tokens are signed with a per-process random secret.
    pub fn is_ephemeral(&self) -> bool {
        self.signer.is_ephemeral()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Create and persist a session with its first token.
    pub fn create_session(&self, device_id: &str) -> AuthResult<Session> {
        let now = self.clock.now();
        let session_id = Uuid::new_v4().to_string();
        let expires_at = now + self.ttl;
        let token = self.generate_token(device_id, &session_id, now, expires_at)?;

        let session = Session {
            session_id,
            device_id: device_id.to_string(),
            token,
            created_at: now,
            expires_at,
            last_used_at: now,
        };
        self.store.insert_session(&session)?;

        info!(
            device_id = %device_id,
            session_id = %session.session_id,
            expires_at = %session.expires_at.to_rfc3339(),
            "Session created"
        );
        Ok(session)
    }

    pub fn generate_token(
        &self,
        device_id: &str,
        session_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        self.signer
            .sign(&TokenClaims::new(device_id, session_id, issued_at, expires_at))
    }

    /// Verify a token against its live session and record activity.
    pub fn validate_token(&self, token: &str) -> AuthResult<TokenClaims> {
        let now = self.clock.now();
        let (claims, _) = self.check_token(token, now)?;
        if !self.store.touch_session(&claims.session_id, now)? {
            return Err(AuthError::SessionNotFound(claims.session_id));
        }
        Ok(claims)
    }

    /// Extend a live session and issue a replacement token.
    pub fn refresh_session(&self, token: &str) -> AuthResult<Session> {
        let now = self.clock.now();
        let (claims, mut session) = self.check_token(token, now)?;

        let expires_at = now + self.ttl;
        let new_token = self.generate_token(&session.device_id, &session.session_id, now, expires_at)?;
        if !self.store.renew_session(&session.session_id, expires_at, &new_token)? {
            return Err(AuthError::SessionNotFound(claims.session_id));
        }

        session.expires_at = expires_at;
        session.token = new_token;
        session.last_used_at = now;
        self.store.touch_session(&session.session_id, now)?;

        debug!(
            device_id = %session.device_id,
            session_id = %session.session_id,
            "Session refreshed"
        );
        Ok(session)
    }

    /// Delete the session record; its tokens stop validating immediately.
    pub fn revoke_session(&self, session_id: &str) -> AuthResult<()> {
        if !self.store.delete_session(session_id)? {
            return Err(AuthError::SessionNotFound(session_id.to_string()));
        }
        info!(session_id = %session_id, "Session revoked");
        Ok(())
    }

    pub fn live_device_ids(&self) -> AuthResult<HashSet<String>> {
        self.store.live_device_ids(self.clock.now())
    }

    fn check_token(&self, token: &str, now: DateTime<Utc>) -> AuthResult<(TokenClaims, Session)> {
        let claims = self.signer.verify(token)?;
        let session = self
            .store
            .get_session(&claims.session_id)?
            .ok_or_else(|| AuthError::SessionNotFound(claims.session_id.clone()))?;
        if session.is_expired(now) {
            return Err(AuthError::SessionExpired(session.session_id));
        }
        if session.device_id != claims.device_id {
            return Err(AuthError::InvalidToken(
                "token device does not match session".to_string(),
            ));
        }
        claims.check_time(now)?;
        Ok((claims, session))
    }
}
