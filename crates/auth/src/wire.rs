//! JSON request and response bodies of the authentication endpoints.

use chrono::{DateTime, Utc};
use edgeguard_crypto::zk::{FieldBytes, ProofPayload};
use serde::{Deserialize, Serialize};

use crate::challenge::Challenge;
use crate::session::Session;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge_id: String,
    pub nonce: FieldBytes,
    pub expires_at: DateTime<Utc>,
}

impl From<&Challenge> for ChallengeResponse {
    fn from(challenge: &Challenge) -> Self {
        Self {
            challenge_id: challenge.challenge_id.clone(),
            nonce: challenge.nonce,
            expires_at: challenge.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub device_id: String,
    pub challenge_id: String,
    pub proof: ProofPayload,
}

/// Body of every session-issuing endpoint, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: None,
            token: None,
            expires_at: None,
            message: Some(message.into()),
        }
    }
}

impl From<&Session> for AuthResponse {
    fn from(session: &Session) -> Self {
        Self {
            success: true,
            session_id: Some(session.session_id.clone()),
            token: Some(session.token.clone()),
            expires_at: Some(session.expires_at),
            message: None,
        }
    }
}
