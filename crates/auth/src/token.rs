//! Signed bearer tokens.
//!
//! Format: `base64url(header).base64url(claims).base64url(tag)` where the tag
//! is a BLAKE3 keyed hash over the first two segments. The MAC key is derived
//! from the process-wide token secret and never leaves this module.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{AuthError, AuthResult};

const MAC_KEY_CONTEXT: &str = "edgeguard session token mac v1";
const TOKEN_ALG: &str = "BLAKE3-MAC";
const TOKEN_TYP: &str = "EGT";

/// Where the signing secret came from.
pub enum TokenSecret {
    /// Operator-supplied secret, stable across restarts.
    Configured(Zeroizing<Vec<u8>>),
    /// Random per-process secret; every restart invalidates all tokens.
    Ephemeral(Zeroizing<[u8; 32]>),
}

impl TokenSecret {
    pub fn configured(secret: impl AsRef<[u8]>) -> Self {
        TokenSecret::Configured(Zeroizing::new(secret.as_ref().to_vec()))
    }

    pub fn ephemeral() -> Self {
        let mut bytes = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut bytes[..]);
        TokenSecret::Ephemeral(bytes)
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, TokenSecret::Ephemeral(_))
    }

    fn material(&self) -> &[u8] {
        match self {
            TokenSecret::Configured(bytes) => bytes.as_slice(),
            TokenSecret::Ephemeral(bytes) => bytes.as_slice(),
        }
    }
}

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_ephemeral() { "Ephemeral" } else { "Configured" };
        write!(f, "TokenSecret::{}(<redacted>)", kind)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Claims carried by a session token. Times are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub device_id: String,
    pub session_id: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn new(
        device_id: &str,
        session_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            session_id: session_id.to_string(),
            sub: device_id.to_string(),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Enforce `nbf` and `exp` at `now`.
    pub fn check_time(&self, now: DateTime<Utc>) -> AuthResult<()> {
        let now = now.timestamp();
        if now < self.nbf {
            return Err(AuthError::InvalidToken("token not yet valid".to_string()));
        }
        if now > self.exp {
            return Err(AuthError::InvalidToken("token expired".to_string()));
        }
        Ok(())
    }
}

/// Issues and checks token signatures.
pub struct TokenSigner {
    key: Zeroizing<[u8; 32]>,
    ephemeral: bool,
}

impl TokenSigner {
    pub fn new(secret: &TokenSecret) -> Self {
        Self {
            key: Zeroizing::new(blake3::derive_key(MAC_KEY_CONTEXT, secret.material())),
            ephemeral: secret.is_ephemeral(),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    fn tag(&self, signing_input: &str) -> blake3::Hash {
        blake3::keyed_hash(&self.key, signing_input.as_bytes())
    }

    pub fn sign(&self, claims: &TokenClaims) -> AuthResult<String> {
        let header = TokenHeader {
            alg: TOKEN_ALG.to_string(),
            typ: TOKEN_TYP.to_string(),
        };
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
        );
        let tag = self.tag(&signing_input);
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(tag.as_bytes())))
    }

    /// Check format, algorithm and tag; return the claims without any time
    /// checks.
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        let mut parts = token.split('.');
        let (header_b64, claims_b64, tag_b64) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(t), None) => (h, c, t),
                _ => return Err(AuthError::InvalidToken("expected three segments".to_string())),
            };

        let tag_bytes: [u8; 32] = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .ok()
            .and_then(|raw| raw.as_slice().try_into().ok())
            .ok_or_else(|| AuthError::InvalidToken("malformed tag".to_string()))?;
        let expected = self.tag(&token[..header_b64.len() + 1 + claims_b64.len()]);
        // blake3::Hash equality is constant time.
        if expected != blake3::Hash::from(tag_bytes) {
            return Err(AuthError::InvalidToken("signature mismatch".to_string()));
        }

        let header: TokenHeader = decode_segment(header_b64)?;
        if header.alg != TOKEN_ALG || header.typ != TOKEN_TYP {
            return Err(AuthError::InvalidToken(format!(
                "unsupported token type {}/{}",
                header.alg, header.typ
            )));
        }
        decode_segment(claims_b64)
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> AuthResult<T> {
    let raw = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::InvalidToken(format!("bad base64: {}", e)))?;
    serde_json::from_slice(&raw).map_err(|e| AuthError::InvalidToken(format!("bad json: {}", e)))
}
