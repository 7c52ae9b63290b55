//! EdgeGuard device authentication core.
//!
//! Sensor devices authenticate to the gateway by proving, in zero knowledge,
//! that they know the secret behind their enrollment commitment and bound
//! it to a fresh gateway challenge. On success the gateway opens a
//! short-lived session and hands out a signed bearer token.
//!
//! # Protocol
//!
//! ```text
//! device                          gateway
//!   |  generate_challenge(id)  -->  DeviceStore, RetryGuard, LicenseGate
//!   |  <-- challenge_id, nonce      ChallengeStore.insert
//!   |  prove(secret, nonce)
//!   |  verify_proof(...)       -->  witness checks, Groth16 verify,
//!   |                               ChallengeStore.mark_used (CAS),
//!   |  <-- session, token           SessionManager.create_session
//! ```

pub mod challenge;
pub mod device;
pub mod error;
pub mod license;
pub mod retry;
pub mod service;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod token;
pub mod wire;

pub use challenge::{Challenge, ChallengeStore, InMemoryChallengeStore};
pub use device::{DeviceCredential, DeviceStatus, DeviceStore, InMemoryDeviceStore};
pub use error::{AuthError, AuthResult, AUTH_FAILED_MESSAGE, INTERNAL_ERROR_MESSAGE};
pub use license::{
    DisabledLicense, LicenseClaims, LicenseGate, LicenseService, LicenseStatus, SignedLicense,
};
pub use retry::{InMemoryRetryGuard, RetryGuard};
pub use service::{AuthService, AuthServiceBuilder};
pub use session::{InMemorySessionStore, Session, SessionManager, SessionStore};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use token::{TokenClaims, TokenSecret, TokenSigner};
pub use wire::{AuthResponse, ChallengeRequest, ChallengeResponse, VerifyRequest};
