//! SQLite persistence for devices, challenges and sessions.
//!
//! One WAL-mode database backs all three stores. Challenge consumption is a
//! conditional `UPDATE`, so it stays single-winner across connections and
//! processes sharing the file, not just across threads of this process.

use chrono::{DateTime, Utc};
use edgeguard_crypto::zk::{encode_device_id, FieldBytes};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

use crate::challenge::{Challenge, ChallengeStore};
use crate::device::{DeviceCredential, DeviceStore};
use crate::error::{AuthError, AuthResult};
use crate::session::{Session, SessionStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening auth database");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuthError::Storage(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> AuthResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(conn: &Connection) -> AuthResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                device_id TEXT PRIMARY KEY,
                public_key TEXT NOT NULL,
                commitment TEXT NOT NULL,
                status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS challenges (
                challenge_id TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                nonce TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                used INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                token TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                last_used_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_challenges_expires ON challenges(expires_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_device ON sessions(device_id);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> AuthResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AuthError::Internal("sqlite connection lock poisoned".to_string()))
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, millis))
}

fn field_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<FieldBytes> {
    let encoded: String = row.get(idx)?;
    FieldBytes::from_hex(&encoded).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        challenge_id: row.get(0)?,
        device_id: row.get(1)?,
        nonce: field_column(row, 2)?,
        created_at: from_millis(row.get(3)?)?,
        expires_at: from_millis(row.get(4)?)?,
        used: row.get::<_, i64>(5)? != 0,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        device_id: row.get(1)?,
        token: row.get(2)?,
        created_at: from_millis(row.get(3)?)?,
        expires_at: from_millis(row.get(4)?)?,
        last_used_at: from_millis(row.get(5)?)?,
    })
}

impl DeviceStore for SqliteStore {
    fn get_device(&self, device_id: &str) -> AuthResult<Option<DeviceCredential>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT device_id, public_key, commitment, status FROM devices WHERE device_id = ?1",
                params![device_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        field_column(row, 2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(device_id, public_key, commitment, status)| -> AuthResult<DeviceCredential> {
            Ok(DeviceCredential {
                device_id,
                public_key,
                commitment,
                status: status.parse()?,
            })
        })
        .transpose()
    }

    fn upsert_device(&self, device: &DeviceCredential) -> AuthResult<()> {
        encode_device_id(&device.device_id)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO devices (device_id, public_key, commitment, status)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(device_id) DO UPDATE SET
                public_key = excluded.public_key,
                commitment = excluded.commitment,
                status = excluded.status
            "#,
            params![
                device.device_id,
                device.public_key,
                device.commitment.to_hex(),
                device.status.as_str(),
            ],
        )?;
        Ok(())
    }
}

impl ChallengeStore for SqliteStore {
    fn insert_challenge(&self, challenge: &Challenge) -> AuthResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO challenges (challenge_id, device_id, nonce, created_at, expires_at, used)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                challenge.challenge_id,
                challenge.device_id,
                challenge.nonce.to_hex(),
                to_millis(challenge.created_at),
                to_millis(challenge.expires_at),
                challenge.used as i64,
            ],
        )?;
        Ok(())
    }

    fn get_challenge(&self, challenge_id: &str) -> AuthResult<Option<Challenge>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                r#"
                SELECT challenge_id, device_id, nonce, created_at, expires_at, used
                FROM challenges WHERE challenge_id = ?1
                "#,
                params![challenge_id],
                challenge_from_row,
            )
            .optional()?)
    }

    fn mark_used(&self, challenge_id: &str) -> AuthResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE challenges SET used = 1 WHERE challenge_id = ?1 AND used = 0",
            params![challenge_id],
        )?;
        Ok(changed == 1)
    }

    fn purge_expired_challenges(&self, now: DateTime<Utc>) -> AuthResult<usize> {
        let conn = self.conn()?;
        Ok(conn.execute(
            "DELETE FROM challenges WHERE expires_at < ?1",
            params![to_millis(now)],
        )?)
    }
}

impl SessionStore for SqliteStore {
    fn insert_session(&self, session: &Session) -> AuthResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO sessions (session_id, device_id, token, created_at, expires_at, last_used_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                session.session_id,
                session.device_id,
                session.token,
                to_millis(session.created_at),
                to_millis(session.expires_at),
                to_millis(session.last_used_at),
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> AuthResult<Option<Session>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                r#"
                SELECT session_id, device_id, token, created_at, expires_at, last_used_at
                FROM sessions WHERE session_id = ?1
                "#,
                params![session_id],
                session_from_row,
            )
            .optional()?)
    }

    fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> AuthResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET last_used_at = ?2 WHERE session_id = ?1",
            params![session_id, to_millis(at)],
        )?;
        Ok(changed == 1)
    }

    fn renew_session(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        token: &str,
    ) -> AuthResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE sessions SET expires_at = ?2, token = ?3 WHERE session_id = ?1",
            params![session_id, to_millis(expires_at), token],
        )?;
        Ok(changed == 1)
    }

    fn delete_session(&self, session_id: &str) -> AuthResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(changed == 1)
    }

    fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AuthResult<usize> {
        let conn = self.conn()?;
        Ok(conn.execute(
            "DELETE FROM sessions WHERE expires_at < ?1",
            params![to_millis(now)],
        )?)
    }

    fn live_device_ids(&self, now: DateTime<Utc>) -> AuthResult<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT device_id FROM sessions WHERE expires_at >= ?1")?;
        let ids = stmt
            .query_map(params![to_millis(now)], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }
}
