use log::{info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::store::{Database, StoreError};
use crate::types::{Role, UserId};
const SALT_LEN: usize = 16;
const SCHEME: &str = "sha256";
/// Identity returned by a successful [`CredentialStore::authenticate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}
/// Account created at startup when it cannot already log in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAccount {
    pub username: String,
    pub role: Role,
}
/// Users table: registration and login.
///
/// Passwords are never stored; each row keeps `sha256$<salt>$<hex digest>`.
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
}
impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
    /// Creates a new account. A taken username fails with
    /// [`StoreError::DuplicateUsername`] and leaves the existing row untouched.
    pub fn register(&self, username: &str, password: &str, role: Role) -> Result<UserId, StoreError> {
        if username.is_empty() || password.is_empty() {
            return Err(StoreError::EmptyCredentials);
        }
        let stored = encode_digest(&new_salt(), password);
        let conn = self.db.lock()?;
        let inserted = conn.execute(
            "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
            params![username, stored, role.as_str()],
        );
        match inserted {
            Ok(_) => {
                let id = UserId(conn.last_insert_rowid());
                info!("registered `{username}` as {role}");
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateUsername(username.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }
    /// Returns the matching identity, or `None` for an unknown username and a
    /// wrong password alike.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<AuthenticatedUser>, StoreError> {
        let row: Option<(i64, String, String)> = {
            let conn = self.db.lock()?;
            conn.query_row(
                "SELECT id, password_hash, role FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        };
        let Some((id, stored, role)) = row else {
            // keep the unknown-user path as expensive as a real comparison
            std::hint::black_box(encode_digest("", password));
            return Ok(None);
        };
        if !verify(password, &stored) {
            return Ok(None);
        }
        let role = Role::parse(&role).ok_or_else(|| StoreError::Corrupt {
            table: "users",
            detail: format!("unknown role `{role}` for user {id}"),
        })?;
        Ok(Some(AuthenticatedUser {
            id: UserId(id),
            username: username.to_owned(),
            role,
        }))
    }
    /// Makes sure every seed account can log in with `password`.
    ///
    /// Accounts that already authenticate are skipped. A seed name taken by an
    /// account with a different password is logged and skipped. Returns the
    /// number of accounts created.
    pub fn ensure_seed_accounts(
        &self,
        seeds: &[SeedAccount],
        password: &str,
    ) -> Result<usize, StoreError> {
        let mut created = 0;
        for seed in seeds {
            if self.authenticate(&seed.username, password)?.is_some() {
                continue;
            }
            match self.register(&seed.username, password, seed.role) {
                Ok(_) => created += 1,
                Err(StoreError::DuplicateUsername(name)) => {
                    warn!("seed account `{name}` exists with a different password; leaving it as is")
                }
                Err(err) => return Err(err),
            }
        }
        Ok(created)
    }
}
fn new_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}
fn hex_digest(salt: &str, password: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    format!("{digest:x}")
}
fn encode_digest(salt: &str, password: &str) -> String {
    format!("{SCHEME}${salt}${}", hex_digest(salt, password))
}
fn verify(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(salt), Some(expected)) => {
            constant_time_eq(hex_digest(salt, password).as_bytes(), expected.as_bytes())
        }
        // unsalted hex digests written by older databases
        (Some(legacy), None, None) => {
            constant_time_eq(hex_digest("", password).as_bytes(), legacy.as_bytes())
        }
        _ => false,
    }
}
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
