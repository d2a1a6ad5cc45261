// src/store/mod.rs
// 账户与审计记录的持久化层 (SQLite)
pub mod audit;
pub mod credentials;
pub mod error;
pub use audit::{
    AnalysisLog, Audited, History, ImageAnalysisRecord, ImageStudyRecord, SignalAnalysisRecord, SignalKind,
    StudyEntry,
};
pub use credentials::{AuthenticatedUser, CredentialStore, SeedAccount};
pub use error::StoreError;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use rusqlite::Connection;
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS image_study (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT,
    patient_name TEXT,
    study_date TEXT,
    modality TEXT,
    source_path TEXT NOT NULL,
    derived_path TEXT,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);
CREATE TABLE IF NOT EXISTS image_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    operation_kind TEXT NOT NULL,
    parameters TEXT NOT NULL,
    result TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);
CREATE TABLE IF NOT EXISTS signal_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    signal_kind TEXT NOT NULL,
    operation_kind TEXT NOT NULL,
    parameters TEXT NOT NULL,
    result TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(id)
);
CREATE INDEX IF NOT EXISTS idx_image_study_user ON image_study (user_id);
CREATE INDEX IF NOT EXISTS idx_image_analysis_user ON image_analysis (user_id);
CREATE INDEX IF NOT EXISTS idx_signal_analysis_user ON signal_analysis (user_id);
";
/// Shared handle to the embedded store.
///
/// Cloning is cheap; every clone talks to the same connection. Components take
/// a `Database` at construction so tests can hand them an in-memory store.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}
impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open(path.as_ref())?;
        Self::from_connection(connection)
    }
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }
    fn from_connection(mut connection: Connection) -> Result<Self, StoreError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        let tx = connection.transaction()?;
        tx.execute_batch(SCHEMA)?;
        tx.commit()?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Poisoned)
    }
}
