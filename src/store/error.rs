use thiserror::Error;
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("username `{0}` is already registered")]
    DuplicateUsername(String),
    #[error("username and password must not be empty")]
    EmptyCredentials,
    #[error("store connection mutex poisoned")]
    Poisoned,
    #[error("corrupt row in `{table}`: {detail}")]
    Corrupt { table: &'static str, detail: String },
    #[error("failed to serialize audit parameters: {0}")]
    Params(#[from] serde_json::Error),
}
impl StoreError {
    /// True when the failure means the caller supplied a taken username.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateUsername(_))
    }
}
