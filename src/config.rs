// src/config.rs
// 启动配置: JSON 文件 + 环境变量覆盖
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::store::SeedAccount;
use crate::types::Role;

pub const CONFIG_ENV: &str = "BIOMED_CONFIG";
pub const DB_ENV: &str = "BIOMED_DB";
const DEFAULT_CONFIG_FILE: &str = "biomed.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub seed_password: String,
    pub seed_accounts: Vec<SeedAccount>,
    pub window_size: [f32; 2],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("biomed.db"),
            seed_password: "admin123".to_owned(),
            seed_accounts: vec![
                SeedAccount { username: "admin_img".to_owned(), role: Role::ImageExpert },
                SeedAccount { username: "admin_sig".to_owned(), role: Role::SignalExpert },
            ],
            window_size: [1280.0, 820.0],
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// `$BIOMED_CONFIG` (or `biomed.json`) if it exists, else defaults; then
    /// `$BIOMED_DB` replaces the database path.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_or_default(&path)?;
        if let Some(db) = std::env::var_os(DB_ENV) {
            config.database_path = PathBuf::from(db);
        }
        Ok(config)
    }

    fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            log::info!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}
