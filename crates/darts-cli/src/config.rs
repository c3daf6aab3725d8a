use std::path::{Path, PathBuf};

use darts_core::DatabaseConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct DartsConfig {
    pub database: DatabaseSection,
    #[serde(default)]
    pub sync: SyncSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub directory: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default)]
    pub trace_sql: bool,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SyncSection {
    pub remote_directory: Option<String>,
    pub remote_name: Option<String>,
}

fn default_pool_size() -> u32 {
    DatabaseConfig::default().pool_size
}

impl DartsConfig {
    pub fn new(
        database_directory: PathBuf,
        remote_directory: Option<String>,
        remote_name: Option<String>,
    ) -> Self {
        Self {
            database: DatabaseSection {
                directory: database_directory.to_string_lossy().to_string(),
                pool_size: default_pool_size(),
                trace_sql: false,
            },
            sync: SyncSection {
                remote_directory,
                remote_name,
            },
        }
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            pool_size: self.database.pool_size.max(1),
            trace_sql: self.database.trace_sql,
            ..DatabaseConfig::default()
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_database_directory() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("Databases").join("Darts"))
}

pub fn read_config(path: &Path) -> anyhow::Result<DartsConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &DartsConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("darts"));
        }
    }
    Ok(home_dir()?.join(".config").join("darts"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("darts"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("darts"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
