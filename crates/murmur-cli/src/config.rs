//! `murmur` settings file.
//!
//! ```toml
//! [store]
//! path = "/home/me/.local/share/murmur/store"
//!
//! [stream]
//! buffer_size = 65536
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section and key is optional.

use anyhow::{Context, bail};
use murmur_core::StreamConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Largest accepted stream chunk.
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
}

/// Where the key box keeps its identity, prekeys and sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            path: base.join("murmur").join("store"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

impl Config {
    /// `<config dir>/murmur/config.toml`
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(std::env::temp_dir);
        base.join("murmur").join("config.toml")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("cannot parse {}", path.display()))
    }

    /// Write the file, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("cannot write {}", path.display()))
    }

    /// Read the file at the default path, writing defaults there first if it
    /// does not exist yet.
    pub fn load_or_init() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            return Self::load(&path);
        }
        let config = Self::default();
        config.save(&path)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            bail!(
                "unknown log level {:?}, expected one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            );
        }
        if !(1..=MAX_BUFFER_SIZE).contains(&self.stream.buffer_size) {
            bail!("stream.buffer_size must be between 1 and {MAX_BUFFER_SIZE}");
        }
        if self.store.path.as_os_str().is_empty() {
            bail!("store.path must not be empty");
        }
        Ok(())
    }
}
