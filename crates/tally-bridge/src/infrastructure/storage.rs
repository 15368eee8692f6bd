//! TOML persistence for the bridge settings and the card roster.
//!
//! # File layout
//!
//! ```toml
//! [bridge]
//! bind_address = "127.0.0.1"
//! http_port = 3001
//! transport = "udp"
//! trigger_mode = "staged"
//!
//! [[cards]]
//! cardId = 4
//! label = "MV 4"
//! ip = "10.0.1.14"
//! port = 8902
//! enabled = true
//! ```
//!
//! Every field has a serde default, so an empty file, a missing file or a
//! file from an older release all load.  Card entries are validated through
//! [`CardRegistry::from_entries`]; one bad entry fails the load rather than
//! silently dropping a card.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use tally_core::domain::card::DEFAULT_CARD_PORT;
use tally_core::{CardEndpoint, CardRegistry, RegistryError, TriggerMode};

use crate::domain::config::DEFAULT_HTTP_PORT;
use crate::domain::{BridgeConfig, TransportKind};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` + `http_port` is not a socket address.
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    /// A roster entry failed validation.
    #[error("invalid card entry: {0}")]
    Card(#[from] RegistryError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub cards: Vec<CardEndpoint>,
}

/// The `[bridge]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_card_port")]
    pub default_card_port: u16,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_pulse_width_ms")]
    pub pulse_width_ms: u64,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}
fn default_card_port() -> u16 {
    DEFAULT_CARD_PORT
}
fn default_pulse_width_ms() -> u64 {
    100
}
fn default_flush_interval_ms() -> u64 {
    50
}
fn default_probe_timeout_ms() -> u64 {
    3_000
}
fn default_send_timeout_ms() -> u64 {
    5_000
}
fn default_batch_concurrency() -> usize {
    8
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            default_card_port: default_card_port(),
            transport: TransportKind::default(),
            pulse_width_ms: default_pulse_width_ms(),
            flush_interval_ms: default_flush_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            batch_concurrency: default_batch_concurrency(),
            trigger_mode: TriggerMode::default(),
            log_level: default_log_level(),
        }
    }
}

impl BridgeSection {
    /// Converts the file section into the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if the address does not parse.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let raw = format!("{}:{}", self.bind_address, self.http_port);
        let bind_addr: SocketAddr = raw
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(raw.clone()))?;
        Ok(BridgeConfig {
            bind_addr,
            default_card_port: self.default_card_port,
            transport: self.transport,
            pulse_width: Duration::from_millis(self.pulse_width_ms),
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            batch_concurrency: self.batch_concurrency,
            trigger_mode: self.trigger_mode,
        })
    }
}

impl FileConfig {
    /// Builds the card registry from the `[[cards]]` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Card`] for the first invalid entry.
    pub fn registry(&self) -> Result<CardRegistry, ConfigError> {
        Ok(CardRegistry::from_entries(self.cards.iter().cloned())?)
    }
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Loads the config file at `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The loaded file plus where it lives, so roster edits can be written back.
pub struct ConfigStore {
    path: PathBuf,
    file: Mutex<FileConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf, file: FileConfig) -> Self {
        Self {
            path,
            file: Mutex::new(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the stored roster with `cards` and rewrites the file.
    ///
    /// # Errors
    ///
    /// See [`save_config`].
    pub async fn save_cards(&self, cards: &[CardEndpoint]) -> Result<(), ConfigError> {
        let mut file = self.file.lock().await;
        file.cards = cards.to_vec();
        save_config(&self.path, &file)?;
        info!(path = %self.path.display(), "card roster saved");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
