//! # Tote Configuration
//!
//! Where the cart is persisted and how writes are flushed.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TOTE_STORAGE_KEY=shopping-cart                                     │
//! │     TOTE_FLUSH_MODE=immediate                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tote/tote.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.tote.cart/tote.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     key "shopping-cart", file backend, coalesced writes (50ms)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [storage]
//! key = "shopping-cart"
//! backend = "file"        # file | memory
//! data_dir = "/var/lib/tote"
//!
//! [persistence]
//! enabled = true
//! flush_mode = "coalesced"  # immediate | coalesced
//! coalesce_window_ms = 50
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tote_core::DEFAULT_STORAGE_KEY;

use crate::backend::{FileStorage, MemoryStorage, Storage};
use crate::error::{StorageError, StorageResult};
use crate::write_behind::DEFAULT_COALESCE_WINDOW_MS;

// =============================================================================
// Enums
// =============================================================================

/// Which storage backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// One JSON file per key under `data_dir`.
    #[default]
    File,
    /// Process-local map. Nothing survives a restart.
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::File => write!(f, "file"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "fs" => Ok(BackendKind::File),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(StorageError::InvalidConfig(format!(
                "Unknown storage backend: '{}'. Valid options: file, memory",
                other
            ))),
        }
    }
}

/// When writes reach storage.
///
/// ## Mode Comparison
/// ```text
/// IMMEDIATE                           │  COALESCED (Default)
/// ──────────                          │  ─────────────────────
/// • Write inside every mutation       │  • Latest value written once the
/// • One write per change              │    window elapses or on flush()
/// • No runtime needed                 │  • Needs a tokio runtime
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    Immediate,
    #[default]
    Coalesced,
}

impl std::fmt::Display for FlushMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushMode::Immediate => write!(f, "immediate"),
            FlushMode::Coalesced => write!(f, "coalesced"),
        }
    }
}

impl std::str::FromStr for FlushMode {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "immediate" | "sync" => Ok(FlushMode::Immediate),
            "coalesced" | "deferred" => Ok(FlushMode::Coalesced),
            other => Err(StorageError::InvalidConfig(format!(
                "Unknown flush mode: '{}'. Valid options: immediate, coalesced",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Key the cart is stored under.
    #[serde(default = "default_key")]
    pub key: String,

    #[serde(default)]
    pub backend: BackendKind,

    /// Directory for the file backend. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            key: default_key(),
            backend: BackendKind::default(),
            data_dir: None,
        }
    }
}

/// `[persistence]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// When false the cart is purely in-memory.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub flush_mode: FlushMode,

    /// Only used in coalesced mode.
    #[serde(default = "default_coalesce_window")]
    pub coalesce_window_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_coalesce_window() -> u64 {
    DEFAULT_COALESCE_WINDOW_MS
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            enabled: true,
            flush_mode: FlushMode::default(),
            coalesce_window_ms: default_coalesce_window(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Tote configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToteConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,
}

impl ToteConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`tote.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StorageResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| StorageError::ConfigLoad(format!("{}: {}", path.display(), e)))?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document. Missing sections fall back to defaults.
    pub fn from_toml(contents: &str) -> StorageResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> StorageResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StorageError::ConfigSave("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StorageResult<()> {
        if self.storage.key.trim().is_empty() {
            return Err(StorageError::InvalidConfig(
                "storage.key must not be empty".into(),
            ));
        }

        if self.persistence.flush_mode == FlushMode::Coalesced
            && self.persistence.coalesce_window_ms == 0
        {
            return Err(StorageError::InvalidConfig(
                "coalesce_window_ms must be greater than 0 in coalesced mode".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TOTE_*` overrides looked up through `var`.
    ///
    /// `load` passes the process environment.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("TOTE_STORAGE_KEY") {
            debug!(key = %key, "Overriding storage key from environment");
            self.storage.key = key;
        }

        if let Some(backend) = var("TOTE_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(parsed) => self.storage.backend = parsed,
                Err(_) => warn!(backend = %backend, "Unknown storage backend in environment"),
            }
        }

        if let Some(dir) = var("TOTE_DATA_DIR") {
            debug!(dir = %dir, "Overriding data dir from environment");
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(mode) = var("TOTE_FLUSH_MODE") {
            match mode.parse() {
                Ok(parsed) => self.persistence.flush_mode = parsed,
                Err(_) => warn!(mode = %mode, "Unknown flush mode in environment"),
            }
        }

        if let Some(window) = var("TOTE_COALESCE_WINDOW_MS") {
            if let Ok(ms) = window.parse::<u64>() {
                self.persistence.coalesce_window_ms = ms;
            }
        }

        if let Some(enabled) = var("TOTE_PERSIST") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.persistence.enabled = true,
                "0" | "false" | "no" | "off" => self.persistence.enabled = false,
                _ => warn!(value = %enabled, "Unrecognized TOTE_PERSIST value"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tote", "cart")
            .map(|dirs| dirs.config_dir().join("tote.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.persistence.coalesce_window_ms)
    }

    /// Directory used by the file backend.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.storage.data_dir.clone().or_else(|| {
            directories::ProjectDirs::from("com", "tote", "cart")
                .map(|dirs| dirs.data_dir().to_path_buf())
        })
    }

    /// Opens the configured backend.
    pub fn open_storage(&self) -> StorageResult<Arc<dyn Storage>> {
        match self.storage.backend {
            BackendKind::Memory => Ok(Arc::new(MemoryStorage::new())),
            BackendKind::File => {
                let dir = self.data_dir().ok_or_else(|| {
                    StorageError::Unavailable("Could not determine data directory".into())
                })?;
                info!(dir = %dir.display(), "Using file storage");
                Ok(Arc::new(FileStorage::new(dir)))
            }
        }
    }
}
