//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_REMOTE_URL=https://tally.example.com                         │
//! │     TALLY_BUSINESS_ID=abc-123                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally-pos/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.tally.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     no remote, batch_size = 100, device id from the ledger             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! name = "Front Counter"
//!
//! [business]
//! id = "6f1c2a5e-0c1b-4b8e-9f5e-2d7a1f0e9b11"
//!
//! [sync]
//! remote_url = "https://tally.example.com"
//! auth_token = "..."
//! batch_size = 100
//! request_timeout_secs = 30
//!
//! [database]
//! path = "/var/lib/tally/tally.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Overrides the device id stored in the ledger's `app_meta` row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable device name (e.g., "Front Counter").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "POS Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: None,
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Business Configuration
// =============================================================================

/// The business whose rows this device uploads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the remote store. Sync is disabled while unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Maximum rows fetched per table per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_batch_size() -> u32 {
    100
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            remote_url: None,
            auth_token: None,
            batch_size: default_batch_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Ledger file. Defaults to `tally.db` in the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device-specific configuration.
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub business: BusinessConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if let Some(ref raw) = self.sync.remote_url {
            let url = Url::parse(raw)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!(
                    "Remote URL must start with http:// or https://, got: {}",
                    raw
                )));
            }
        }

        if self.sync.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.sync.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if matches!(self.business.id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(SyncError::MissingBusinessId);
        }

        Ok(())
    }

    /// Applies `TALLY_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("TALLY_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = Some(id);
        }

        if let Some(name) = lookup("TALLY_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(id) = lookup("TALLY_BUSINESS_ID") {
            self.business.id = Some(id);
        }

        if let Some(url) = lookup("TALLY_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.sync.remote_url = Some(url);
        }

        if let Some(token) = lookup("TALLY_AUTH_TOKEN") {
            self.sync.auth_token = Some(token);
        }

        if let Some(size) = lookup("TALLY_SYNC_BATCH_SIZE") {
            match size.parse::<u32>() {
                Ok(n) => self.sync.batch_size = n,
                Err(_) => warn!(value = %size, "Ignoring non-numeric TALLY_SYNC_BATCH_SIZE"),
            }
        }

        if let Some(path) = lookup("TALLY_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the configured business, or an error naming how to set it.
    pub fn business_id(&self) -> SyncResult<&str> {
        self.business
            .id
            .as_deref()
            .ok_or(SyncError::MissingBusinessId)
    }

    /// Returns true if a remote store is configured.
    pub fn is_sync_enabled(&self) -> bool {
        self.sync.remote_url.is_some()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.sync.remote_url.as_deref()
    }

    /// Ledger file to open: the configured path or the platform default.
    pub fn database_path(&self) -> SyncResult<PathBuf> {
        if let Some(ref path) = self.database.path {
            return Ok(path.clone());
        }

        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.data_dir().join("tally.db"))
            .ok_or_else(|| SyncError::InvalidConfig("No data directory available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(config.device.id.is_none());
        assert_eq!(config.device.name, "POS Terminal");
        assert_eq!(config.sync.batch_size, 100);
        assert!(!config.is_sync_enabled());
        assert!(matches!(config.business_id(), Err(SyncError::MissingBusinessId)));
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.sync.remote_url = Some("ws://localhost:8080".to_string());
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.sync.remote_url = Some("not a url".to_string());
        assert!(config.validate().is_err());

        config.sync.remote_url = Some("https://tally.example.com".to_string());
        assert!(config.validate().is_ok());

        config.sync.batch_size = 0;
        assert!(config.validate().is_err());

        config.sync.batch_size = 50;
        config.business.id = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(SyncError::MissingBusinessId)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TALLY_BUSINESS_ID", "biz-1"),
            ("TALLY_REMOTE_URL", "https://tally.example.com"),
            ("TALLY_AUTH_TOKEN", "secret"),
            ("TALLY_SYNC_BATCH_SIZE", "25"),
            ("TALLY_DEVICE_NAME", "Back Office"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.business_id().unwrap(), "biz-1");
        assert_eq!(config.remote_url(), Some("https://tally.example.com"));
        assert_eq!(config.sync.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.sync.batch_size, 25);
        assert_eq!(config.device.name, "Back Office");
        assert!(config.device.id.is_none());
    }

    #[test]
    fn test_bad_batch_size_override_is_ignored() {
        let mut config = SyncConfig::default();
        config.apply_overrides(|key| (key == "TALLY_SYNC_BATCH_SIZE").then(|| "lots".to_string()));
        assert_eq!(config.sync.batch_size, 100);
    }

    #[test]
    fn test_file_then_save_roundtrip() {
        let contents = r#"
            [business]
            id = "biz-9"

            [sync]
            remote_url = "http://localhost:3210"
        "#;
        let config: SyncConfig = toml::from_str(contents).unwrap();
        assert_eq!(config.business_id().unwrap(), "biz-9");
        assert_eq!(config.sync.request_timeout_secs, 30);

        let dir = std::env::temp_dir().join(format!("tally-sync-config-{}", std::process::id()));
        let path = dir.join("sync.toml");
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.remote_url(), config.remote_url());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_toml_serialization() {
        let config = SyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[device]"));
        assert!(toml_str.contains("[sync]"));
    }
}
