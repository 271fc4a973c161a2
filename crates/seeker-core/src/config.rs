//! Configuration management for Seeker.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/seeker/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan fan-out and pacing settings
    pub scanning: ScanningConfig,
    /// SOCKS proxy settings for `.onion` hosts
    pub proxy: ProxyConfig,
    /// Job store retention settings
    pub jobs: JobsConfig,
    /// Addon pipeline thresholds
    pub addons: AddonsConfig,
    /// Optional external face-restoration service
    pub face_restore: FaceRestoreConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SEEKER_MAX_CONCURRENCY`: Override the global concurrency cap
    /// - `SEEKER_SOCKS_PROXY`: Override the SOCKS5h proxy URL for onion hosts
    /// - `SEEKER_FACE_RESTORE_URL`: Override the face-restoration endpoint
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("SEEKER_MAX_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.scanning.max_concurrency = n;
                tracing::debug!("Override max_concurrency from env: {}", n);
            }
        }

        if let Ok(val) = std::env::var("SEEKER_SOCKS_PROXY") {
            if !val.trim().is_empty() {
                config.proxy.socks_url = Some(val.trim().to_string());
                tracing::debug!("Override proxy.socks_url from env");
            }
        }

        if let Ok(val) = std::env::var("SEEKER_FACE_RESTORE_URL") {
            if !val.trim().is_empty() {
                config.face_restore.url = Some(val.trim().to_string());
                tracing::debug!("Override face_restore.url from env");
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate bounds the scan engine relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scanning.max_concurrency == 0 || self.scanning.max_concurrency > 64 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.max_concurrency".to_string(),
                reason: format!("must be 1-64, got {}", self.scanning.max_concurrency),
            });
        }

        if self.scanning.host_rate_per_sec <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.host_rate_per_sec".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if self.scanning.host_burst == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.host_burst".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/seeker/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("io", "seeker", "seeker").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Scan fan-out and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Global cap on concurrent outbound requests (1-64)
    pub max_concurrency: usize,
    /// Per-host token replenish rate, requests per second
    pub host_rate_per_sec: f64,
    /// Per-host burst capacity
    pub host_burst: u32,
    /// Default per-request timeout in seconds (providers may override)
    pub request_timeout_secs: u64,
    /// Deadline for acquiring rate-control permits, in seconds
    pub acquire_deadline_secs: u64,
    /// Whole-job deadline in seconds
    pub job_deadline_secs: u64,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 6,
            host_rate_per_sec: 2.0,
            host_burst: 4,
            request_timeout_secs: 10,
            acquire_deadline_secs: 90,
            job_deadline_secs: 180,
        }
    }
}

/// SOCKS proxy settings for `.onion` hosts.
///
/// When set, all requests to `*.onion` hosts go through the proxy and
/// all other requests go direct. Avatar fetches skip onion hosts
/// entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// SOCKS5h URL, e.g. `socks5h://127.0.0.1:9050`
    pub socks_url: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            socks_url: Some("socks5h://127.0.0.1:9050".to_string()),
        }
    }
}

/// Job store retention settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Maximum number of retained jobs before LRU eviction
    pub capacity: usize,
    /// Seconds a terminal job is retained before TTL eviction
    pub retention_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            retention_secs: 30 * 60,
        }
    }
}

/// Addon pipeline thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonsConfig {
    /// Maximum dHash Hamming distance treated as a perceptual match
    pub dhash_max_distance: u32,
    /// Maximum Euclidean distance treated as a face match
    pub face_match_distance: f32,
    /// Avatar download size cap in bytes
    pub avatar_max_bytes: u64,
}

impl Default for AddonsConfig {
    fn default() -> Self {
        Self {
            dhash_max_distance: 10,
            face_match_distance: 0.6,
            avatar_max_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Optional external face-restoration service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceRestoreConfig {
    /// Endpoint URL; unset disables the helper
    pub url: Option<String>,
    /// Request timeout in seconds (inference can be slow)
    pub timeout_secs: u64,
}

impl Default for FaceRestoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 60,
        }
    }
}
