//! # Allocator Configuration
//!
//! Settings for the serial allocator.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     GEMTAG_GAP_SCAN_POLICY=strict                                      │
//! │     GEMTAG_HOLD_TTL_SECS=900                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/gemtag/allocator.toml (Linux)                            │
//! │     ~/Library/Application Support/com.gemtag.gemtag/allocator.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # allocator.toml
//! gap_scan_policy = "strict"   # strict | assume_no_gaps
//! max_batch_size = 1000
//! hold_ttl_secs = 900
//! barcode_pad = 6
//!
//! [retry]
//! max_retries = 8
//! initial_backoff_ms = 20
//! max_backoff_ms = 1000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gemtag_core::validation::validate_pad;
use gemtag_core::{DEFAULT_BARCODE_PAD, DEFAULT_MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Gap Scan Policy
// =============================================================================

/// What to do when the existing-items query fails during a reservation.
///
/// ## Policy Comparison
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  STRICT (Default)                    │  ASSUME_NO_GAPS                 │
/// │  ────────────────                    │  ──────────────                 │
/// │  • Reservation fails                 │  • Logs a warning               │
/// │  • Nothing committed                 │  • Extends the counter only     │
/// │  • Caller retries later              │  • Deleted serials stay unused  │
/// │                                      │    until a later reservation    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapScanPolicy {
    /// Abort the reservation.
    #[default]
    Strict,

    /// Skip gap reuse and extend the counter for the whole batch.
    AssumeNoGaps,
}

impl std::fmt::Display for GapScanPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapScanPolicy::Strict => write!(f, "strict"),
            GapScanPolicy::AssumeNoGaps => write!(f, "assume_no_gaps"),
        }
    }
}

impl std::str::FromStr for GapScanPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" | "abort" => Ok(GapScanPolicy::Strict),
            "assume_no_gaps" | "degrade" => Ok(GapScanPolicy::AssumeNoGaps),
            other => Err(ConfigError::InvalidConfig(format!(
                "Unknown gap scan policy: '{}'. Valid options: strict, assume_no_gaps",
                other
            ))),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Internal retry of busy or conflicting reservation transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt. 0 disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    8
}
fn default_initial_backoff() -> u64 {
    20
}
fn default_max_backoff() -> u64 {
    1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// =============================================================================
// Allocator Configuration
// =============================================================================

/// Complete allocator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Behaviour when the gap scan query fails.
    #[serde(default)]
    pub gap_scan_policy: GapScanPolicy,

    /// Largest count accepted by one reservation.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,

    /// How long reserved serials stay held without a commit (seconds).
    #[serde(default = "default_hold_ttl")]
    pub hold_ttl_secs: u64,

    /// Zero-padding width of the barcode serial segment.
    #[serde(default = "default_barcode_pad")]
    pub barcode_pad: usize,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_max_batch_size() -> u32 {
    DEFAULT_MAX_BATCH_SIZE
}

/// Longest accepted hold lifetime (one day).
pub const MAX_HOLD_TTL_SECS: u64 = 86_400;

fn default_hold_ttl() -> u64 {
    900
}
fn default_barcode_pad() -> usize {
    DEFAULT_BARCODE_PAD
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            gap_scan_policy: GapScanPolicy::default(),
            max_batch_size: default_max_batch_size(),
            hold_ttl_secs: default_hold_ttl(),
            barcode_pad: default_barcode_pad(),
            retry: RetrySettings::default(),
        }
    }
}

impl AllocatorConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (allocator.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading allocator config from file");
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
            warn!("Failed to load allocator config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Allocator config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_batch_size must be greater than 0".into(),
            ));
        }

        if self.hold_ttl_secs == 0 || self.hold_ttl_secs > MAX_HOLD_TTL_SECS {
            return Err(ConfigError::InvalidConfig(format!(
                "hold_ttl_secs must be between 1 and {}",
                MAX_HOLD_TTL_SECS
            )));
        }

        validate_pad(self.barcode_pad).map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::InvalidConfig(
                "initial_backoff_ms must not exceed max_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(policy) = std::env::var("GEMTAG_GAP_SCAN_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding gap scan policy from environment");
                    self.gap_scan_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown gap scan policy in environment"),
            }
        }

        if let Ok(size) = std::env::var("GEMTAG_MAX_BATCH_SIZE") {
            if let Ok(n) = size.parse::<u32>() {
                self.max_batch_size = n;
            }
        }

        if let Ok(ttl) = std::env::var("GEMTAG_HOLD_TTL_SECS") {
            if let Ok(secs) = ttl.parse::<u64>() {
                debug!(secs, "Overriding hold TTL from environment");
                self.hold_ttl_secs = secs;
            }
        }

        if let Ok(pad) = std::env::var("GEMTAG_BARCODE_PAD") {
            if let Ok(p) = pad.parse::<usize>() {
                self.barcode_pad = p;
            }
        }

        if let Ok(retries) = std::env::var("GEMTAG_MAX_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                self.retry.max_retries = n;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "gemtag", "gemtag")
            .map(|dirs| dirs.config_dir().join("allocator.toml"))
    }

    /// Hold lifetime as a chrono duration.
    pub fn hold_ttl(&self) -> ConfigResult<chrono::Duration> {
        i64::try_from(self.hold_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "hold_ttl_secs {} is out of range",
                    self.hold_ttl_secs
                ))
            })
    }

    /// When holds taken at `now` lapse.
    pub fn hold_expiry(&self, now: DateTime<Utc>) -> ConfigResult<DateTime<Utc>> {
        now.checked_add_signed(self.hold_ttl()?).ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "hold_ttl_secs {} overflows the hold expiry",
                self.hold_ttl_secs
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_scan_policy_parsing() {
        assert_eq!("strict".parse::<GapScanPolicy>().unwrap(), GapScanPolicy::Strict);
        assert_eq!(
            "assume_no_gaps".parse::<GapScanPolicy>().unwrap(),
            GapScanPolicy::AssumeNoGaps
        );
        assert_eq!(
            "DEGRADE".parse::<GapScanPolicy>().unwrap(),
            GapScanPolicy::AssumeNoGaps
        );
        assert!("sometimes".parse::<GapScanPolicy>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = AllocatorConfig::default();
        assert_eq!(config.gap_scan_policy, GapScanPolicy::Strict);
        assert_eq!(config.max_batch_size, 1000);
        assert_eq!(config.barcode_pad, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AllocatorConfig::default();

        config.max_batch_size = 0;
        assert!(config.validate().is_err());

        config.max_batch_size = 10;
        config.barcode_pad = 0;
        assert!(config.validate().is_err());

        config.barcode_pad = 6;
        config.retry.initial_backoff_ms = 5000;
        assert!(config.validate().is_err());

        config.retry.initial_backoff_ms = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_hold_ttl_rejected() {
        let mut config = AllocatorConfig::default();

        config.hold_ttl_secs = MAX_HOLD_TTL_SECS;
        assert!(config.validate().is_ok());

        config.hold_ttl_secs = MAX_HOLD_TTL_SECS + 1;
        assert!(config.validate().is_err());

        config.hold_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());
        assert!(config.hold_ttl().is_err());
        assert!(config.hold_expiry(Utc::now()).is_err());
    }

    #[test]
    fn test_hold_expiry() {
        let config = AllocatorConfig {
            hold_ttl_secs: 60,
            ..AllocatorConfig::default()
        };
        let now = Utc::now();
        assert_eq!(
            config.hold_expiry(now).unwrap(),
            now + chrono::Duration::seconds(60)
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AllocatorConfig = toml::from_str(
            r#"
            gap_scan_policy = "assume_no_gaps"

            [retry]
            max_retries = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.gap_scan_policy, GapScanPolicy::AssumeNoGaps);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.max_backoff_ms, 1000);
        assert_eq!(config.hold_ttl_secs, 900);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allocator.toml");

        let mut config = AllocatorConfig::default();
        config.hold_ttl_secs = 60;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[retry]"));

        let loaded: AllocatorConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.hold_ttl_secs, 60);
    }
}
