//! Centralized configuration for Tidemark.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Tidemark components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct TidemarkConfig {
    pub archive: ArchiveConfig,
    pub store: StoreConfig,
    pub source: SourceConfig,
}

/// Torrent archive configuration.
///
/// Unset values fall back to defaults when the archive is built. Values the
/// caller sets explicitly, zero included, are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Attempts made when metainfo is unavailable upstream
    pub metainfo_retries: Option<u32>,
    /// Pause between metainfo download attempts
    pub metainfo_retry_delay: Option<Duration>,
}

impl ArchiveConfig {
    pub const DEFAULT_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

    /// Returns a copy with unset values replaced by defaults.
    pub fn with_defaults(&self) -> Self {
        Self {
            metainfo_retries: Some(self.retries()),
            metainfo_retry_delay: Some(self.retry_delay()),
        }
    }

    /// Returns the configured retry count or the default.
    pub fn retries(&self) -> u32 {
        self.metainfo_retries.unwrap_or(Self::DEFAULT_RETRIES)
    }

    /// Returns the configured retry delay or the default.
    pub fn retry_delay(&self) -> Duration {
        self.metainfo_retry_delay
            .unwrap_or(Self::DEFAULT_RETRY_DELAY)
    }
}

/// Tiered storage directories.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Tier holding files still being downloaded
    pub download_dir: PathBuf,
    /// Tier holding completed files
    pub cache_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./data/download"),
            cache_dir: PathBuf::from("./data/cache"),
        }
    }
}

/// Remote metainfo source configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the tracker serving metainfo
    pub tracker_url: String,
    /// HTTP request timeout per attempt
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tracker_url: "http://localhost:8351".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: "tidemark/0.1.0",
        }
    }
}

impl TidemarkConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(retries) = std::env::var("TIDEMARK_METAINFO_RETRIES") {
            if let Ok(count) = retries.parse::<u32>() {
                config.archive.metainfo_retries = Some(count);
            }
        }

        if let Ok(delay) = std::env::var("TIDEMARK_METAINFO_RETRY_DELAY_MS") {
            if let Ok(millis) = delay.parse::<u64>() {
                config.archive.metainfo_retry_delay = Some(Duration::from_millis(millis));
            }
        }

        if let Ok(dir) = std::env::var("TIDEMARK_DOWNLOAD_DIR") {
            config.store.download_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("TIDEMARK_CACHE_DIR") {
            config.store.cache_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("TIDEMARK_TRACKER_URL") {
            config.source.tracker_url = url;
        }

        if let Ok(timeout) = std::env::var("TIDEMARK_SOURCE_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.source.timeout = Duration::from_secs(seconds);
            }
        }

        config
    }
}
