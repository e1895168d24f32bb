// ABOUTME: Configuration module for the revelation slide preprocessor
// ABOUTME: Provides application settings and environment variable handling

use std::env;

pub const DEFAULT_MEDIA_BASE: &str = "../_media/";
pub const DEFAULT_STYLE_PATH: &str = "/css/";
const MEDIA_VERSION_VAR: &str = "REVELATION_MEDIA_VERSION";

/// Application-wide settings threaded into preprocessing and handout rendering
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Prefix prepended to resolved media filenames
    pub media_base_path: String,
    /// Directory theme stylesheets are served from
    pub style_path: String,
    /// License number substituted for the `:ccli:` setting macro
    pub ccli: Option<String>,
    /// Explicit high-bitrate preference; `None` defers to the environment
    pub prefer_high_bitrate: Option<bool>,
    pub fetch_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_base_path: DEFAULT_MEDIA_BASE.to_string(),
            style_path: DEFAULT_STYLE_PATH.to_string(),
            ccli: None,
            prefer_high_bitrate: None,
            fetch_timeout_ms: 10000, // 10 seconds
        }
    }
}

impl AppConfig {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let media_base_path =
            env::var("REVELATION_MEDIA_BASE").unwrap_or_else(|_| DEFAULT_MEDIA_BASE.to_string());
        let style_path =
            env::var("REVELATION_STYLE_PATH").unwrap_or_else(|_| DEFAULT_STYLE_PATH.to_string());
        let ccli = env::var("REVELATION_CCLI")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let prefer_high_bitrate = env::var(MEDIA_VERSION_VAR)
            .ok()
            .map(|s| s.eq_ignore_ascii_case("high"));
        let fetch_timeout_ms = env::var("REVELATION_FETCH_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10000);

        Self {
            media_base_path,
            style_path,
            ccli,
            prefer_high_bitrate,
            fetch_timeout_ms,
        }
    }

    /// Resolve the high-bitrate preference, reading the environment only
    /// when neither the caller nor this config decided it
    pub fn prefers_high_bitrate(&self, explicit: Option<bool>) -> bool {
        explicit
            .or(self.prefer_high_bitrate)
            .unwrap_or_else(media_version_prefers_high)
    }
}

/// Default media preference: `REVELATION_MEDIA_VERSION=high`
pub fn media_version_prefers_high() -> bool {
    env::var(MEDIA_VERSION_VAR)
        .map(|v| v.eq_ignore_ascii_case("high"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_preference_wins_over_config() {
        let config = AppConfig {
            prefer_high_bitrate: Some(true),
            ..AppConfig::default()
        };
        assert!(!config.prefers_high_bitrate(Some(false)));
        assert!(config.prefers_high_bitrate(None));
    }

    #[test]
    fn defaults_point_at_shared_media_folder() {
        let config = AppConfig::new();
        assert_eq!(config.media_base_path, "../_media/");
        assert_eq!(config.style_path, "/css/");
        assert!(config.ccli.is_none());
    }
}
