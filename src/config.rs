//! Application-level configuration loading, including round timings and the puzzle API.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HEART_QUIZ_CONFIG_PATH";
/// Heart puzzle API returning `<image-url>,<solution>`.
const DEFAULT_ITEM_SOURCE_URL: &str = "https://marcconrad.com/uob/heart/api.php?out=csv&base64=no";

/// Timing knobs of a round, consumed by the session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Time budget of one round.
    pub session_duration: Duration,
    /// Period of the countdown driver.
    pub tick_interval: Duration,
    /// Wait before retrying a failed fetch.
    pub retry_backoff: Duration,
    /// Wait between a graded answer and the next item request.
    pub follow_up_delay: Duration,
    /// Upper bound for a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            session_duration: Duration::from_secs(30),
            tick_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_secs(1),
            follow_up_delay: Duration::from_millis(800),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    timings: SessionTimings,
    item_source_url: String,
    sound_muted: bool,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        duration_secs = app_config.timings.session_duration.as_secs(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Round timings.
    pub fn timings(&self) -> SessionTimings {
        self.timings
    }

    /// URL of the puzzle API.
    pub fn item_source_url(&self) -> &str {
        &self.item_source_url
    }

    /// Whether sound cues start muted.
    pub fn sound_muted(&self) -> bool {
        self.sound_muted
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timings: SessionTimings::default(),
            item_source_url: DEFAULT_ITEM_SOURCE_URL.to_owned(),
            sound_muted: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file; missing keys keep their default.
struct RawConfig {
    session_duration_secs: Option<u64>,
    tick_interval_ms: Option<u64>,
    retry_backoff_ms: Option<u64>,
    follow_up_delay_ms: Option<u64>,
    fetch_timeout_ms: Option<u64>,
    item_source_url: Option<String>,
    sound_muted: Option<bool>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = SessionTimings::default();
        let timings = SessionTimings {
            session_duration: value
                .session_duration_secs
                .map_or(defaults.session_duration, Duration::from_secs),
            tick_interval: value
                .tick_interval_ms
                .filter(|ms| *ms > 0)
                .map_or(defaults.tick_interval, Duration::from_millis),
            retry_backoff: value
                .retry_backoff_ms
                .map_or(defaults.retry_backoff, Duration::from_millis),
            follow_up_delay: value
                .follow_up_delay_ms
                .map_or(defaults.follow_up_delay, Duration::from_millis),
            fetch_timeout: value
                .fetch_timeout_ms
                .map_or(defaults.fetch_timeout, Duration::from_millis),
        };

        Self {
            timings,
            item_source_url: value
                .item_source_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ITEM_SOURCE_URL.to_owned()),
            sound_muted: value.sound_muted.unwrap_or(false),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.timings(), SessionTimings::default());
        assert_eq!(config.item_source_url(), DEFAULT_ITEM_SOURCE_URL);
        assert!(!config.sound_muted());
    }

    #[test]
    fn overrides_are_applied() {
        let raw: RawConfig = serde_json::from_str(
            r#"{"session_duration_secs": 5, "follow_up_delay_ms": 250, "tick_interval_ms": 0, "sound_muted": true}"#,
        )
        .unwrap();
        let config: AppConfig = raw.into();
        let timings = config.timings();
        assert_eq!(timings.session_duration, Duration::from_secs(5));
        assert_eq!(timings.follow_up_delay, Duration::from_millis(250));
        // zero would make the countdown interval panic
        assert_eq!(timings.tick_interval, Duration::from_millis(100));
        assert!(config.sound_muted());
    }
}
