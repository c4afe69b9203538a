//! Client configuration: defaults, environment overlay and the default
//! database location.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const APP_QUALIFIER: &str = "net";
pub const APP_ORG: &str = "zerotrust";
pub const APP_NAME: &str = "zt-chat";

pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// TTL choices offered by the composer, in seconds.
pub const TTL_CHOICES: [u32; 3] = [30, 60, 300];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub db_path: PathBuf,
    pub message_poll_ms: u64,
    pub presence_poll_ms: u64,
    pub typing_poll_ms: u64,
    /// Inactivity after the last keystroke before `typing=false` goes out.
    pub typing_idle_ms: u64,
    /// How often the idle window is checked.
    pub typing_check_ms: u64,
    pub request_timeout_ms: u64,
    pub default_ttl_secs: u32,
    /// Notification broadcast buffer. Slow subscribers lag, sync does not.
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            db_path: default_db_path(),
            message_poll_ms: 2000,
            presence_poll_ms: 5000,
            typing_poll_ms: 1500,
            typing_idle_ms: 2000,
            typing_check_ms: 250,
            request_timeout_ms: 10_000,
            default_ttl_secs: 60,
            event_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `ZT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(url) = lookup("ZT_API_URL").filter(|s| !s.trim().is_empty()) {
            cfg.api_url = url;
        }
        if let Some(path) = lookup("ZT_DB_PATH").filter(|s| !s.trim().is_empty()) {
            cfg.db_path = PathBuf::from(path);
        }
        cfg.message_poll_ms = millis(&lookup, "ZT_MESSAGE_POLL_MS", cfg.message_poll_ms);
        cfg.presence_poll_ms = millis(&lookup, "ZT_PRESENCE_POLL_MS", cfg.presence_poll_ms);
        cfg.typing_poll_ms = millis(&lookup, "ZT_TYPING_POLL_MS", cfg.typing_poll_ms);
        cfg.request_timeout_ms = millis(&lookup, "ZT_REQUEST_TIMEOUT_MS", cfg.request_timeout_ms);
        cfg
    }

    pub fn message_poll_interval(&self) -> Duration {
        period(self.message_poll_ms)
    }

    pub fn presence_poll_interval(&self) -> Duration {
        period(self.presence_poll_ms)
    }

    pub fn typing_poll_interval(&self) -> Duration {
        period(self.typing_poll_ms)
    }

    pub fn typing_idle(&self) -> Duration {
        period(self.typing_idle_ms)
    }

    pub fn typing_check_interval(&self) -> Duration {
        period(self.typing_check_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Timer periods are at least 1 ms; `tokio::time::interval` rejects zero.
fn period(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

/// Non-numeric or zero values keep the default.
fn millis(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => v,
        _ => {
            warn!(target: "zt_client", event = "config_invalid", var = name, value = %raw, "using default");
            default
        }
    }
}

pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).map(|d| d.data_dir().to_path_buf())
}

pub fn default_db_path() -> PathBuf {
    data_dir()
        .map(|d| d.join("zt-chat.db"))
        .unwrap_or_else(|| PathBuf::from("zt-chat.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_polling_schedule() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.message_poll_interval(), Duration::from_secs(2));
        assert_eq!(cfg.presence_poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.typing_poll_interval(), Duration::from_millis(1500));
        assert_eq!(cfg.typing_idle(), Duration::from_secs(2));
        assert_eq!(cfg.default_ttl_secs, 60);
    }

    #[test]
    fn env_overlay_applies_valid_values() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[
            ("ZT_API_URL", "https://chat.example"),
            ("ZT_DB_PATH", "/tmp/zt.db"),
            ("ZT_MESSAGE_POLL_MS", "750"),
        ]));
        assert_eq!(cfg.api_url, "https://chat.example");
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/zt.db"));
        assert_eq!(cfg.message_poll_ms, 750);
        assert_eq!(cfg.presence_poll_ms, 5000);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let cfg = ClientConfig::from_lookup(lookup_from(&[
            ("ZT_TYPING_POLL_MS", "soon"),
            ("ZT_REQUEST_TIMEOUT_MS", "0"),
        ]));
        assert_eq!(cfg.typing_poll_ms, 1500);
        assert_eq!(cfg.request_timeout_ms, 10_000);
    }

    #[test]
    fn zero_periods_are_clamped_to_one_millisecond() {
        let cfg = ClientConfig {
            message_poll_ms: 0,
            typing_idle_ms: 0,
            typing_check_ms: 0,
            ..ClientConfig::default()
        };
        assert_eq!(cfg.message_poll_interval(), Duration::from_millis(1));
        assert_eq!(cfg.typing_idle(), Duration::from_millis(1));
        assert_eq!(cfg.typing_check_interval(), Duration::from_millis(1));
    }
}
