use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Tunable settings for a synchronized playback session.
///
/// Tolerances are configuration rather than constants: productions differ in
/// how much audible drift they accept and how chatty their heartbeat is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base HTTP(S) URL of the performance server.
    pub server_url: String,

    /// Fixed delay before each reconnect attempt.
    pub reconnect_backoff_ms: u64,

    /// Maximum allowed gap (seconds) between performance time and media
    /// position before a force-reseek. The gap must exceed this value;
    /// drift exactly at the tolerance does not reseek.
    pub sync_tolerance_secs: f64,

    /// Gap between consecutive time syncs (milliseconds) beyond which the
    /// client assumes it slept and re-resolves the active track.
    pub wake_check_interval_ms: i64,

    /// Directory holding the performance's media files.
    pub media_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            reconnect_backoff_ms: 1000,
            sync_tolerance_secs: 3.0,
            wake_check_interval_ms: 6000,
            media_dir: PathBuf::from("media"),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl SyncConfig {
    /// Load settings from a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// The websocket endpoint for the performance time feed, with the scheme
    /// chosen to match the server URL.
    pub fn ws_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", base)
        };
        format!("{}/ws/performanceTime", ws_base)
    }
}
