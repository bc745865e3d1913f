//! Client configuration.
//!
//! Loaded from `mirror_config.json` with support for environment variable overrides.

use std::{
    env, fmt, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::events::DEFAULT_EVENT_LOG_CAPACITY;
use crate::session::Credential;
use crate::transport::TransportSettings;

pub const BUILTIN_MIRROR_CONFIG: &str = include_str!("data/mirror_config.json");

pub const CONFIG_PATH_ENV: &str = "ARENA_MIRROR_CONFIG_PATH";
pub const ENDPOINT_ENV: &str = "ARENA_MIRROR_ENDPOINT";
pub const TOKEN_ENV: &str = "ARENA_MIRROR_TOKEN";

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub endpoint: String,
    pub credential: String,
    pub event_log_capacity: usize,
    pub reconnect_delay_ms: u64,
    pub render_interval_ms: u64,
    pub max_frame_len: usize,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:5000".to_string(),
            credential: String::new(),
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            reconnect_delay_ms: 2_000,
            render_interval_ms: 100,
            max_frame_len: arena_proto::MAX_FRAME_LEN,
        }
    }
}

impl fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("event_log_capacity", &self.event_log_capacity)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("render_interval_ms", &self.render_interval_ms)
            .field("max_frame_len", &self.max_frame_len)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read mirror config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse mirror config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl MirrorConfig {
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json_str(BUILTIN_MIRROR_CONFIG)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        MirrorConfig::from_json_str(&contents)
    }

    /// Applies `ARENA_MIRROR_ENDPOINT` and `ARENA_MIRROR_TOKEN` when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(env::var(ENDPOINT_ENV).ok(), env::var(TOKEN_ENV).ok());
    }

    fn apply_overrides(&mut self, endpoint: Option<String>, token: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|value| !value.trim().is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(token) = token {
            self.credential = token;
        }
    }

    pub fn credential(&self) -> Credential {
        Credential::new(self.credential.clone())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            endpoint: self.endpoint.clone(),
            reconnect_delay: self.reconnect_delay(),
            max_frame_len: self.max_frame_len.min(arena_proto::MAX_FRAME_LEN),
        }
    }
}

/// Load mirror configuration from `ARENA_MIRROR_CONFIG_PATH`, falling back to
/// the builtin defaults, then apply environment overrides.
pub fn load_mirror_config_from_env() -> (MirrorConfig, Option<PathBuf>) {
    let override_path = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
    let (mut config, path) = match override_path {
        Some(path) => match MirrorConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "arena_mirror::config",
                    path = %path.display(),
                    "mirror_config.loaded=file"
                );
                (config, Some(path))
            }
            Err(err) => {
                tracing::warn!(
                    target: "arena_mirror::config",
                    path = %path.display(),
                    error = %err,
                    "mirror_config.load_failed"
                );
                (load_builtin(), None)
            }
        },
        None => (load_builtin(), None),
    };
    config.apply_env_overrides();
    (config, path)
}

fn load_builtin() -> MirrorConfig {
    match MirrorConfig::builtin() {
        Ok(config) => {
            tracing::info!(target: "arena_mirror::config", "mirror_config.loaded=builtin");
            config
        }
        Err(err) => {
            tracing::warn!(
                target: "arena_mirror::config",
                error = %err,
                "mirror_config.builtin_invalid"
            );
            MirrorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let config = MirrorConfig::builtin().expect("builtin parses");
        assert_eq!(config.event_log_capacity, 20);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(2));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = MirrorConfig::from_json_str(r#"{"endpoint":"10.0.0.2:7000"}"#)
            .expect("partial config parses");
        assert_eq!(config.endpoint, "10.0.0.2:7000");
        assert_eq!(config.event_log_capacity, DEFAULT_EVENT_LOG_CAPACITY);
        assert_eq!(config.render_interval(), Duration::from_millis(100));
    }

    #[test]
    fn overrides_replace_endpoint_and_token() {
        let mut config = MirrorConfig::default();
        config.apply_overrides(Some("  ".to_string()), Some("abc".to_string()));
        assert_eq!(config.endpoint, "127.0.0.1:5000");
        assert_eq!(config.credential().as_str(), "abc");

        config.apply_overrides(Some("example:1".to_string()), None);
        assert_eq!(config.endpoint, "example:1");
        assert_eq!(config.credential().as_str(), "abc");
    }

    #[test]
    fn debug_output_hides_credential() {
        let config = MirrorConfig {
            credential: "hunter2".to_string(),
            ..MirrorConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = MirrorConfig::from_file(Path::new("/nonexistent/mirror.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
