//! Configuration loading for `rating-probe`.
//!
//! Configuration is loaded from a TOML file with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.config/recipe-ratings/config.toml` (user)
//! 3. Built-in defaults
//!
//! ```toml
//! [backend]
//! base_url = "https://recipes.example.com/api"
//! request_timeout_secs = 30
//!
//! [cache]
//! fetch_timeout_secs = 10
//! failure_policy = "fail-open"   # or "leave-unknown"
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 250
//! max_delay_ms = 2000
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::policy::{FailOpen, FailurePolicy, LeaveUnknown};
use crate::{RatingCache, RatingsError, Result, RetryConfig};

/// Probe configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    /// Retries are off unless this section is present.
    #[serde(default)]
    pub retry: Option<RetrySettings>,
}

/// Recipe backend connection.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend root (default: http://localhost:3000).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Client-level request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            bearer_token: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Cache behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Per-fetch timeout in seconds (default: 10).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub failure_policy: PolicyName,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            failure_policy: PolicyName::default(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    10
}

/// Failure policy selectable from config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyName {
    #[default]
    FailOpen,
    LeaveUnknown,
}

impl PolicyName {
    pub fn policy(self) -> Arc<dyn FailurePolicy> {
        match self {
            PolicyName::FailOpen => Arc::new(FailOpen),
            PolicyName::LeaveUnknown => Arc::new(LeaveUnknown),
        }
    }
}

/// Retry tuning, mirrored onto [`RetryConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    250
}

fn default_max_delay() -> u64 {
    2_000
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig::new()
            .max_attempts(settings.max_attempts)
            .initial_delay(Duration::from_millis(settings.initial_delay_ms))
            .max_delay(Duration::from_millis(settings.max_delay_ms))
    }
}

impl ProbeConfig {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the user config is used
    /// when present and defaults otherwise.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RatingsError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            RatingsError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(RatingsError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        let user_config = dirs::config_dir()
            .map(|dir| dir.join("recipe-ratings").join("config.toml"))
            .filter(|path| path.exists());
        Ok(user_config)
    }

    /// Build a cache from this configuration.
    pub fn build_cache(&self) -> Result<RatingCache> {
        let mut builder = RatingCache::builder()
            .base_url(&self.backend.base_url)
            .request_timeout(Duration::from_secs(self.backend.request_timeout_secs))
            .fetch_timeout(Duration::from_secs(self.cache.fetch_timeout_secs))
            .failure_policy(self.cache.failure_policy.policy());

        if let Some(token) = &self.backend.bearer_token {
            builder = builder.bearer_token(token);
        }
        if let Some(retry) = &self.retry {
            builder = builder.retry(retry.into());
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ProbeConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend.base_url, "http://localhost:3000");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.cache.fetch_timeout_secs, 10);
        assert_eq!(config.cache.failure_policy, PolicyName::FailOpen);
        assert!(config.retry.is_none());
    }

    #[test]
    fn full_file_parses() {
        let config: ProbeConfig = toml::from_str(
            r#"
            [backend]
            base_url = "https://recipes.example.com/api"
            bearer_token = "t0ken"

            [cache]
            fetch_timeout_secs = 3
            failure_policy = "leave-unknown"

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "https://recipes.example.com/api");
        assert_eq!(config.backend.bearer_token.as_deref(), Some("t0ken"));
        assert_eq!(config.cache.fetch_timeout_secs, 3);
        assert_eq!(config.cache.failure_policy, PolicyName::LeaveUnknown);

        let retry: RetryConfig = config.retry.as_ref().unwrap().into();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn unknown_policy_rejected() {
        let result: std::result::Result<ProbeConfig, _> =
            toml::from_str("[cache]\nfailure_policy = \"panic\"");
        assert!(result.is_err());
    }

    #[test]
    fn load_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backend]\nbase_url = \"http://10.0.0.2:8080\"\n").unwrap();

        let config = ProbeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.backend.base_url, "http://10.0.0.2:8080");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let result = ProbeConfig::load(Some(Path::new("/nonexistent/recipe-ratings.toml")));
        assert!(matches!(result, Err(RatingsError::Configuration(_))));
    }

    #[test]
    fn build_cache_from_defaults() {
        let cache = ProbeConfig::default().build_cache().unwrap();
        assert_eq!(cache.revision(), 0);
    }

    #[test]
    fn policy_names_map_to_policies() {
        assert_eq!(PolicyName::FailOpen.policy().name(), "fail-open");
        assert_eq!(PolicyName::LeaveUnknown.policy().name(), "leave-unknown");
    }
}
