//! Configuration loading for sibyld.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.sibyl/config.toml` (user)
//! 3. `/etc/sibyl/config.toml` (system)
//!
//! Every setting has a default, so a missing config file yields a usable
//! configuration. The API key is loaded separately with a mandatory
//! permission check:
//! 1. `~/.sibyl/secrets.toml` (user, must be 0600)
//! 2. `/etc/sibyl/secrets.toml` (system, must be 0600)
//! 3. `SIBYL_API_KEY` environment variable

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache;
use crate::{Result, SibylError};

/// Environment variable consulted when no secrets file carries a key.
const API_KEY_ENV_VAR: &str = "SIBYL_API_KEY";

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:9777).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9777".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Requests admitted per identity per window (default: 10).
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    /// Window length in seconds (default: 60).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Cadence of the expired-window sweep in seconds (default: 60).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_requests_per_window() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Seconds a finished reading is served from cache (default: 600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Bound on stored entries (default: 500).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_max_entries() -> usize {
    cache::DEFAULT_MAX_ENTRIES
}

/// Upstream provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// Override the completions endpoint base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Override the completions model name.
    #[serde(default)]
    pub model: Option<String>,
}

/// Secrets (the provider API key).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub provider: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.sibyl/config.toml`
    /// 3. `/etc/sibyl/config.toml`
    ///
    /// Returns the defaults when no file exists anywhere.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::resolve_config_path(explicit_path)? else {
            return Ok(Config::default());
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            SibylError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SibylError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path. `Ok(None)` means no file anywhere and
    /// no explicit request for one.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(SibylError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sibyl").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/sibyl/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.sibyl/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/sibyl/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment instead).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".sibyl").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/sibyl/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SibylError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            SibylError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            SibylError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(SibylError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Get the provider API key, falling back to `SIBYL_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.provider
            .as_ref()
            .map(|secret| secret.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.address, "127.0.0.1:9777");
        assert_eq!(config.limits.requests_per_window, 10);
        assert_eq!(config.limits.window_secs, 60);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.cache.max_entries, 500);
        assert!(config.provider.base_url.is_none());
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [server]
            address = "0.0.0.0:9777"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.address, "0.0.0.0:9777");
        // Defaults preserved
        assert_eq!(config.limits.requests_per_window, 10);
        assert_eq!(config.cache.max_entries, 500);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "127.0.0.1:9700"

            [limits]
            requests_per_window = 30
            window_secs = 120
            sweep_interval_secs = 15

            [cache]
            ttl_secs = 300
            max_entries = 64

            [provider]
            base_url = "https://llm.internal.example"
            model = "gpt-4o"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9700");
        assert_eq!(config.limits.requests_per_window, 30);
        assert_eq!(config.limits.window_secs, 120);
        assert_eq!(config.limits.sweep_interval_secs, 15);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.cache.max_entries, 64);
        assert_eq!(
            config.provider.base_url.as_deref(),
            Some("https://llm.internal.example")
        );
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn load_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[limits]\nrequests_per_window = 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.limits.requests_per_window, 3);
        assert_eq!(config.server.address, "127.0.0.1:9777");
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [provider]
            api_key = "sk-test-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.provider.as_ref().unwrap().api_key, "sk-test-key");
    }

    #[test]
    fn api_key_prefers_secrets_file() {
        let secrets = Secrets {
            provider: Some(ApiKeySecret {
                api_key: "from-file".to_string(),
            }),
        };
        assert_eq!(secrets.api_key(), Some("from-file".to_string()));
    }
}
