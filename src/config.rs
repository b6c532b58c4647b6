//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (e.g. `--config <path>`)
//! 2. `~/.vegvisir/config.toml` (user)
//! 3. `/etc/vegvisir/config.toml` (system)
//!
//! [`Config::load_or_default`] uses the built-in defaults when none exist.
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.vegvisir/secrets.toml` (user, must be 0600)
//! 2. `/etc/vegvisir/secrets.toml` (system, must be 0600)
//!
//! A minimal config only names the local inference command:
//!
//! ```toml
//! [local]
//! command = "llama-cli"
//! args = ["-m", "/opt/models/qa.gguf", "-n", "{max_tokens}", "-f", "/dev/stdin"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::backends::openai::DEFAULT_BASE_URL;
use crate::backends::remote::{DEFAULT_REMOTE_TIMEOUT, DEFAULT_TEMPERATURE};
use crate::backends::{CommandModel, OpenAiClient};
use crate::cache::CacheConfig;
use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::gateway::{Router, RouterBuilder};
use crate::routing::SelectorConfig;
use crate::{Result, RouterError};

/// Router configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: Option<LocalConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Replacement model catalog. Default: the built-in three-tier catalog.
    #[serde(default)]
    pub models: Option<Vec<ModelDescriptor>>,
    /// Text of the degraded response returned when every backend fails.
    #[serde(default)]
    pub fallback_message: Option<String>,
}

/// Remote API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// OpenAI-compatible base URL (default: https://api.openai.com).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature (default: 0.7).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT.as_secs()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Local inference command.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    /// Executable to run; the prompt is written to its stdin.
    pub command: String,
    /// Arguments; `{max_tokens}` is replaced with the token budget.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// User then system config locations.
fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".vegvisir").join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/vegvisir/config.toml"));
    paths
}

/// Resolve the config file path: the explicit path if given (it must
/// exist), else the first existing candidate.
fn find_config_path(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(RouterError::Configuration(format!(
            "Config file not found: {path:?}"
        )));
    }
    Ok(candidates.iter().find(|p| p.exists()).cloned())
}

/// Environment variable consulted when no secrets file provides a key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.vegvisir/config.toml`
    /// 3. `/etc/vegvisir/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match find_config_path(explicit_path, &search_paths())? {
            Some(path) => Self::load_from(&path),
            None => Err(RouterError::Configuration(
                "No config file found. Create ~/.vegvisir/config.toml or /etc/vegvisir/config.toml"
                    .to_string(),
            )),
        }
    }

    /// Like [`load()`](Self::load), but falls back to [`Config::default()`]
    /// when no file is found in the standard locations. An explicit path
    /// must still exist.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        Self::load_or_default_in(explicit_path, &search_paths())
    }

    fn load_or_default_in(explicit_path: Option<&Path>, candidates: &[PathBuf]) -> Result<Self> {
        match find_config_path(explicit_path, candidates)? {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RouterError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            RouterError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// The model catalog this config describes.
    pub fn catalog(&self) -> Result<ModelCatalog> {
        match &self.models {
            Some(models) => ModelCatalog::new(models.clone()),
            None => Ok(ModelCatalog::default()),
        }
    }

    /// A [`RouterBuilder`] populated from this config.
    ///
    /// Remote backends are enabled only when `secrets` yields an OpenAI key.
    /// The caller may further customise the builder (e.g. metrics sink)
    /// before building.
    pub fn router_builder(&self, secrets: &Secrets) -> Result<RouterBuilder> {
        let mut builder = Router::builder()
            .catalog(self.catalog()?)
            .selector_config(self.selector)
            .cache_config(self.cache.clone())
            .remote_timeout(Duration::from_secs(self.remote.timeout_secs))
            .temperature(self.remote.temperature);

        if let Some(local) = &self.local {
            let model = CommandModel::new(&local.command).args(local.args.iter().cloned());
            builder = builder.local_model(Arc::new(model));
        }

        if let Some(api_key) = secrets.openai_api_key() {
            builder = builder.remote_client(Arc::new(OpenAiClient::with_base_url(
                api_key,
                &self.remote.base_url,
            )));
        }

        if let Some(message) = &self.fallback_message {
            builder = builder.fallback_message(message);
        }

        Ok(builder)
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.vegvisir/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/vegvisir/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        // Try user secrets first
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".vegvisir").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        // Try system secrets
        let system_secrets = PathBuf::from("/etc/vegvisir/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load secrets from a specific file, enforcing permissions.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            RouterError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            RouterError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            RouterError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(RouterError::Configuration(format!(
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

    /// OpenAI API key, falling back to `OPENAI_API_KEY`. Blank keys count
    /// as absent.
    pub fn openai_api_key(&self) -> Option<String> {
        self.openai
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(OPENAI_API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}
