//! Application configuration for Harvest.
//!
//! User config lives at `~/.harvest/harvest.toml`.
//! CLI flags override config file values, which override defaults.
//! The API key itself is never stored in the file, only the name of the
//! environment variable that carries it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};
use crate::types::SchemaVersion;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "harvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".harvest";

// ---------------------------------------------------------------------------
// Config structs (matching harvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Chat-completion endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for persisted run artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Record schema version.
    #[serde(default)]
    pub schema: SchemaVersion,

    /// Subject used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            schema: SchemaVersion::default(),
            subject: None,
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat-completion endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier sent in the request body.
    #[serde(default = "default_model")]
    pub model: String,

    /// `max_tokens` sent in the request body.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Parse the configured endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| {
            HarvestError::config(format!("invalid llm.endpoint '{}': {e}", self.endpoint))
        })
    }
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_max_output_tokens() -> u32 {
    1500
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// An API key. `Debug` never prints the secret.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Credentials handed to the gateway at construction.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: ApiKey,
}

impl Credentials {
    /// Read the API key from the environment variable named in the config.
    ///
    /// This is the only place the credential is read; callers do it once at
    /// startup and pass the value down.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        let var_name = &config.llm.api_key_env;
        match std::env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => Ok(Self {
                api_key: ApiKey::new(val.trim()),
            }),
            _ => Err(HarvestError::config(format!(
                "API key not found. Set the {var_name} environment variable \
                 (a .env file in the working directory is also read)."
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.harvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.harvest/harvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        HarvestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default config file to `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| HarvestError::Serialization(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| HarvestError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    init_config_at(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(!toml_str.contains("subject"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.llm.max_output_tokens, 1500);
        assert_eq!(parsed.llm.model, "gpt-3.5-turbo");
        assert_eq!(parsed.defaults.schema, SchemaVersion::V1);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
subject = "Japan"
schema = "v2"

[llm]
model = "gpt-4o-mini"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.subject.as_deref(), Some("Japan"));
        assert_eq!(config.defaults.schema, SchemaVersion::V2);
        assert_eq!(config.defaults.output_dir, "output");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 60);
    }

    #[test]
    fn endpoint_must_be_a_url() {
        let mut config = AppConfig::default();
        assert!(config.llm.endpoint_url().is_ok());

        config.llm.endpoint = "not a url".into();
        let err = config.llm.endpoint_url().unwrap_err();
        assert!(err.to_string().contains("invalid llm.endpoint"));
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "HARVEST_TEST_NONEXISTENT_KEY_12345".into();
        let result = Credentials::from_env(&config);
        let err = result.unwrap_err();
        assert!(matches!(err, HarvestError::Config { .. }));
        assert!(err.to_string().contains("HARVEST_TEST_NONEXISTENT_KEY_12345"));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret");
        assert_eq!(format!("{key:?}"), "ApiKey(****)");
        assert_eq!(key.expose(), "sk-secret");
    }

    #[test]
    fn init_config_at_writes_loadable_file() {
        let dir = std::env::temp_dir().join(format!("harvest-config-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("harvest.toml");

        init_config_at(&path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.llm.api_key_env, "OPENAI_API_KEY");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
