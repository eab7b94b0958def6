use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use anyhow::{Result, Context};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Main configuration structure for task_suggest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat-completion provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Local task storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Process-wide API key, used when a request does not carry one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default model, used when a request does not name one
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[serde(default)]
    pub base_url: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Response length budget in tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the task blob; `~` is expanded
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

// Default value functions
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> u32 { 400 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8787 }
fn default_data_dir() -> String { "~/.local/share/task_suggest".to_string() }

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            api_key: None,
            model: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: default_data_dir(),
        }
    }
}

/// Returns the first candidate that is present and not blank.
pub fn coalesce<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    /// Load configuration from command line argument or default locations
    pub fn load(config_path: &Option<String>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::from_file(shellexpand::tilde(path).into_owned());
        }

        // Try loading from default locations
        let default_paths = vec![
            "task_suggest.toml",
            ".task_suggest.toml",
            "~/.config/task_suggest/config.toml",
        ];

        for path in default_paths {
            let expanded_path = shellexpand::tilde(path).into_owned();
            if Path::new(&expanded_path).exists() {
                match Self::from_file(&expanded_path) {
                    Ok(config) => return Ok(config),
                    Err(e) => log::warn!("Failed to load config from {}: {}", path, e),
                }
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Layer environment values over the file values (environment wins).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = &mut self.provider;
        provider.api_key = coalesce([lookup("OPENAI_API_KEY").as_deref(), provider.api_key.as_deref()]);
        provider.model = coalesce([lookup("OPENAI_MODEL").as_deref(), provider.model.as_deref()]);
        provider.base_url = coalesce([lookup("OPENAI_BASE_URL").as_deref(), provider.base_url.as_deref()]);

        if let Some(dir) = coalesce([lookup("TASK_SUGGEST_DATA_DIR").as_deref()]) {
            self.storage.data_dir = dir;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
    }

    /// Load from file, then layer the process environment on top.
    pub fn load_with_env(config_path: &Option<String>) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.data_dir).into_owned())
    }

    /// Default model after every configured layer has been consulted.
    pub fn default_model(&self) -> String {
        coalesce([self.provider.model.as_deref()]).unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Base URL with trailing slashes stripped.
    pub fn base_url(&self) -> String {
        let base = coalesce([self.provider.base_url.as_deref()])
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        base.trim_end_matches('/').to_string()
    }
}
