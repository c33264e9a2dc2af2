//! Configuration loading, validation, and management for flowsmith.
//!
//! Loads configuration from `~/.flowsmith/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prompt used by chat runs that name no agent, and by the seeded banking agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful banking assistant that specializes in creating bank accounts. \n\n\
When users provide their information (first name, last name, and ID number), you should help them create a bank account. \n\n\
If they provide information like \"John Smith 123456789\", recognize this as a bank account creation request.\n\n\
Be friendly and helpful, and guide users through the account creation process.";

/// The root configuration structure.
///
/// Maps directly to `~/.flowsmith/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature for flow config generation
    #[serde(default = "default_config_temperature")]
    pub config_temperature: f32,

    /// Temperature for the agent loop's reasoning stage
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Where flows and agents are persisted
    #[serde(default)]
    pub storage: StorageConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "google/gemini-flash-1.5".into()
}
fn default_config_temperature() -> f32 {
    0.3
}
fn default_chat_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("config_temperature", &self.config_temperature)
            .field("chat_temperature", &self.chat_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("storage", &self.storage)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on reasoning calls per chat run
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// System prompt for chat runs without an agent id
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
}

fn default_max_tool_iterations() -> u32 {
    10
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            default_system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for persisted data. Relative flow/agent dirs resolve against it.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_flows_dir")]
    pub flows_dir: PathBuf,

    #[serde(default = "default_agents_dir")]
    pub agents_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    AppConfig::config_dir().join("data")
}
fn default_flows_dir() -> PathBuf {
    PathBuf::from("flows")
}
fn default_agents_dir() -> PathBuf {
    PathBuf::from("agents")
}

impl StorageConfig {
    /// Storage rooted at `data_dir` with the default sub-directories.
    pub fn rooted_at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            flows_dir: default_flows_dir(),
            agents_dir: default_agents_dir(),
        }
    }

    pub fn flows_path(&self) -> PathBuf {
        self.data_dir.join(&self.flows_dir)
    }

    pub fn agents_path(&self) -> PathBuf {
        self.data_dir.join(&self.agents_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::rooted_at(default_data_dir())
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.flowsmith/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `FLOWSMITH_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `GOOGLE_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["FLOWSMITH_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY", "GOOGLE_API_KEY"]
                .into_iter()
                .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()));
        }

        if let Some(provider) = lookup("FLOWSMITH_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("FLOWSMITH_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".flowsmith")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("config_temperature", self.config_temperature),
            ("chat_temperature", self.chat_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{field} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available for the default provider, either
    /// top-level (config or environment) or under `[providers.<name>]`.
    pub fn has_api_key(&self) -> bool {
        let provider_key = self
            .providers
            .get(&self.default_provider)
            .and_then(|p| p.api_key.as_deref());
        self.api_key
            .as_deref()
            .or(provider_key)
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            config_temperature: default_config_temperature(),
            chat_temperature: default_chat_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            storage: StorageConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
