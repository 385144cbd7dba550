//! Configuration management for Waypoint
//!
//! Handles loading and saving `config.toml`, and resolving credentials
//! from explicit settings first and the environment second.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const BEDROCK_PROVIDER: &str = "bedrock";
pub const BEDROCK_API_KEY_ENV: &str = "AWS_BEARER_TOKEN_BEDROCK";
pub const DEFAULT_REGION: &str = "us-east-1";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Model service selection and sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `bedrock` or a genai provider id (`openai`, `anthropic`, `ollama`, ...)
    pub provider: String,
    pub model_id: String,
    /// Bedrock region; falls back to `AWS_REGION`, then `AWS_DEFAULT_REGION`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable to read the API key from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Override for the service endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: BEDROCK_PROVIDER.to_string(),
            model_id: "us.amazon.nova-pro-v1:0".to_string(),
            region: None,
            api_key: None,
            api_key_env: None,
            endpoint_url: None,
            max_tokens: 1000,
            temperature: 0.0,
            top_p: 1.0,
        }
    }
}

impl ModelConfig {
    /// API key from config, then the configured env var, then `default_env`
    pub fn resolve_api_key(
        &self,
        default_env: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        if let Some(key) = &self.api_key
            && !key.is_empty()
        {
            return Some(key.clone());
        }

        self.api_key_env
            .as_deref()
            .or(default_env)
            .and_then(|name| env(name))
            .filter(|key| !key.is_empty())
    }

    /// Region from config, then `AWS_REGION`, then `AWS_DEFAULT_REGION`
    pub fn resolve_region(&self, env: impl Fn(&str) -> Option<String>) -> String {
        self.region
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| env("AWS_REGION"))
            .or_else(|| env("AWS_DEFAULT_REGION"))
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}

/// Where the tool-serving MCP server lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    /// SSE endpoint, used when no `command` is set
    pub url: String,
    /// Launch a stdio server instead of connecting over SSE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Name reported in the initialize handshake
    pub client_name: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/sse".to_string(),
            command: None,
            args: Vec::new(),
            client_name: "waypoint".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Model turns allowed per session; 0 disables the limit
    pub max_turns: usize,
    /// Overrides the built-in prompt preset when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub backfill_descriptions: bool,
    /// Add "Obtaining information from ..." lines to session output
    pub announce_tool_calls: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_turns: 100,
            system_prompt: None,
            backfill_descriptions: true,
            announce_tool_calls: false,
        }
    }
}

impl SessionSettings {
    pub fn turn_limit(&self) -> Option<usize> {
        (self.max_turns > 0).then_some(self.max_turns)
    }
}

/// HTTP surface bind address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path; a missing file yields defaults
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("waypoint").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
