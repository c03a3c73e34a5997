//! File-based configuration of the host.
//!
//! ```toml
//! [model]
//! base_url = "http://localhost:8000/v1"
//! model = "Qwen/Qwen2.5-7B-Instruct"
//! temperature = 0.7
//!
//! [agent]
//! max_iterations = 10
//!
//! [[mcp_servers]]
//! name = "schedules"
//! url = "http://localhost:8001/mcp"
//! ```
//!
//! Every field is optional, an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use react_agent_core::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOOL_TIMEOUT};
use react_agent_mcp::McpServerConfig;
use react_agent_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use serde::Deserialize;
use thiserror::Error;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file is not valid TOML or has unexpected fields.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The whole configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The OpenAI-compatible model endpoint.
    pub model: ModelConfig,
    /// Loop settings.
    pub agent: AgentConfig,
    /// Remote tool servers.
    pub mcp_servers: Vec<McpServerEntry>,
}

/// The `[model]` section.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Base URL of the API, e.g. `http://localhost:8000/v1`.
    pub base_url: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key, omitted for servers without authentication.
    pub api_key: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling probability.
    pub top_p: Option<f32>,
    /// Generation length cap.
    pub max_tokens: Option<u32>,
    /// Deadline of one model call in seconds.
    pub timeout_secs: Option<u64>,
}

/// The `[agent]` section.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Maximum number of model calls per task.
    pub max_iterations: usize,
    /// Deadline of one tool call in seconds, `0` disables it.
    pub tool_timeout_secs: u64,
    /// Replaces the default persona of the system prompt.
    pub instructions: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT.as_secs(),
            instructions: None,
        }
    }
}

impl AgentConfig {
    /// Returns the tool deadline, `None` if disabled.
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0)
            .then(|| Duration::from_secs(self.tool_timeout_secs))
    }
}

/// One `[[mcp_servers]]` entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McpServerEntry {
    /// Name used in logs.
    pub name: String,
    /// Streamable HTTP endpoint.
    pub url: String,
}

impl Config {
    /// Reads the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses the configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overrides model settings with `OPENAI_API_KEY`, `OPENAI_BASE_URL`
    /// and `OPENAI_MODEL`, when set.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let model = &mut self.model;
        for (key, field) in [
            ("OPENAI_API_KEY", &mut model.api_key),
            ("OPENAI_BASE_URL", &mut model.base_url),
            ("OPENAI_MODEL", &mut model.model),
        ] {
            if let Some(value) = var(key).filter(|value| !value.is_empty()) {
                debug!("{key} overrides the configuration file");
                *field = Some(value);
            }
        }
    }

    /// Builds the model provider configuration.
    pub fn openai_config(&self) -> OpenAIConfig {
        let model = &self.model;
        let mut builder = match &model.api_key {
            Some(api_key) => OpenAIConfigBuilder::with_api_key(api_key),
            None => OpenAIConfigBuilder::without_api_key(),
        };
        if let Some(base_url) = &model.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(name) = &model.model {
            builder = builder.with_model(name);
        }
        if let Some(temperature) = model.temperature {
            builder = builder.with_temperature(temperature);
        }
        if let Some(top_p) = model.top_p {
            builder = builder.with_top_p(top_p);
        }
        if let Some(max_tokens) = model.max_tokens {
            builder = builder.with_max_tokens(max_tokens);
        }
        if let Some(timeout_secs) = model.timeout_secs {
            builder = builder.with_timeout(Duration::from_secs(timeout_secs));
        }
        builder.build()
    }

    /// Builds the MCP server configurations.
    pub fn mcp_server_configs(&self) -> Vec<McpServerConfig> {
        self.mcp_servers
            .iter()
            .map(|entry| McpServerConfig::new(&entry.name, &entry.url))
            .collect()
    }
}
