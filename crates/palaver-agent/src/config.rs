//! Session configuration.
//!
//! Settings come from three layers, each overriding the last:
//!
//! 1. An optional TOML file (`palaver.toml` in the working directory unless
//!    a path is given).
//! 2. `PALAVER_*` environment variables.
//! 3. Command-line flags, applied by the binary.
//!
//! API keys are only ever read from the environment.

use std::path::Path;

use serde::Deserialize;

use crate::error::{AgentError, Result};
use crate::llm::{LlmClientConfig, LlmProvider};
use crate::llm::client::DEFAULT_MAX_TOKENS;
use crate::runtime::{AgentConfig, DEFAULT_MAX_TOOL_ROUNDS, ResponseMode};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "palaver.toml";

const DEFAULT_MODEL_ANTHROPIC: &str = "claude-sonnet-4-20250514";
const DEFAULT_MODEL_OPENAI: &str = "gpt-4o";

/// User-facing settings for a chat session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Wire protocol to speak.
    pub provider: LlmProvider,
    /// Model identifier; a per-provider default when unset.
    pub model: Option<String>,
    /// Override for the provider's API base URL.
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
    /// Tool rounds allowed per human input.  `0` removes the bound.
    pub max_tool_rounds: u32,
    /// Stream responses instead of waiting for the whole turn.
    pub stream: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            system_prompt: None,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            stream: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// With an explicit `path` the file must exist.  Without one,
    /// [`DEFAULT_CONFIG_FILE`] is used if present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        match std::fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_toml_str(&content).map_err(|e| AgentError::ConfigError {
                    reason: format!("{}: {e}", path.display()),
                })
            }
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AgentError::ConfigError {
                reason: format!("cannot read {}: {e}", path.display()),
            }),
        }
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AgentError::ConfigError {
            reason: e.to_string(),
        })
    }

    /// Apply `PALAVER_*` overrides using `lookup` to read variables.
    ///
    /// Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(provider) = get("PALAVER_PROVIDER") {
            self.provider = provider.parse()?;
        }
        if let Some(model) = get("PALAVER_MODEL") {
            self.model = Some(model);
        }
        if let Some(url) = get("PALAVER_API_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(rounds) = get("PALAVER_MAX_TOOL_ROUNDS") {
            self.max_tool_rounds = rounds.trim().parse().map_err(|_| AgentError::ConfigError {
                reason: format!("PALAVER_MAX_TOOL_ROUNDS must be a non-negative integer, got `{rounds}`"),
            })?;
        }
        Ok(())
    }

    /// The model to request, falling back to the provider default.
    pub fn model(&self) -> &str {
        match &self.model {
            Some(model) => model.as_str(),
            None => match self.provider {
                LlmProvider::Anthropic => DEFAULT_MODEL_ANTHROPIC,
                LlmProvider::OpenAI => DEFAULT_MODEL_OPENAI,
            },
        }
    }

    /// Response mode selected by [`Settings::stream`].
    pub fn mode(&self) -> ResponseMode {
        if self.stream {
            ResponseMode::Streaming
        } else {
            ResponseMode::Blocking
        }
    }

    /// Build the client configuration, reading the provider's API key with
    /// `lookup`.
    ///
    /// # Errors
    ///
    /// [`AgentError::MissingApiKey`] if the key variable is unset or empty.
    pub fn to_client_config(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<LlmClientConfig> {
        let key_env = self.provider.api_key_env();
        let api_key = lookup(key_env)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AgentError::MissingApiKey {
                provider: format!("{} (set {key_env})", self.provider),
            })?;

        let mut config = match self.provider {
            LlmProvider::Anthropic => LlmClientConfig::anthropic(api_key, self.model()),
            LlmProvider::OpenAI => LlmClientConfig::openai(api_key, self.model()),
        };
        if let Some(url) = &self.base_url {
            config.base_url = url.trim_end_matches('/').to_owned();
        }
        config.max_tokens = self.max_tokens;
        config.temperature = self.temperature;
        config.system_prompt = self.system_prompt.clone();

        Ok(config)
    }

    /// Build the session configuration.
    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model().to_owned(),
            mode: self.mode(),
            max_tool_rounds: (self.max_tool_rounds > 0).then_some(self.max_tool_rounds),
        }
    }
}

/// Read a non-empty environment variable, returning `None` if unset or empty.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
