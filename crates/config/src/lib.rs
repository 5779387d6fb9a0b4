//! Configuration loading, validation, and management for taskweave.
//!
//! Loads configuration from `~/.taskweave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use taskweave_core::goal::Goal;
use taskweave_core::prompt::EnvironmentRole;

/// The root configuration structure.
///
/// Maps directly to `~/.taskweave/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Decision loop and prompt settings shared by every agent
    #[serde(default)]
    pub agent: AgentSettings,

    /// Named agents available to the CLI and to delegation
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentDefinition>,
}

/// Settings for the OpenAI-compatible provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL; derived from `name` for well-known providers when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: None,
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Loop and prompt-builder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Iteration ceiling applied to every run unless an agent overrides it
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Characters of each capability description sent to the model
    #[serde(default = "default_description_budget")]
    pub description_budget: usize,

    /// Role used to replay capability results to the model
    #[serde(default)]
    pub environment_role: EnvironmentRole,

    /// Refuse delegation beyond this depth. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delegation_depth: Option<usize>,
}

fn default_max_iterations() -> usize {
    50
}
fn default_description_budget() -> usize {
    1024
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            description_budget: default_description_budget(),
            environment_role: EnvironmentRole::default(),
            max_delegation_depth: None,
        }
    }
}

/// A named agent: its goals and the capability tags it is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Catalog tags selecting this agent's capabilities
    #[serde(default)]
    pub tags: Vec<String>,

    /// Capability names; with `tags` set, a capability must match both
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Opt in to the designated terminal capability
    #[serde(default = "default_true")]
    pub include_terminal: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,

    #[serde(default)]
    pub goals: Vec<Goal>,
}

fn default_true() -> bool {
    true
}

fn default_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition {
            name: "Coordinator".into(),
            description: "Breaks a task into parts and delegates them to other agents".into(),
            tags: vec!["agents".into()],
            tools: Vec::new(),
            include_terminal: true,
            max_iterations: None,
            goals: vec![
                Goal::new(
                    1,
                    "Delegate",
                    "Use list_agents to see who is available, then call_agent to hand each \
                     part of the task to the most suitable agent.",
                ),
                Goal::new(
                    2,
                    "Report",
                    "Combine the agents' results and call terminate with the final answer.",
                ),
            ],
        },
        AgentDefinition {
            name: "Assistant".into(),
            description: "Answers directly, without delegating".into(),
            tags: vec!["debug".into()],
            tools: Vec::new(),
            include_terminal: true,
            max_iterations: None,
            goals: vec![Goal::new(
                1,
                "Answer",
                "Answer the task as well as you can and call terminate with the answer.",
            )],
        },
    ]
}

impl AppConfig {
    /// Load configuration from the default path (~/.taskweave/config.toml).
    ///
    /// Environment variable overrides:
    /// - `TASKWEAVE_API_KEY`, then `OPENAI_API_KEY` (only when the file has no key)
    /// - `TASKWEAVE_MODEL`
    /// - `TASKWEAVE_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("TASKWEAVE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(model) = lookup("TASKWEAVE_MODEL") {
            self.provider.model = model;
        }
        if let Some(url) = lookup("TASKWEAVE_API_URL") {
            self.provider.api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskweave")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be > 0".into(),
            ));
        }
        if self.agent.description_budget == 0 {
            return Err(ConfigError::ValidationError(
                "agent.description_budget must be > 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for def in &self.agents {
            if def.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "agent names must not be empty".into(),
                ));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' is defined more than once",
                    def.name
                )));
            }
            if def.max_iterations == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}': max_iterations must be > 0",
                    def.name
                )));
            }
        }

        Ok(())
    }

    pub fn agent_definition(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Iteration ceiling for `def`, falling back to the shared setting.
    pub fn max_iterations_for(&self, def: &AgentDefinition) -> usize {
        def.max_iterations.unwrap_or(self.agent.max_iterations)
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            agent: AgentSettings::default(),
            agents: default_agents(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 50);
        assert_eq!(config.agent.description_budget, 1024);
        assert_eq!(config.agent.environment_role, EnvironmentRole::Assistant);
        assert!(config.agent.max_delegation_depth.is_none());
        assert!(config.agent_definition("Coordinator").is_some());
        assert!(config.agent_definition("Assistant").is_some());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.agents.len(), 2);
        assert_eq!(parsed.agents[0].goals, config.agents[0].goals);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_agent_names_rejected() {
        let mut config = AppConfig::default();
        let copy = config.agents[0].clone();
        config.agents.push(copy);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Coordinator"));
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.provider.name, "openai");
    }

    #[test]
    fn load_from_file_with_agents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[provider]
name = "ollama"
model = "llama3"

[agent]
max_iterations = 8
environment_role = "user"
max_delegation_depth = 3

[[agents]]
name = "Researcher"
description = "Finds facts"
tags = ["research", "debug"]
tools = ["echo"]

[[agents.goals]]
name = "Research"
description = "Find the answer"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.provider.name, "ollama");
        assert_eq!(config.provider.temperature, 0.7);
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.agent.environment_role, EnvironmentRole::User);
        assert_eq!(config.agent.max_delegation_depth, Some(3));
        assert_eq!(config.agents.len(), 1);
        let researcher = &config.agents[0];
        assert!(researcher.include_terminal);
        assert_eq!(researcher.tools, vec!["echo"]);
        assert_eq!(researcher.goals[0].priority, 0);
        assert_eq!(config.max_iterations_for(researcher), 8);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[provider\nname = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_fill_missing_key() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-openai"),
            ("TASKWEAVE_MODEL", "gpt-4o-mini"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert!(config.provider.api_url.is_none());
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-file".into());
        config.apply_env_overrides(|k| (k == "TASKWEAVE_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-secret-value".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("Coordinator"));
    }
}
