use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use sqlpilot_mcp::ServerCommand;

/// System prompt used when neither the config file nor --system-prompt
/// provides one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an expert data assistant with access to a SQL database.

Available tools:
1. list_tables() - See all tables in the database
2. describe_table(table_name) - Examine table schema and columns
3. execute_sql(query) - Run any SQL query

Best practices:
- Always explore the database structure first if unsure about table names or columns
- Use describe_table before writing complex queries to understand the schema
- Write efficient queries with appropriate JOINs and WHERE clauses
- For analysis tasks, break down complex requirements into multiple queries
- Present results clearly with explanations of what the data shows

You can execute both read and write operations.";

/// CLI configuration loaded from TOML file.
///
/// Resolution order for each setting: command-line flag, then
/// environment variable, then this file, then the built-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Model used for chat completions
    #[serde(default = "default_model")]
    pub model: String,

    /// API key fallback used when OPENAI_API_KEY is not set
    #[serde(default)]
    pub api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[serde(default = "default_openai_url")]
    pub openai_base_url: String,

    /// Maximum conversation messages kept before trimming
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Maximum tool-calling rounds per user turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Command line that launches the MCP server, split on whitespace
    #[serde(default = "default_server_command")]
    pub server_command: String,

    /// System prompt override
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_max_history() -> usize {
    50
}

fn default_max_rounds() -> usize {
    10
}

fn default_server_command() -> String {
    "python sql_mcp_server.py".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            openai_base_url: default_openai_url(),
            max_history: default_max_history(),
            max_rounds: default_max_rounds(),
            server_command: default_server_command(),
            system_prompt: None,
        }
    }
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/sqlpilot/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("sqlpilot");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Writes a default config file (best effort) if none exists.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            let config = Self::default();
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let toml_str = toml::to_string_pretty(&config)
                .context("failed to serialize default config")?;
            std::fs::write(&config_path, toml_str).ok();
            Ok(config)
        }
    }

    /// Resolve the API key.
    /// Priority: cli_override > OPENAI_API_KEY > config file.
    pub fn resolve_api_key(&self, cli_override: Option<&str>) -> Option<String> {
        if let Some(key) = cli_override {
            return Some(key.to_string());
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.api_key.clone()
    }

    /// Resolve the model name.
    /// Priority: cli_override > OPENAI_MODEL > config file.
    pub fn resolve_model(&self, cli_override: Option<&str>) -> String {
        if let Some(model) = cli_override {
            return model.to_string();
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.is_empty() {
                return model;
            }
        }
        self.model.clone()
    }

    /// Resolve the conversation history bound.
    /// Priority: cli_override > MAX_CONVERSATION_HISTORY > config file.
    pub fn resolve_max_history(&self, cli_override: Option<usize>) -> usize {
        if let Some(limit) = cli_override {
            return limit;
        }
        if let Ok(raw) = std::env::var("MAX_CONVERSATION_HISTORY") {
            match raw.parse() {
                Ok(limit) => return limit,
                Err(_) => {
                    warn!(value = %raw, "Ignoring unparseable MAX_CONVERSATION_HISTORY")
                }
            }
        }
        self.max_history
    }

    /// Resolve the system prompt.
    /// Priority: cli_override > config file > built-in prompt.
    pub fn resolve_system_prompt(&self, cli_override: Option<&str>) -> String {
        if let Some(prompt) = cli_override {
            return prompt.to_string();
        }
        self.system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// Resolve the MCP server launch command.
    /// Priority: cli_override > config file.
    pub fn resolve_server_command(&self, cli_override: Option<&str>) -> Result<ServerCommand> {
        let raw = cli_override.unwrap_or(&self.server_command);
        let mut parts = raw.split_whitespace();
        let program = parts.next().context("server command is empty")?;
        Ok(ServerCommand::new(program).with_args(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_history, 50);
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.server_command, "python sql_mcp_server.py");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_resolve_model_cli_override() {
        let config = CliConfig::default();
        assert_eq!(config.resolve_model(Some("gpt-4o")), "gpt-4o");
    }

    #[test]
    fn test_resolve_api_key_cli_override() {
        let config = CliConfig::default();
        assert_eq!(
            config.resolve_api_key(Some("cli-key")),
            Some("cli-key".to_string())
        );
    }

    #[test]
    fn test_resolve_api_key_config_fallback() {
        // This test owns OPENAI_API_KEY; no other test touches it.
        std::env::remove_var("OPENAI_API_KEY");
        let mut config = CliConfig::default();
        assert_eq!(config.resolve_api_key(None), None);
        config.api_key = Some("sk-from-file".to_string());
        assert_eq!(
            config.resolve_api_key(None),
            Some("sk-from-file".to_string())
        );
    }

    #[test]
    fn test_resolve_max_history_env() {
        // This test owns MAX_CONVERSATION_HISTORY; no other test touches it.
        std::env::set_var("MAX_CONVERSATION_HISTORY", "12");
        let config = CliConfig::default();
        assert_eq!(config.resolve_max_history(None), 12);
        assert_eq!(config.resolve_max_history(Some(7)), 7);
        std::env::remove_var("MAX_CONVERSATION_HISTORY");
        assert_eq!(config.resolve_max_history(None), 50);
    }

    #[test]
    fn test_resolve_system_prompt_default() {
        let config = CliConfig::default();
        let prompt = config.resolve_system_prompt(None);
        assert!(prompt.contains("list_tables"));
        assert!(prompt.contains("execute_sql"));
        assert_eq!(
            config.resolve_system_prompt(Some("terse prompt")),
            "terse prompt"
        );
    }

    #[test]
    fn test_resolve_server_command_splits() {
        let config = CliConfig::default();
        let command = config
            .resolve_server_command(Some("python3 -u server.py"))
            .unwrap();
        assert_eq!(command.program, "python3");
        assert_eq!(command.args, vec!["-u", "server.py"]);
    }

    #[test]
    fn test_resolve_server_command_empty_rejected() {
        let mut config = CliConfig::default();
        config.server_command = "   ".to_string();
        assert!(config.resolve_server_command(None).is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"gpt-4o\"\nmax_rounds = 3\n").unwrap();

        let config = CliConfig::load(path.to_str()).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_rounds, 3);
        // Unspecified fields keep their defaults.
        assert_eq!(config.max_history, 50);
    }

    #[test]
    fn test_load_missing_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = CliConfig::load(path.to_str()).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(path.exists());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CliConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: CliConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.server_command, config.server_command);
    }
}
