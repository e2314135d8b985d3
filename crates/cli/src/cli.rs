use clap::Parser;

/// Conversational SQL console backed by an MCP tool server.
///
/// Opens a terminal REPL that sends your questions to an
/// OpenAI-compatible model and lets the model inspect and query the
/// database through the tools the MCP server exposes.
#[derive(Parser, Debug)]
#[command(name = "sqlpilot", about = "Conversational SQL console backed by an MCP tool server")]
pub struct CliArgs {
    /// Model name override (default: OPENAI_MODEL or the config file)
    #[arg(long)]
    pub model: Option<String>,

    /// API key (overrides OPENAI_API_KEY and the config file)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Path to config file (default: ~/.config/sqlpilot/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// MCP server launch command, e.g. "python sql_mcp_server.py"
    #[arg(long)]
    pub server: Option<String>,

    /// System prompt override
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Maximum tool-calling rounds per user turn
    #[arg(long)]
    pub max_rounds: Option<usize>,

    /// Maximum conversation messages kept before trimming
    #[arg(long)]
    pub max_history: Option<usize>,
}
