mod cli;
mod config;
mod render;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use sqlpilot_llm::OpenAiProvider;
use sqlpilot_mcp::ToolGateway;
use sqlpilot_runtime::{to_function_specs, ChatLoop, Conversation};

use crate::cli::CliArgs;
use crate::config::CliConfig;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    // Environment first so .env can feed both RUST_LOG and the config.
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let mut terminal = Terminal::new();

    // Load config and resolve settings across flag/env/file layers
    let config = CliConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    let model = config.resolve_model(args.model.as_deref());
    let api_key = config.resolve_api_key(args.api_key.as_deref()).context(
        "OpenAI API key missing - set OPENAI_API_KEY in your .env or environment, \
         or api_key in the config file",
    )?;
    let max_history = config.resolve_max_history(args.max_history);
    let max_rounds = args.max_rounds.unwrap_or(config.max_rounds);
    let system_prompt = config.resolve_system_prompt(args.system_prompt.as_deref());
    let server_command = config
        .resolve_server_command(args.server.as_deref())
        .context("invalid MCP server command")?;
    let server_display = server_command.to_string();

    let provider = Arc::new(OpenAiProvider::new(
        api_key,
        model.clone(),
        config.openai_base_url.clone(),
    ));

    let mut gateway = ToolGateway::new(server_command);

    // Tool discovery is the one fatal gateway interaction; a server we
    // cannot list tools from leaves nothing to converse about.
    let descriptors = match gateway.discover_tools().await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            gateway.close().await.ok();
            return Err(e).context("could not discover tools from the MCP server");
        }
    };
    info!(
        tools = descriptors.len(),
        server = %server_display,
        "Connected to MCP server"
    );

    let functions = to_function_specs(&descriptors);
    let chat = ChatLoop::new(provider, functions).with_max_rounds(max_rounds);
    let mut conversation = Conversation::new(system_prompt, max_history);

    terminal.print_banner(&model, &server_display)?;

    // REPL loop
    loop {
        let input = tokio::select! {
            line = terminal.read_input() => match line? {
                Some(text) => text,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        if input.is_empty() {
            continue;
        }

        let outcome = tokio::select! {
            result = chat.run_turn(&mut conversation, &mut gateway, input) => result,
            _ = tokio::signal::ctrl_c() => break,
        };

        match outcome {
            Ok(outcome) => {
                for call in &outcome.trace {
                    terminal.print_executing(&call.name, &call.arguments)?;
                    let lines = render::render_result(&call.name, &call.payload);
                    terminal.print_trace(&lines, call.is_error())?;
                }
                terminal.print_assistant(&outcome.reply)?;
            }
            Err(e) => {
                error!(error = %e, "Turn failed");
                terminal.print_error(&e.to_string())?;
            }
        }
    }

    terminal.print_farewell()?;
    gateway.close().await.ok();

    Ok(())
}
