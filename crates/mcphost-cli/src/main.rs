use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mcphost::agent::Agent;
use mcphost::config::{load_system_prompt, AgentConfig, McpConfig};
use mcphost::providers::factory::{
    get_provider, resolve_provider_config, ProviderSettings, DEFAULT_MODEL,
};
use mcphost::registry::{McpConnector, ToolRegistry};

mod commands;
mod prompt;
mod session;

use prompt::rustyline::RustylinePrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// MCP server config file (default: $HOME/.mcp.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file holding {"systemPrompt": "..."}
    #[arg(long)]
    system_prompt: Option<PathBuf>,

    /// Number of recent messages kept as context
    #[arg(long, default_value_t = 10)]
    message_window: usize,

    /// Model to use, as provider:model
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Log at debug level, with source locations
    #[arg(long)]
    debug: bool,

    /// Base URL for OpenAI
    #[arg(long)]
    openai_url: Option<String>,

    /// Base URL for Anthropic
    #[arg(long)]
    anthropic_url: Option<String>,

    /// OpenAI API key (can also be set via OPENAI_API_KEY environment variable)
    #[arg(long)]
    openai_api_key: Option<String>,

    /// Anthropic API key (can also be set via ANTHROPIC_API_KEY environment variable)
    #[arg(long)]
    anthropic_api_key: Option<String>,

    /// Google API key (can also be set via GOOGLE_API_KEY or GEMINI_API_KEY)
    #[arg(long)]
    google_api_key: Option<String>,

    /// Model/tool rounds allowed per prompt before giving up
    #[arg(long, default_value_t = 20, value_parser = parse_tool_rounds)]
    max_tool_rounds: usize,
}

fn parse_tool_rounds(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(rounds) => Ok(rounds),
        Err(e) => Err(e.to_string()),
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(debug)
        .with_line_number(debug)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let system_prompt =
        load_system_prompt(cli.system_prompt.as_deref()).context("Failed to load system prompt")?;

    let settings = ProviderSettings {
        model: cli.model.clone(),
        system_prompt,
        anthropic_api_key: cli.anthropic_api_key.clone(),
        anthropic_url: cli.anthropic_url.clone(),
        openai_api_key: cli.openai_api_key.clone(),
        openai_url: cli.openai_url.clone(),
        google_api_key: cli.google_api_key.clone(),
    };
    let provider_config = resolve_provider_config(&settings, |key| std::env::var(key).ok())
        .context("Failed to configure provider")?;
    let provider = get_provider(provider_config).context("Failed to create provider")?;
    info!(provider = provider.name(), model = provider.model(), "Model loaded");

    let config_path = match cli.config {
        Some(path) => path,
        None => McpConfig::default_path()?,
    };
    let mcp_config = McpConfig::load_or_create(&config_path)
        .with_context(|| format!("Failed to load MCP config from {}", config_path.display()))?;

    let agent_config = AgentConfig {
        message_window: cli.message_window,
        max_tool_rounds: cli.max_tool_rounds,
        ..AgentConfig::default()
    };
    let connector = McpConnector {
        request_timeout: agent_config.tool_timeout,
    };
    let registry = ToolRegistry::connect_all(&mcp_config, &connector, &agent_config)
        .await
        .context("Failed to start MCP servers")?;
    info!(
        servers = registry.server_names().count(),
        tools = registry.tools().len(),
        "MCP servers ready"
    );

    let agent = Agent::new(provider, registry, agent_config);
    let mut session = Session::new(agent, mcp_config, RustylinePrompt::new());
    session.start().await
}
