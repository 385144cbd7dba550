//! Waypoint CLI - tool-calling sessions from the terminal and over HTTP
//!
//! Each query runs one session: the model is offered the tools of the
//! configured MCP server (or the built-in calculator for `calc`) and the
//! loop continues until the model answers without asking for a tool.

mod agent;
mod web;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rustyline::error::ReadlineError;
use tracing::error;

use agent::{Agent, Overrides, print_outcome};
use waypoint_core::{Config, ConfigManager, PromptPreset, ToolProvider};

const DEFAULT_CALC_QUERY: &str = "Add 245 and 25645";

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tool-calling sessions over MCP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/waypoint/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Model provider (bedrock, anthropic, openai, ollama, ...)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Model id (defaults to the provider's default)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// MCP server SSE endpoint
    #[arg(long, global = true)]
    mcp_url: Option<String>,

    /// Model turns allowed per session (0 = unlimited)
    #[arg(long, global = true)]
    max_turns: Option<usize>,

    /// Built-in system prompt (default, calculator, weather, travel-guide)
    #[arg(long, global = true)]
    prompt: Option<PromptPreset>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one query with the MCP server's tools
    Ask {
        /// The query
        query: String,
    },

    /// Interactive loop; type 'quit' to exit
    Chat,

    /// Run a session against the built-in calculator tool
    Calc {
        /// The query
        query: Option<String>,
    },

    /// Serve POST /ask and GET /status
    Serve {
        /// Bind host (overrides [server] host)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Warn level by default keeps logs out of the answers; RUST_LOG overrides
    let default_filter = if cli.verbose {
        "info,waypoint_core=debug,waypoint_mcp=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .context("loading configuration")?;
    let config_path = config_manager.config_path().to_path_buf();

    let mut config = config_manager.into_config();
    Overrides {
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        mcp_url: cli.mcp_url.clone(),
        max_turns: cli.max_turns,
    }
    .apply(&mut config);

    match cli.command {
        Commands::Ask { query } => {
            let agent = Agent::new(config, cli.prompt.unwrap_or_default())?;
            let tools = agent.connect_tools().await?;
            let outcome = agent.driver(tools).run(&query).await?;
            print_outcome(&outcome);
        }
        Commands::Chat => {
            let agent = Agent::new(config, cli.prompt.unwrap_or_default())?;
            let tools = agent.connect_tools().await?;
            run_chat(&agent, tools).await?;
        }
        Commands::Calc { query } => {
            let agent = Agent::new(config, cli.prompt.unwrap_or(PromptPreset::Calculator))?;
            let query = query.as_deref().unwrap_or(DEFAULT_CALC_QUERY);
            let outcome = agent.driver(Agent::local_tools()).run(query).await?;
            print_outcome(&outcome);
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let bind_address = config.server.bind_address();
            let mcp = config.mcp.clone();
            let agent = Agent::new(config, cli.prompt.unwrap_or_default())?;

            let state = Arc::new(web::AppState::new(
                agent.model.clone(),
                Arc::new(web::McpToolSource::new(mcp)),
                agent.session.clone(),
            ));
            println!("Initializing agent...");
            web::serve(state, &bind_address).await?;
        }
        Commands::Config => show_config(&config_path, &config)?,
    }

    Ok(())
}

/// Prompt for queries until 'quit' or end of input; a failed query is
/// reported and the loop continues
async fn run_chat(agent: &Agent, tools: Arc<dyn ToolProvider>) -> Result<()> {
    let driver = agent.driver(tools);
    let specs = driver.prepare_tools().await?;
    let mut editor = rustyline::DefaultEditor::new()?;

    println!(
        "{} {} tools available. Type 'quit' to exit.",
        style("Connected.").bold().green(),
        specs.len()
    );

    loop {
        let line = match editor.readline("\n> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") {
            break;
        }
        let _ = editor.add_history_entry(query);

        match driver.run_with_tools(query, &specs).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => {
                error!("Query failed: {}", e);
                println!("{}", style(format!("Error: {}", e)).red());
            }
        }
    }

    Ok(())
}

fn show_config(path: &std::path::Path, config: &Config) -> Result<()> {
    println!("{}", style("Configuration:").bold());
    println!();
    println!("  Config file: {}", style(path.display()).green());
    println!();
    println!("{}", toml::to_string_pretty(config).context("rendering configuration")?);
    Ok(())
}
