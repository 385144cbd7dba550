//! Session wiring shared by the CLI subcommands

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use tracing::info;
use waypoint_core::config::BEDROCK_PROVIDER;
use waypoint_core::tools::mcp::connect;
use waypoint_core::{
    create_model_service, Calculator, Config, ModelService, PromptPreset, SessionConfig, SessionDriver,
    SessionOutcome, ToolProvider, ToolRegistry,
};

/// Command-line overrides applied on top of the loaded config
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub mcp_url: Option<String>,
    pub max_turns: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(provider) = &self.provider {
            // A bedrock model id means nothing to other providers
            if self.model.is_none() && !provider.eq_ignore_ascii_case(BEDROCK_PROVIDER) {
                config.model.model_id.clear();
            }
            config.model.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            config.model.model_id = model.clone();
        }
        if let Some(url) = &self.mcp_url {
            config.mcp.url = url.clone();
            config.mcp.command = None;
        }
        if let Some(max_turns) = self.max_turns {
            config.session.max_turns = max_turns;
        }
    }
}

/// Everything a subcommand needs to start sessions
pub struct Agent {
    pub config: Config,
    pub model: Arc<dyn ModelService>,
    pub session: SessionConfig,
}

impl Agent {
    pub fn new(config: Config, preset: PromptPreset) -> Result<Self> {
        let model = create_model_service(&config.model).context("creating model service")?;
        let session = SessionConfig::from_settings(&config.session, preset);
        info!(provider = model.name(), model = model.model(), preset = %preset, "Agent ready");
        Ok(Self { config, model, session })
    }

    pub async fn connect_tools(&self) -> Result<Arc<dyn ToolProvider>> {
        let target = self.config.mcp.command.as_deref().unwrap_or(&self.config.mcp.url);
        connect(&self.config.mcp)
            .await
            .with_context(|| format!("connecting to MCP server at {}", target))
    }

    pub fn local_tools() -> Arc<dyn ToolProvider> {
        Arc::new(ToolRegistry::new().with_tool(Arc::new(Calculator::new())))
    }

    pub fn driver(&self, tools: Arc<dyn ToolProvider>) -> SessionDriver {
        SessionDriver::new(self.model.clone(), tools, self.session.clone())
    }
}

pub fn print_outcome(outcome: &SessionOutcome) {
    let summary = outcome.metrics.summary();

    println!("{}", outcome.output);
    println!();
    println!("{} {}", style("Total tokens:").bold(), summary.total_tokens);
    println!("{} {:.2} seconds", style("Execution time:").bold(), summary.execution_time);
    println!("{} {:?}", style("Tools used:").bold(), summary.tools_used);
}
