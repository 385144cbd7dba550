//! Session driver - the tool-calling loop
//!
//! One run of the driver:
//! - sends the transcript to the model service
//! - collects assistant text into the session output
//! - executes every requested tool in order and appends the results
//! - repeats until a turn requests no tools

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::metrics::SessionMetrics;
use super::types::{SessionConfig, SessionOutcome, SessionState};
use crate::error::{Error, Result};
use crate::message::{ContentBlock, Message, Role, ToolResult, ToolResultStatus, ToolUse, Transcript};
use crate::provider::ModelService;
use crate::tools::spec::convert_catalog;
use crate::tools::{ToolProvider, ToolSpecification};

/// Drives sessions against one model service and one tool provider.
///
/// The driver holds no per-session state, so a single instance can run any
/// number of sessions concurrently; each run owns its transcript.
pub struct SessionDriver {
    model: Arc<dyn ModelService>,
    tools: Arc<dyn ToolProvider>,
    config: SessionConfig,
}

impl SessionDriver {
    pub fn new(model: Arc<dyn ModelService>, tools: Arc<dyn ToolProvider>, config: SessionConfig) -> Self {
        Self { model, tools, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fetch the tool catalog and convert it for the model service
    pub async fn prepare_tools(&self) -> Result<Vec<ToolSpecification>> {
        let catalog = self.tools.list_tools().await.map_err(|e| match e {
            Error::ToolDiscovery(_) => e,
            other => Error::ToolDiscovery(other.to_string()),
        })?;

        if catalog.is_empty() {
            warn!("Tool provider offered no tools; the model can only answer from text");
        }
        for tool in &catalog {
            info!(tool_name = %tool.name, "Available tool");
        }

        Ok(convert_catalog(&catalog, self.config.spec_options))
    }

    /// Run one session: discover tools, then loop until the model is done
    pub async fn run(&self, query: &str) -> Result<SessionOutcome> {
        let specs = self.prepare_tools().await?;
        self.run_with_tools(query, &specs).await
    }

    /// Run one session with an already converted catalog
    pub async fn run_with_tools(&self, query: &str, specs: &[ToolSpecification]) -> Result<SessionOutcome> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("Query must not be empty".to_string()));
        }

        info!(model = %self.model.model(), tools = specs.len(), "Starting session");
        debug!(query = %query, "Session query");

        let mut transcript: Transcript = vec![Message::user_text(query)];
        let mut output: Vec<String> = Vec::new();
        let mut metrics = SessionMetrics::default();
        let mut turns = 0usize;

        loop {
            if let Some(max) = self.config.max_turns
                && turns >= max
            {
                warn!(max_turns = max, "Session hit the turn limit");
                return Err(Error::MaxTurnsExceeded(max));
            }
            turns += 1;
            debug!(turn = turns, state = %SessionState::AwaitingModelTurn);

            let started = Instant::now();
            let turn = self
                .model
                .generate_turn(&transcript, specs, &self.config.system_prompt)
                .await?;
            metrics.record_generation(&turn.usage, started.elapsed());

            let message = turn.message;
            if message.role != Role::Assistant {
                return Err(Error::Model(format!(
                    "Model service returned a {:?} turn instead of an assistant turn",
                    message.role
                )));
            }
            debug!(turn = turns, stop_reason = ?turn.stop_reason, blocks = message.content.len(), "Model turn");

            let mut pending: Vec<ToolUse> = Vec::new();
            for block in &message.content {
                match block {
                    ContentBlock::Text(text) => output.push(text.clone()),
                    ContentBlock::ToolUse(tool_use) => {
                        if self.config.announce_tool_calls {
                            output.push(format!(
                                "Obtaining information from {} with args {}",
                                tool_use.name,
                                serde_json::Value::Object(tool_use.arguments.clone())
                            ));
                        }
                        pending.push(tool_use.clone());
                    }
                    ContentBlock::ToolResult(_) => {
                        warn!(turn = turns, "Ignoring tool result block in an assistant turn");
                    }
                }
            }
            transcript.push(message);

            if pending.is_empty() {
                debug!(turn = turns, state = %SessionState::Done);
                break;
            }

            debug!(turn = turns, state = %SessionState::ExecutingTools, count = pending.len());
            for tool_use in pending {
                let result = self.execute_tool(&tool_use, &mut metrics).await;
                transcript.push(Message::tool_result(result));
            }
        }

        info!(
            turns,
            total_tokens = metrics.total_tokens(),
            tools_used = ?metrics.tools_used(),
            "Session complete"
        );

        Ok(SessionOutcome {
            output: output.join("\n"),
            transcript,
            metrics,
            turns,
        })
    }

    /// Execute one tool call; failures become error results, never errors
    async fn execute_tool(&self, tool_use: &ToolUse, metrics: &mut SessionMetrics) -> ToolResult {
        info!(tool_name = %tool_use.name, tool_use_id = %tool_use.id, "Executing tool");
        debug!(tool_name = %tool_use.name, arguments = ?tool_use.arguments, "Tool arguments");

        let started = Instant::now();
        let result = match self.tools.call_tool(&tool_use.name, &tool_use.arguments).await {
            Ok(out) => {
                let mut result = ToolResult::success(&tool_use.id, out.content);
                if out.is_error {
                    warn!(tool_name = %tool_use.name, "Tool reported an error");
                    result.status = ToolResultStatus::Error;
                }
                result
            }
            Err(e) => {
                warn!(tool_name = %tool_use.name, error = %e, "Tool call failed");
                ToolResult::error(&tool_use.id, format!("Tool '{}' failed: {}", tool_use.name, e))
            }
        };
        metrics.record_tool_call(&tool_use.name, result.is_error(), started.elapsed());

        debug!(tool_name = %tool_use.name, status = ?result.status, "Tool result");
        result
    }
}
