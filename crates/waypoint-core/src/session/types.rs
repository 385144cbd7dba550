//! Session configuration and results

use crate::config::SessionSettings;
use crate::message::Transcript;
use crate::prompts::PromptPreset;
use crate::tools::ToolSpecOptions;

use super::metrics::SessionMetrics;

/// Maximum number of model turns per session unless configured otherwise
pub const DEFAULT_MAX_TURNS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub system_prompt: String,
    /// `None` lets a session run until the model stops asking for tools
    pub max_turns: Option<usize>,
    pub spec_options: ToolSpecOptions,
    /// Report each tool call in the session output
    pub announce_tool_calls: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: PromptPreset::Default.text().to_string(),
            max_turns: Some(DEFAULT_MAX_TURNS),
            spec_options: ToolSpecOptions::default(),
            announce_tool_calls: false,
        }
    }
}

impl SessionConfig {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }

    /// Build from `[session]` settings; `preset` applies when no prompt is configured
    pub fn from_settings(settings: &SessionSettings, preset: PromptPreset) -> Self {
        Self {
            system_prompt: settings
                .system_prompt
                .clone()
                .unwrap_or_else(|| preset.text().to_string()),
            max_turns: settings.turn_limit(),
            spec_options: ToolSpecOptions {
                backfill_descriptions: settings.backfill_descriptions,
            },
            announce_tool_calls: settings.announce_tool_calls,
        }
    }

    pub fn with_max_turns(mut self, max_turns: Option<usize>) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_spec_options(mut self, options: ToolSpecOptions) -> Self {
        self.spec_options = options;
        self
    }

    pub fn with_announce_tool_calls(mut self, announce: bool) -> Self {
        self.announce_tool_calls = announce;
        self
    }
}

/// Where a session is in its request/response cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingModelTurn,
    ExecutingTools,
    Done,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SessionState::AwaitingModelTurn => "awaiting-model-turn",
            SessionState::ExecutingTools => "executing-tools",
            SessionState::Done => "done",
        })
    }
}

/// Everything a completed session produced
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Assistant text from every turn, newline-joined in emission order
    pub output: String,
    pub transcript: Transcript,
    pub metrics: SessionMetrics,
    /// Number of model turns generated
    pub turns: usize,
}
