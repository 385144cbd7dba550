//! LLM request/response logging utilities
//!
//! Set the `LLM_LOG_FILE` environment variable to append one JSON line per
//! model interaction to that file.
//!
//! Example: `LLM_LOG_FILE=/tmp/llm.log waypoint ask "..."`

use serde_json::json;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use super::ModelTurn;
use crate::message::Message;
use crate::tools::ToolSpecification;

pub const LLM_LOG_FILE_ENV: &str = "LLM_LOG_FILE";

/// What goes into one log entry
#[derive(Default)]
pub struct LogConfig<'a> {
    pub model: &'a str,
    /// Provider name (e.g., "bedrock", "genai")
    pub provider: Option<&'a str>,
    pub system_prompt: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: Option<&'a [ToolSpecification]>,
    pub result: Option<&'a ModelTurn>,
    pub error: Option<&'a str>,
}

fn entry(config: &LogConfig<'_>) -> serde_json::Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model": config.model,
        "provider": config.provider,
        "request": {
            "system_prompt": config.system_prompt,
            "messages": config.messages,
            "message_count": config.messages.len(),
            "tools": config.tools.map(|t| t.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>()),
            "tool_count": config.tools.map(|t| t.len()).unwrap_or(0),
        },
        "response": config.result.map(|turn| json!({
            "message": turn.message,
            "stop_reason": turn.stop_reason,
            "usage": turn.usage,
        })),
        "error": config.error,
    })
}

/// Log an interaction if `LLM_LOG_FILE` is set
pub fn log_llm_interaction(config: LogConfig<'_>) {
    if let Ok(path) = std::env::var(LLM_LOG_FILE_ENV) {
        log_llm_interaction_to(Path::new(&path), config);
    }
}

/// Append an interaction to `path` as a single JSON line
pub fn log_llm_interaction_to(path: &Path, config: LogConfig<'_>) {
    let line = match serde_json::to_string(&entry(&config)) {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to serialize LLM log entry: {}", e);
            return;
        }
    };

    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!("Failed to write to LLM log file: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to open LLM log file {}: {}", path.display(), e);
        }
    }

    debug!("Logged LLM interaction to {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.log");
        let messages = vec![Message::user_text("hi")];
        let turn = ModelTurn::new(Message::assistant_text("hello")).with_stop_reason("end_turn");

        log_llm_interaction_to(
            &path,
            LogConfig {
                model: "m",
                provider: Some("bedrock"),
                messages: &messages,
                result: Some(&turn),
                ..Default::default()
            },
        );
        log_llm_interaction_to(
            &path,
            LogConfig {
                model: "m",
                messages: &messages,
                error: Some("boom"),
                ..Default::default()
            },
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["response"]["stop_reason"], "end_turn");
        assert_eq!(lines[0]["request"]["message_count"], 1);
        assert_eq!(lines[1]["error"], "boom");
        assert!(lines[1]["response"].is_null());
    }
}
