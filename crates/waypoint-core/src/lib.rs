//! Waypoint Core - tool-calling sessions between a model and a tool provider
//!
//! This crate provides:
//! - The conversation data model (messages, content blocks, tool results)
//! - The session driver that loops model turns and tool calls
//! - Model services (Bedrock Converse, genai-backed providers)
//! - Tool providers (in-process registry, MCP servers)
//! - Configuration and built-in prompts

pub mod config;
pub mod error;
pub mod message;
pub mod prompts;
pub mod provider;
pub mod session;
pub mod tools;

pub use config::{Config, ConfigManager, McpConfig, ModelConfig, ServerConfig, SessionSettings};
pub use error::{Error, Result, ToolError};
pub use message::{ContentBlock, Message, Role, ToolResult, ToolResultStatus, ToolUse, Transcript};
pub use prompts::PromptPreset;
pub use provider::{create_model_service, ModelService, ModelTurn, TokenUsage};
pub use session::{MetricsSummary, SessionConfig, SessionDriver, SessionMetrics, SessionOutcome};
pub use tools::{
    Calculator, Tool, ToolCallOutput, ToolDescriptor, ToolOutput, ToolProvider, ToolRegistry,
    ToolSpecOptions, ToolSpecification,
};

#[cfg(feature = "mcp")]
pub use tools::mcp::McpToolProvider;
