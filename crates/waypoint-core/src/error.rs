//! Error types for Waypoint Core

use thiserror::Error;

/// Result type alias using Waypoint Error
pub type Result<T> = std::result::Result<T, Error>;

/// Waypoint error types
#[derive(Error, Debug)]
pub enum Error {
    /// The model service failed or returned something unusable
    #[error("Model error: {0}")]
    Model(String),

    /// The tool catalog could not be fetched at session start
    #[error("Tool discovery failed: {0}")]
    ToolDiscovery(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session exceeded the limit of {0} model turns")]
    MaxTurnsExceeded(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tool-specific errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}
