//! MCP tool provider
//!
//! Bridges an MCP server's tools to the session driver. The catalog comes
//! from `tools/list` and every call is forwarded as `tools/call`; a result
//! flagged `isError` becomes an error tool output rather than a failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use waypoint_mcp::{ClientInfo, McpClient, McpTool, SseTransport, StdioTransport, Transport};

use crate::config::McpConfig;
use crate::error::{Error, Result, ToolError};
use crate::tools::{ToolCallOutput, ToolDescriptor, ToolProvider};

/// A connected, initialized MCP client exposed as a [`ToolProvider`]
pub struct McpToolProvider<T: Transport> {
    client: McpClient<T>,
    server_name: String,
}

impl McpToolProvider<SseTransport> {
    /// Connect to an MCP server's SSE endpoint and initialize the session
    pub async fn connect_sse(url: &str, client_name: &str) -> Result<Self> {
        let transport = SseTransport::connect(url)
            .await
            .map_err(|e| Error::ToolDiscovery(format!("Failed to connect to {}: {}", url, e)))?;
        debug!(endpoint = %transport.endpoint(), "MCP messages endpoint");
        Self::from_transport(transport, client_name).await
    }
}

impl McpToolProvider<StdioTransport> {
    /// Spawn an MCP server subprocess and initialize the session
    pub async fn spawn(command: &str, args: &[String], client_name: &str) -> Result<Self> {
        let transport = StdioTransport::spawn(command, args)
            .await
            .map_err(|e| Error::ToolDiscovery(format!("Failed to start '{}': {}", command, e)))?;
        Self::from_transport(transport, client_name).await
    }
}

impl<T: Transport + 'static> McpToolProvider<T> {
    /// Run the initialize handshake over an already-open transport
    pub async fn from_transport(transport: T, client_name: &str) -> Result<Self> {
        let mut client = McpClient::new(transport);
        let server = client
            .initialize(ClientInfo::new(client_name, env!("CARGO_PKG_VERSION")))
            .await
            .map_err(|e| Error::ToolDiscovery(format!("MCP initialize failed: {}", e)))?;

        info!(server = %server.name, version = %server.version, "Connected to MCP server");
        if !offers_tools(&client) {
            warn!(server = %server.name, "MCP server did not advertise the tools capability");
        }

        Ok(Self {
            client,
            server_name: server.name,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Whether the server advertised `tools` during initialize
    pub fn offers_tools(&self) -> bool {
        offers_tools(&self.client)
    }

    /// Close the underlying connection
    pub async fn close(&self) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
    }
}

fn offers_tools<T: Transport>(client: &McpClient<T>) -> bool {
    client.server_capabilities().is_some_and(|caps| caps.tools.is_some())
}

fn to_descriptor(tool: McpTool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name,
        description: tool.description.unwrap_or_default(),
        input_schema: tool.input_schema,
    }
}

#[async_trait]
impl<T: Transport + 'static> ToolProvider for McpToolProvider<T> {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let tools = self
            .client
            .list_tools()
            .await
            .map_err(|e| Error::ToolDiscovery(e.to_string()))?;

        for tool in &tools {
            debug!(server = %self.server_name, tool_name = %tool.name, "Available tool");
        }

        Ok(tools.into_iter().map(to_descriptor).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> std::result::Result<ToolCallOutput, ToolError> {
        let result = self
            .client
            .call_tool(name, Value::Object(arguments.clone()))
            .await
            .map_err(|e| {
                ToolError::ExecutionFailed(format!(
                    "MCP tool '{}' on server '{}' failed: {}",
                    name, self.server_name, e
                ))
            })?;

        Ok(ToolCallOutput {
            content: result.texts(),
            is_error: result.is_error,
        })
    }
}

/// Open the MCP connection described by `config`.
///
/// A configured `command` takes precedence over `url` and launches a stdio
/// server; otherwise the SSE endpoint at `url` is used.
pub async fn connect(config: &McpConfig) -> Result<Arc<dyn ToolProvider>> {
    match &config.command {
        Some(command) => {
            info!(command = %command, "Starting MCP server over stdio");
            let provider = McpToolProvider::spawn(command, &config.args, &config.client_name).await?;
            Ok(Arc::new(provider))
        }
        None => {
            info!(url = %config.url, "Connecting to MCP server over SSE");
            let provider = McpToolProvider::connect_sse(&config.url, &config.client_name).await?;
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_defaults_missing_description() {
        let descriptor = to_descriptor(McpTool {
            name: "easter_egg".to_string(),
            description: None,
            input_schema: json!({"type": "object", "properties": {}}),
        });
        assert_eq!(descriptor.name, "easter_egg");
        assert_eq!(descriptor.description, "");
    }

    #[tokio::test]
    async fn test_connect_sse_refused_is_discovery_error() {
        let config = McpConfig {
            url: "http://127.0.0.1:9/sse".to_string(),
            ..McpConfig::default()
        };
        let err = connect(&config).await.err().expect("connection should fail");
        assert!(matches!(err, Error::ToolDiscovery(_)));
    }
}
