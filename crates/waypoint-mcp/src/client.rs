//! MCP Client implementation

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::protocol::{
    methods, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, RequestId,
};
use crate::transport::Transport;
use crate::{McpTool, ServerCapabilities, ToolCallResult, PROTOCOL_VERSION};

/// Guard against servers that keep returning the same cursor
const MAX_TOOL_PAGES: usize = 64;

/// MCP Client for connecting to MCP servers
pub struct McpClient<T: Transport> {
    transport: Arc<Mutex<T>>,
    request_id: AtomicI64,
    server_capabilities: Option<ServerCapabilities>,
}

impl<T: Transport> McpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            request_id: AtomicI64::new(1),
            server_capabilities: None,
        }
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Capabilities reported by the server during `initialize`
    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Initialize the connection
    pub async fn initialize(&mut self, client_info: ClientInfo) -> Result<ServerInfo, McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_info.name,
                "version": client_info.version
            }
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::INITIALIZE).with_params(params);
        let result = self.request(request).await?;

        let server_info: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

        self.server_capabilities = Some(server_info.capabilities.clone());

        let notification = serde_json::to_value(JsonRpcNotification::new(methods::INITIALIZED))
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        let mut transport = self.transport.lock().await;
        transport
            .send(notification)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        debug!(
            server = %server_info.server_info.name,
            version = %server_info.server_info.version,
            protocol = %server_info.protocol_version,
            "MCP session initialized"
        );

        Ok(ServerInfo {
            name: server_info.server_info.name,
            version: server_info.server_info.version,
        })
    }

    /// List available tools, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let mut request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_LIST);
            if let Some(c) = &cursor {
                request = request.with_params(serde_json::json!({ "cursor": c }));
            }

            let result = self.request(request).await?;
            let page: ToolsListResult =
                serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        warn!("tools/list pagination did not terminate after {} pages", MAX_TOOL_PAGES);
        Ok(tools)
    }

    /// Call a tool
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_CALL).with_params(params);
        let result = self.request(request).await?;

        serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<(), McpError> {
        let mut transport = self.transport.lock().await;
        transport
            .close()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    async fn request(&self, request: JsonRpcRequest) -> Result<serde_json::Value, McpError> {
        let response = self.send_request(request).await?;

        if let Some(error) = response.error {
            Err(McpError::Server(error.message))
        } else if let Some(result) = response.result {
            Ok(result)
        } else {
            Err(McpError::Protocol("Empty response".to_string()))
        }
    }

    /// Send a request and wait for the response carrying the same id.
    ///
    /// The transport lock is held for the whole exchange, so concurrent
    /// callers are serialized.
    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        let mut transport = self.transport.lock().await;

        let expected_id = request.id.clone();
        let request_value =
            serde_json::to_value(&request).map_err(|e| McpError::Protocol(e.to_string()))?;

        debug!(method = %request.method, id = %expected_id, "Sending MCP request");

        transport
            .send(request_value)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        loop {
            let value = transport
                .receive()
                .await
                .map_err(|e| McpError::Transport(e.to_string()))?
                .ok_or_else(|| McpError::Transport("Connection closed".to_string()))?;

            let message =
                IncomingMessage::classify(value).map_err(|e| McpError::Protocol(e.to_string()))?;

            match message {
                IncomingMessage::Response(response) if response.id == expected_id => {
                    return Ok(response);
                }
                IncomingMessage::Response(response) => {
                    warn!(id = %response.id, expected = %expected_id, "Discarding response for unknown request");
                }
                IncomingMessage::Notification(notification) => {
                    debug!(method = %notification.method, "Ignoring server notification");
                }
                IncomingMessage::Request(server_request) => {
                    let reply = if server_request.method == methods::PING {
                        JsonRpcResponse::success(server_request.id, serde_json::json!({}))
                    } else {
                        JsonRpcResponse::error(server_request.id, JsonRpcError::method_not_found())
                    };
                    let reply =
                        serde_json::to_value(reply).map_err(|e| McpError::Protocol(e.to_string()))?;
                    transport
                        .send(reply)
                        .await
                        .map_err(|e| McpError::Transport(e.to_string()))?;
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl ClientInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, serde::Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    #[serde(default)]
    capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    server_info: ServerInfoInner,
}

#[derive(Debug, serde::Deserialize)]
struct ServerInfoInner {
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, serde::Deserialize)]
struct ToolsListResult {
    tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

/// MCP errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Server error: {0}")]
    Server(String),
}
