//! MCP Server implementation
//!
//! `McpServer` dispatches JSON-RPC requests to an [`McpHandler`]. It can be
//! served over stdio (one JSON message per line) or over SSE, where each
//! `GET /sse` opens a session and requests are posted to
//! `/messages?session_id=...`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::protocol::{methods, IncomingMessage, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::{McpTool, ServerCapabilities, ToolCallResult, PROTOCOL_VERSION};

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages";

/// Handler for MCP requests
#[async_trait]
pub trait McpHandler: Send + Sync {
    /// List available tools
    async fn list_tools(&self) -> Vec<McpTool>;

    /// Call a tool. `Err` is reported to the client as an error result,
    /// not as a protocol failure.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, String>;
}

/// MCP Server
pub struct McpServer<H: McpHandler> {
    handler: Arc<H>,
    capabilities: ServerCapabilities,
    server_name: String,
    server_version: String,
    instructions: Option<String>,
}

impl<H: McpHandler> McpServer<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            capabilities: ServerCapabilities {
                tools: Some(crate::ToolsCapability { list_changed: false }),
            },
            server_name: "waypoint-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.server_name
    }

    /// Handle one line of the stdio transport. Unparseable JSON gets a
    /// parse error carrying a null id.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(line) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!("Unparseable line on stdin: {}", e);
                serde_json::to_value(JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error())).ok()
            }
        }
    }

    /// Handle a raw inbound message. Returns the reply to send, if any;
    /// notifications and stray responses produce none, and messages that are
    /// not JSON-RPC get an invalid-request error with a null id.
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        match IncomingMessage::classify(message) {
            Ok(IncomingMessage::Request(request)) => {
                let response = self.handle_request(request).await;
                serde_json::to_value(response)
                    .map_err(|e| error!("Failed to serialize MCP response: {}", e))
                    .ok()
            }
            Ok(IncomingMessage::Notification(notification)) => {
                debug!(method = %notification.method, "Received notification");
                None
            }
            Ok(IncomingMessage::Response(response)) => {
                debug!(id = %response.id, "Ignoring client response");
                None
            }
            Err(e) => {
                warn!("Malformed JSON-RPC message: {}", e);
                serde_json::to_value(JsonRpcResponse::error(RequestId::Null, JsonRpcError::invalid_request())).ok()
            }
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, id = %request.id, "Handling MCP request");
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.id),
            methods::PING => JsonRpcResponse::success(request.id, serde_json::json!({})),
            methods::TOOLS_LIST => self.handle_tools_list(request.id).await,
            methods::TOOLS_CALL => self.handle_tools_call(request.id, request.params).await,
            _ => JsonRpcResponse::error(request.id, JsonRpcError::method_not_found()),
        }
    }

    fn handle_initialize(&self, id: RequestId) -> JsonRpcResponse {
        let mut result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": self.capabilities,
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version
            }
        });
        if let Some(instructions) = &self.instructions {
            result["instructions"] = Value::String(instructions.clone());
        }

        JsonRpcResponse::success(id, result)
    }

    async fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let tools = self.handler.list_tools().await;
        JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => return JsonRpcResponse::error(id, JsonRpcError::invalid_params()),
        };

        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return JsonRpcResponse::error(id, JsonRpcError::invalid_params()),
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));

        let result = match self.handler.call_tool(name, arguments).await {
            Ok(text) => ToolCallResult::text(text),
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                ToolCallResult::error(e)
            }
        };

        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::new(-32603, e.to_string())),
        }
    }
}

impl<H: McpHandler + 'static> McpServer<H> {
    /// Serve line-delimited JSON-RPC over stdin/stdout until stdin closes
    pub async fn serve_stdio(self: Arc<Self>) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        info!(server = %self.server_name, "Serving MCP over stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let reply = self.handle_line(&line).await;

            if let Some(reply) = reply {
                let json = serde_json::to_string(&reply)?;
                stdout.write_all(json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, MCP server exiting");
        Ok(())
    }

    /// Serve over SSE on the given address until the listener fails
    pub async fn serve_sse(self: Arc<Self>, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(server = %self.server_name, %addr, "Serving MCP over SSE at {}", SSE_PATH);
        axum::serve(listener, sse_router(self)).await
    }
}

struct SseState<H: McpHandler> {
    server: Arc<McpServer<H>>,
    sessions: Mutex<HashMap<String, mpsc::UnboundedSender<Value>>>,
}

impl<H: McpHandler> SseState<H> {
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<Value>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a session's channel once its event stream is dropped
struct SessionGuard<H: McpHandler> {
    state: Arc<SseState<H>>,
    session_id: String,
}

impl<H: McpHandler> Drop for SessionGuard<H> {
    fn drop(&mut self) {
        self.state.sessions().remove(&self.session_id);
        debug!(session_id = %self.session_id, "SSE session closed");
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: String,
}

/// Build the axum router exposing `server` over SSE
pub fn sse_router<H: McpHandler + 'static>(server: Arc<McpServer<H>>) -> Router {
    let state = Arc::new(SseState {
        server,
        sessions: Mutex::new(HashMap::new()),
    });

    Router::new()
        .route(SSE_PATH, get(handle_sse::<H>))
        .route(MESSAGES_PATH, post(handle_post_message::<H>))
        .with_state(state)
}

async fn handle_sse<H: McpHandler + 'static>(
    State(state): State<Arc<SseState<H>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = uuid::Uuid::new_v4().simple().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    state.sessions().insert(session_id.clone(), tx);

    let endpoint = format!("{}?session_id={}", MESSAGES_PATH, session_id);
    debug!(%session_id, "SSE session opened");

    let guard = SessionGuard {
        state: state.clone(),
        session_id,
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok(Event::default().event("endpoint").data(endpoint));

        while let Some(message) = rx.recv().await {
            match Event::default().event("message").json_data(&message) {
                Ok(event) => yield Ok(event),
                Err(e) => error!("Failed to serialize SSE message: {}", e),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

async fn handle_post_message<H: McpHandler + 'static>(
    State(state): State<Arc<SseState<H>>>,
    Query(query): Query<SessionQuery>,
    Json(message): Json<Value>,
) -> StatusCode {
    let sender = state.sessions().get(&query.session_id).cloned();
    let Some(sender) = sender else {
        warn!(session_id = %query.session_id, "Message for unknown SSE session");
        return StatusCode::NOT_FOUND;
    };

    if let Some(reply) = state.server.handle_message(message).await
        && sender.send(reply).is_err()
    {
        return StatusCode::GONE;
    }

    StatusCode::ACCEPTED
}
