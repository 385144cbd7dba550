//! HTTP surface: `POST /ask` and `GET /status`
//!
//! Tool discovery runs in the background at startup and flips the readiness
//! flag once the tool server answers. Every `/ask` opens its own tool
//! connection and session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use waypoint_core::tools::mcp::connect;
use waypoint_core::{
    McpConfig, MetricsSummary, ModelService, SessionConfig, SessionDriver, SessionOutcome, ToolProvider,
};

pub const INITIALIZING_MESSAGE: &str = "Agent is still initializing. Please try again in a few moments.";
pub const EMPTY_QUERY_MESSAGE: &str = "Please provide a query.";

const INIT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Opens a fresh tool provider per request
#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn open(&self) -> waypoint_core::Result<Arc<dyn ToolProvider>>;
}

pub struct McpToolSource {
    config: McpConfig,
}

impl McpToolSource {
    pub fn new(config: McpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolSource for McpToolSource {
    async fn open(&self) -> waypoint_core::Result<Arc<dyn ToolProvider>> {
        connect(&self.config).await
    }
}

pub struct AppState {
    ready: AtomicBool,
    model: Arc<dyn ModelService>,
    tools: Arc<dyn ToolSource>,
    session: SessionConfig,
}

impl AppState {
    pub fn new(model: Arc<dyn ModelService>, tools: Arc<dyn ToolSource>, session: SessionConfig) -> Self {
        Self {
            ready: AtomicBool::new(false),
            model,
            tools,
            session,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn answer(&self, query: &str) -> waypoint_core::Result<SessionOutcome> {
        let tools = self.tools.open().await?;
        SessionDriver::new(self.model.clone(), tools, self.session.clone())
            .run(query)
            .await
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
    pub metrics: Option<MetricsSummary>,
}

impl AskResponse {
    fn message(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            metrics: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ready: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ask", post(ask))
        .route("/status", get(status))
        .with_state(state)
}

pub async fn ask(State(state): State<Arc<AppState>>, Json(request): Json<AskRequest>) -> Json<AskResponse> {
    if !state.is_ready() {
        return Json(AskResponse::message(INITIALIZING_MESSAGE));
    }

    let query = request.query.trim();
    if query.is_empty() {
        return Json(AskResponse::message(EMPTY_QUERY_MESSAGE));
    }

    match state.answer(query).await {
        Ok(outcome) => {
            let metrics = outcome.metrics.summary();
            info!(tokens = metrics.total_tokens, tools = ?metrics.tools_used, "Answered /ask");
            Json(AskResponse {
                response: outcome.output,
                metrics: Some(metrics),
            })
        }
        Err(e) => {
            error!("/ask failed: {}", e);
            Json(AskResponse::message(format!("Error processing your request: {}", e)))
        }
    }
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ready: state.is_ready(),
    })
}

/// Retry tool discovery until it succeeds, then mark the state ready
pub async fn initialize(state: Arc<AppState>, retry_delay: Duration) {
    loop {
        let discovered = match state.tools.open().await {
            Ok(tools) => tools.list_tools().await,
            Err(e) => Err(e),
        };

        match discovered {
            Ok(tools) => {
                info!(tool_count = tools.len(), "Agent initialized and ready to use");
                state.ready.store(true, Ordering::Release);
                return;
            }
            Err(e) => {
                warn!("Tool discovery failed, retrying in {:?}: {}", retry_delay, e);
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

pub async fn serve(state: Arc<AppState>, bind_address: &str) -> anyhow::Result<()> {
    tokio::spawn(initialize(state.clone(), INIT_RETRY_DELAY));

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Starting web server on {}", bind_address);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
