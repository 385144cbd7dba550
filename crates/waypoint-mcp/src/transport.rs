//! MCP Transport layer implementations

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use url::Url;

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: Value) -> io::Result<()>;
    /// Next inbound message, `None` once the peer has gone away
    async fn receive(&mut self) -> io::Result<Option<Value>>;
    async fn close(&mut self) -> io::Result<()>;
}

fn other_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::other(e.to_string())
}

/// Stdio transport for subprocess communication
pub struct StdioTransport {
    child: Child,
    reader: Option<BufReader<tokio::process::ChildStdout>>,
}

impl StdioTransport {
    pub async fn spawn(command: &str, args: &[String]) -> io::Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| other_error("Failed to capture stdout"))?;

        debug!(command, "Spawned MCP server process");

        Ok(Self {
            child,
            reader: Some(BufReader::new(stdout)),
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| other_error("Stdin not available"))?;

        let json = serde_json::to_string(&message)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| other_error("Reader not available"))?;

        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;

            if n == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => return Ok(Some(value)),
                // Some servers print banners to stdout before speaking JSON-RPC
                Err(e) => warn!(error = %e, line = trimmed, "Skipping non-JSON line from MCP server"),
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.reader = None;
        self.child.kill().await?;
        Ok(())
    }
}

type EventStream = BoxStream<'static, Result<eventsource_stream::Event, String>>;

/// SSE transport for HTTP-based communication
///
/// The server announces the URL to POST requests to in an `endpoint`
/// event; responses then arrive on the same event stream as `message`
/// events.
pub struct SseTransport {
    client: reqwest::Client,
    endpoint: Url,
    events: Option<EventStream>,
}

impl SseTransport {
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Open the event stream and wait for the server's `endpoint` event
    pub async fn connect(sse_url: &str) -> io::Result<Self> {
        let base = Url::parse(sse_url).map_err(other_error)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()
            .map_err(other_error)?;

        let response = client
            .get(base.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(other_error)?
            .error_for_status()
            .map_err(other_error)?;

        let mut events: EventStream = response
            .bytes_stream()
            .eventsource()
            .map(|event| event.map_err(|e| e.to_string()))
            .boxed();

        let endpoint = loop {
            match events.next().await {
                Some(Ok(event)) if event.event == "endpoint" => {
                    break resolve_endpoint(&base, &event.data)?;
                }
                Some(Ok(event)) => {
                    debug!(event = %event.event, "Ignoring SSE event before endpoint");
                }
                Some(Err(e)) => return Err(other_error(e)),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "SSE stream closed before endpoint event",
                    ));
                }
            }
        };

        debug!(%endpoint, "SSE transport connected");

        Ok(Self {
            client,
            endpoint,
            events: Some(events),
        })
    }

    /// URL requests are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Resolve the `endpoint` event payload against the SSE URL
pub fn resolve_endpoint(base: &Url, data: &str) -> io::Result<Url> {
    base.join(data.trim()).map_err(other_error)
}

#[async_trait]
impl Transport for SseTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        self.client
            .post(self.endpoint.clone())
            .json(&message)
            .send()
            .await
            .map_err(other_error)?
            .error_for_status()
            .map_err(other_error)?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        let Some(events) = self.events.as_mut() else {
            return Ok(None);
        };

        while let Some(event) = events.next().await {
            let event = event.map_err(other_error)?;
            if event.event != "message" && !event.event.is_empty() {
                debug!(event = %event.event, "Ignoring SSE event");
                continue;
            }
            if event.data.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&event.data)?;
            return Ok(Some(value));
        }

        Ok(None)
    }

    async fn close(&mut self) -> io::Result<()> {
        // Dropping the body stream closes the connection
        self.events = None;
        Ok(())
    }
}
