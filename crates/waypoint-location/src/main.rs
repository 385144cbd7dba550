//! Location MCP server binary

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use waypoint_location::geo::{places_endpoint, routes_endpoint};
use waypoint_location::{API_KEY_ENV, DEFAULT_REGION, GeoClient, INSTRUCTIONS, LocationHandler};
use waypoint_mcp::McpServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    Stdio,
    Sse,
}

#[derive(Parser)]
#[command(name = "waypoint-location")]
#[command(author, version, about = "Amazon Location Service tools served over MCP", long_about = None)]
struct Cli {
    /// Transport to serve on
    #[arg(short, long, value_enum, default_value = "sse")]
    transport: TransportKind,

    /// Bind host for the SSE transport
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Bind port for the SSE transport
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Amazon Location API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: String,

    /// AWS region hosting the Location resources
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Override the geo-places endpoint
    #[arg(long)]
    places_url: Option<String>,

    /// Override the geo-routes endpoint
    #[arg(long)]
    routes_url: Option<String>,
}

impl Cli {
    fn geo_client(&self) -> GeoClient {
        let places = self.places_url.clone().unwrap_or_else(|| places_endpoint(&self.region));
        let routes = self.routes_url.clone().unwrap_or_else(|| routes_endpoint(&self.region));
        GeoClient::with_endpoints(places, routes, self.api_key.clone())
    }
}

fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let file_name = format!("location_{}.log", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let (file_writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, file_name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.log_dir)?;

    let handler = Arc::new(LocationHandler::new(cli.geo_client()));
    let server = Arc::new(
        McpServer::new(handler)
            .with_name("location")
            .with_instructions(INSTRUCTIONS),
    );

    match cli.transport {
        TransportKind::Stdio => {
            info!(region = %cli.region, "Starting location server on stdio");
            server.serve_stdio().await?;
        }
        TransportKind::Sse => {
            let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
                .parse()
                .with_context(|| format!("invalid bind address {}:{}", cli.host, cli.port))?;
            info!(%addr, region = %cli.region, "Starting location server on SSE");
            server.serve_sse(addr).await?;
        }
    }

    Ok(())
}
