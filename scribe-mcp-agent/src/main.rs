use crate::utils::init_logging;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use rmcp::{
    transport::sse_server::SseServer,
    transport::stdio,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpService,
    },
    ServiceExt,
};
use std::net::SocketAddr;
use std::path::PathBuf;

use scribe::HostConfig;

pub mod notes;
pub mod server;
pub mod utils;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Scribe MCP Server - project context detection and knowledge capture via Model Context Protocol"
)]
struct Args {
    /// Transport mode to use
    #[arg(short, long, value_enum, default_value = "stdio")]
    transport: TransportMode,

    /// Port to listen on (only used for SSE and HTTP transports)
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Host to bind to (only used for SSE and HTTP transports)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Root URL of the host application's web surface
    #[arg(long, env = "SCRIBE_BASE_URL")]
    base_url: Option<String>,

    /// Browser profile directory; login state persists here across runs
    #[arg(long, env = "SCRIBE_PROFILE_DIR")]
    profile_dir: Option<PathBuf>,

    /// Path to the host application's local note database
    #[arg(long, env = "SCRIBE_NOTES_DB")]
    notes_db: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum TransportMode {
    /// Standard I/O transport (default)
    Stdio,
    /// Server-Sent Events transport for web integrations
    Sse,
    /// Streamable HTTP transport for HTTP-based clients
    Http,
}

fn host_config(args: &Args) -> HostConfig {
    let mut config = HostConfig::from_env();
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(profile_dir) = &args.profile_dir {
        config.profile_dir = profile_dir.clone();
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    tracing::info!("Initializing Scribe MCP server...");
    tracing::info!("Transport mode: {:?}", args.transport);

    let config = host_config(&args);

    match args.transport {
        TransportMode::Stdio => {
            tracing::info!("Starting stdio transport...");
            let wrapper = server::ScribeWrapper::new(config, args.notes_db.clone()).await?;
            let session = wrapper.session.clone();
            let service = wrapper.serve(stdio()).await.inspect_err(|e| {
                tracing::error!("Serving error: {:?}", e);
            })?;

            service.waiting().await?;
            if let Err(e) = session.close().await {
                tracing::warn!("Session close failed: {e}");
            }
        }
        TransportMode::Sse => {
            let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
            tracing::info!("Starting SSE server on http://{}", addr);

            let wrapper = server::ScribeWrapper::new(config, args.notes_db.clone()).await?;
            let session = wrapper.session.clone();
            let ct = SseServer::serve(addr)
                .await?
                .with_service(move || wrapper.clone());

            println!("SSE server running on http://{}", addr);
            println!("Connect your MCP client to:");
            println!("  SSE endpoint: http://{}/sse", addr);
            println!("  Message endpoint: http://{}/message", addr);
            println!("Press Ctrl+C to stop");

            tokio::signal::ctrl_c().await?;
            ct.cancel();
            if let Err(e) = session.close().await {
                tracing::warn!("Session close failed: {e}");
            }
            tracing::info!("Shutting down SSE server");
        }
        TransportMode::Http => {
            let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
            tracing::info!("Starting streamable HTTP server on http://{}", addr);

            let wrapper = server::ScribeWrapper::new(config, args.notes_db.clone()).await?;
            let session = wrapper.session.clone();
            let service = StreamableHttpService::new(
                move || Ok(wrapper.clone()),
                LocalSessionManager::default().into(),
                Default::default(),
            );

            let router = axum::Router::new()
                .route("/health", axum::routing::get(health_check))
                .nest_service("/mcp", service);
            let tcp_listener = tokio::net::TcpListener::bind(addr).await?;

            println!("Streamable HTTP server running on http://{}", addr);
            println!("Connect your MCP client to: http://{}/mcp", addr);
            println!("Health check available at: http://{}/health", addr);
            println!("Press Ctrl+C to stop");

            axum::serve(tcp_listener, router)
                .with_graceful_shutdown(async {
                    tokio::signal::ctrl_c().await.ok();
                })
                .await?;

            if let Err(e) = session.close().await {
                tracing::warn!("Session close failed: {e}");
            }
            tracing::info!("Shutting down HTTP server");
        }
    }

    Ok(())
}

async fn health_check() -> impl axum::response::IntoResponse {
    (
        axum::http::StatusCode::OK,
        axum::Json(serde_json::json!({"status": "ok"})),
    )
}
