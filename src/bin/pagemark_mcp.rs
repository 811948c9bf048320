//! Pagemark MCP server entry point.
//!
//! Starts the MCP server over STDIO transport. Logging goes to stderr —
//! stdout carries the protocol.

use pagemark::config::OcrConfig;
use pagemark::mcp::PagemarkServer;
use rmcp::ServiceExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagemark=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Fail at startup rather than on the first tool call: a server without a
    // key can never convert anything, and the MCP client's error surface for
    // a dead server is clearer than a per-call failure.
    if let Err(e) = OcrConfig::default().resolve_api_key() {
        eprintln!("{e}");
        eprintln!("\nHint: set DASHSCOPE_API_KEY in the MCP client's env configuration.");
        std::process::exit(1);
    }

    tracing::info!("Starting pagemark MCP server v{}", env!("CARGO_PKG_VERSION"));

    let server = PagemarkServer::new();
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    tracing::info!("pagemark MCP server stopped");
    Ok(())
}
