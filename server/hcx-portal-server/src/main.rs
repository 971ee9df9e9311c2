use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use hcx_portal_server::{create_app, PortalServer, ServerConfig};
use logger_redacted::{init_tracing, LoggerConfig};

/// HCX portal backend server
#[derive(Parser, Debug)]
#[command(name = "hcx-portal-server")]
#[command(about = "Forwards eligibility and claim requests and pushes their results to portal clients")]
struct Args {
    /// Server bind address (overrides the configuration)
    #[arg(long, env = "HCX_HOST")]
    host: Option<String>,

    /// Server port (overrides the configuration)
    #[arg(short, long, env = "HCX_PORT")]
    port: Option<u16>,

    /// Configuration file path (YAML or TOML)
    #[arg(short, long, default_value = "hcx-portal.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(
        &LoggerConfig::from_env(args.verbose),
        "hcx_portal_server={level},insurance_service={level},tower_http=info,reqwest=info",
    )?;

    let mut config = ServerConfig::load(Some(&args.config))
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let addr = config.bind_address();
    info!(version = env!("CARGO_PKG_VERSION"), %addr, "Starting HCX portal server");
    info!(
        coverage_eligibility = %config.coverage_eligibility_url,
        claim = %config.claim_url,
        "Downstream groups configured"
    );

    let server = PortalServer::new(config)?;
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Health check available at: http://{addr}/health");
    info!("Notification clients connect to: ws://{addr}/ws");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
