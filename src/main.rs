//! File Store Server
//!
//! Serves the in-memory file store over HTTP with chunked upload support.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filestore_server::{build_router, config, AppState, Config};

/// Command line options; each overrides the matching environment setting
#[derive(Parser, Debug)]
#[command(name = "filestore-server", version, about = "HTTP file store with chunked uploads")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Form field carrying the chunk number
    #[arg(long = "chunknumber")]
    chunk_number: Option<String>,

    /// Form field carrying the total size on assembly
    #[arg(long = "totalsize")]
    total_size: Option<String>,

    /// Path prefix for the file routes
    #[arg(long)]
    route: Option<String>,

    /// Spool whole-file uploads to this directory instead of memory
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Require a token from /token on file routes
    #[arg(long)]
    use_token: bool,

    /// Lower the log level to trace
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "filestore_server=trace,tower_http=debug"
    } else {
        "filestore_server=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });
    apply_cli(&mut config, cli);

    tracing::info!("Starting File Store Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("  * Port: {}", config.server.port);
    tracing::info!("  * Routes: /{}", config.server.route);
    tracing::info!("  * Tokens: {}", if config.auth.use_token { "yes" } else { "no" });
    if let Some(dir) = &config.upload.upload_dir {
        tracing::info!("  * Upload dir: {}", dir.display());
    }
    tracing::debug!(?config, "Configuration");

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid SERVER_HOST {}", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));

    let app_state = AppState::new(config);
    let app = build_router(app_state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("File Store Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    app_state.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

fn apply_cli(config: &mut Config, cli: Cli) {
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(field) = cli.chunk_number {
        config.upload.chunk_number_field = field;
    }
    if let Some(field) = cli.total_size {
        config.upload.total_size_field = field;
    }
    if let Some(route) = cli.route {
        config.server.route = config::normalize_route(&route);
    }
    if cli.upload_dir.is_some() {
        config.upload.upload_dir = cli.upload_dir;
    }
    if cli.use_token {
        config.auth.use_token = true;
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
