//! Disk Cache - A disk-backed, size-bounded HTTP response cache
//!
//! Serves a directory through the disk cache middleware.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disk_cache::{api::create_router, AppState, Config};

/// Main entry point for the disk cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache directory and index
/// 4. Create Axum router with the cache in front of the origin
/// 5. Start HTTP server on configured port
/// 6. On SIGINT/SIGTERM shut down gracefully and remove the cache directory
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "disk_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Disk Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: capacity={} bytes, port={}, root={}",
        config.capacity_bytes,
        config.server_port,
        config.root_dir.display()
    );

    // The cache directory is fatal to miss: nothing can be cached without it
    let state = AppState::from_config(&config).context("failed to initialize disk cache")?;
    let cache_dir = state.cache.base_dir().to_path_buf();

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    remove_cache_dir(&cache_dir);
    served?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// The cache never cleans up after itself; as its operator we do.
fn remove_cache_dir(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => info!("Removed cache directory {}", path.display()),
        Err(err) => warn!("Failed to remove cache directory {}: {}", path.display(), err),
    }
}
