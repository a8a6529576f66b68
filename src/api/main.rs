use anyhow::Context;
use tracing::info;

use flow_results_api::config::ServerConfig;
use flow_results_api::middleware::{create_cors_layer, init_tracing};
use flow_results_api::routes;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Application starting...");

    let config = ServerConfig::from_env().context("Failed to load configuration")?;
    let cors = create_cors_layer(&config);
    let addr = config.listen_addr();

    let app_state = routes::create_app_state_with_storage(config)
        .await
        .context("Failed to initialize storage")?;
    if app_state.is_postgres() {
        info!("Using PostgreSQL storage");
    } else {
        info!("Using in-memory storage; data is lost on restart");
    }

    let app = routes::create_app(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind listener to {}", addr))?;
    info!("Server listening on {}", addr);
    info!("Health check available at http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down gracefully"),
        _ = terminate => info!("SIGTERM received, shutting down gracefully"),
    }
}
