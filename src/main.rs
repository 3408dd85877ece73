use std::sync::Arc;

use anyhow::Context;
use helpline::{config::Config, db::{IdentityStore, SqliteStore}, router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("helpline=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;

    let store = Arc::new(
        SqliteStore::connect(&config.database_url, config.database_max_connections)
            .await
            .with_context(|| format!("opening {}", config.database_url))?,
    );
    let stale = store.reset_presence().await?;
    if stale > 0 {
        info!(stale, "cleared online flags left over from the last run");
    }

    let app = router(AppState::new(store.clone(), store));

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
