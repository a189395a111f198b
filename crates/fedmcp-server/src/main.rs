use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fedmcp_server::{app, build_service, create_router, Config};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    let service = Arc::new(build_service(&config).await?);

    #[cfg(unix)]
    spawn_keyring_reload(service.clone(), config.trusted_jwks_path.clone());

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "fedmcp server listening");

    axum::serve(listener, create_router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("fedmcp server shut down");
    Ok(())
}

/// `RUST_LOG` selects levels (default `info`); `LOG_FORMAT=json` switches to
/// structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

/// Re-reads the trusted JWKS on SIGHUP.
#[cfg(unix)]
fn spawn_keyring_reload(
    service: Arc<fedmcp_server::ArtifactService>,
    trusted_jwks: Option<std::path::PathBuf>,
) {
    tokio::spawn(async move {
        let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP handler unavailable; keyring reload disabled");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            match app::reload_keyring(&service, trusted_jwks.as_deref()) {
                Ok(count) => info!(count, "keyring reloaded"),
                Err(e) => tracing::error!(error = %e, "keyring reload failed; keeping previous keys"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
