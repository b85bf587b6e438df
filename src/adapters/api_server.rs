use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::api::{create_router, AppState};
use crate::config::AppConfig;
use crate::error::{Result, ServeError};
use crate::ml::Classifier;
use crate::services::ModelHolder;

/// Startup step: validate config and load the model into a fresh holder.
///
/// Runs before any listener exists. Every failure here is fatal for the
/// process; there is no degraded mode that serves without a model.
pub fn bootstrap(config: &AppConfig) -> Result<ModelHolder> {
    config.validate().map_err(ServeError::InvalidConfig)?;

    let holder = ModelHolder::new();
    holder.initialize(&config.server.model_path)?;
    Ok(holder)
}

/// Same as [`bootstrap`] for a model built in-process.
pub fn bootstrap_with_model(config: &AppConfig, model: Arc<dyn Classifier>) -> Result<ModelHolder> {
    config.validate().map_err(ServeError::InvalidConfig)?;

    let holder = ModelHolder::new();
    holder.install(model)?;
    Ok(holder)
}

/// Start the API server
///
/// The holder must already be initialized; binding happens only after that
/// check so no request can ever observe an empty slot.
pub async fn start_api_server(config: &AppConfig, holder: ModelHolder) -> Result<()> {
    if !holder.is_ready() {
        return Err(ServeError::ModelUnavailable);
    }
    let addr = config
        .socket_addr()
        .map_err(|e| ServeError::InvalidConfig(vec![e]))?;

    let app = create_router(AppState::from_config(holder, config));

    let listener = TcpListener::bind(addr).await?;
    info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
