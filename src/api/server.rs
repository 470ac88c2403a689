//! HTTP server startup.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::auth::Authenticator;
use crate::clustering::ClusteringPipeline;
use crate::config::Config;
use crate::error::Result;

use super::{create_router, ApiState};

/// Load the models and serve the API until Ctrl-C.
///
/// An encoder that fails to load does not stop the server: clustering
/// endpoints answer 503 and the rest keep working.
pub async fn run_server(config: Config) -> Result<()> {
    let pipeline = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || ClusteringPipeline::from_config(&config)).await
    };

    let state = ApiState::new(&config);
    let state = match pipeline {
        Ok(Ok(pipeline)) => {
            tracing::info!(
                model = pipeline.embedder().inner().model_id(),
                refinement = pipeline.has_refiner(),
                "Models loaded"
            );
            state.with_pipeline(Arc::new(pipeline), &config)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to load encoder, clustering disabled");
            state
        }
        Err(e) => {
            tracing::error!(error = %e, "Model loading task failed, clustering disabled");
            state
        }
    };

    let router = create_router(
        Arc::new(state),
        Authenticator::from_config(&config),
        config.server.enable_cors,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Keyword clustering API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
