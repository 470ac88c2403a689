//! HTTP router.

use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::handlers::{
    cluster_async_handler, cluster_sync_handler, health_handler, results_handler, root_handler,
    ApiState,
};
use crate::auth::{AuthLayer, Authenticator, API_KEY_HEADER};

/// Create the API router.
///
/// Endpoints:
/// - GET  /                       - Welcome message
/// - GET  /health                 - Liveness
/// - POST /cluster_keywords_sync  - Cluster and return the result (key required)
/// - POST /cluster_keywords       - Queue a clustering job (key required)
/// - GET  /results/:task_id       - Poll a job
pub fn create_router(state: Arc<ApiState>, authenticator: Authenticator, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/cluster_keywords_sync", post(cluster_sync_handler))
        .route("/cluster_keywords", post(cluster_async_handler))
        .route("/results/:task_id", get(results_handler))
        .with_state(state)
        .layer(AuthLayer::new(authenticator));

    let router = if enable_cors {
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
            .allow_origin(Any);
        router.layer(cors)
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
