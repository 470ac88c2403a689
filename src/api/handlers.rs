//! HTTP request handlers.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};

use crate::auth::ClientIdentity;
use crate::clustering::{ClusterRequest, ClusteringOutput, ClusteringPipeline};
use crate::config::Config;
use crate::error::{JobError, KwClusterError};
use crate::jobs::{JobQueue, JobRecord, JobStatus, JobStore};

const UNAVAILABLE_MESSAGE: &str = "AI model is not loaded. Please try again later.";

/// Application state shared across handlers.
pub struct ApiState {
    /// `None` when the encoder failed to load; clustering endpoints answer 503.
    pub pipeline: Option<Arc<ClusteringPipeline>>,
    pub jobs: Option<JobQueue>,
    pub store: JobStore,
    pub sync_max_keywords: usize,
    pub async_max_keywords: usize,
    sync_limiter: Option<DefaultKeyedRateLimiter<String>>,
    async_limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl ApiState {
    /// State with no pipeline loaded.
    pub fn new(config: &Config) -> Self {
        Self {
            pipeline: None,
            jobs: None,
            store: JobStore::new(config.jobs.keep_result_secs),
            sync_max_keywords: config.server.sync_max_keywords,
            async_max_keywords: config.server.async_max_keywords,
            sync_limiter: per_minute(config.auth.sync_per_minute),
            async_limiter: per_minute(config.auth.async_per_minute),
        }
    }

    /// Attach a pipeline and start the background workers for it.
    pub fn with_pipeline(mut self, pipeline: Arc<ClusteringPipeline>, config: &Config) -> Self {
        let queue = JobQueue::spawn(pipeline.clone(), self.store.clone(), &config.jobs);
        self.pipeline = Some(pipeline);
        self.jobs = Some(queue);
        self
    }

    /// Attach an already running job queue.
    pub fn with_jobs(mut self, jobs: JobQueue) -> Self {
        self.store = jobs.store().clone();
        self.jobs = Some(jobs);
        self
    }
}

fn per_minute(limit: u32) -> Option<DefaultKeyedRateLimiter<String>> {
    NonZeroU32::new(limit).map(|n| RateLimiter::keyed(Quota::per_minute(n)))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    fn reply(status: StatusCode, code: &str, error: impl Into<String>) -> Response {
        (
            status,
            Json(ErrorResponse {
                error: error.into(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Response to a job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmitted {
    pub task_id: String,
    pub status: JobStatus,
    pub message: String,
}

/// Response to a job poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: JobStatus,
    pub progress: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ClusteringOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<JobRecord> for TaskResult {
    fn from(record: JobRecord) -> Self {
        let error = match record.status {
            JobStatus::Failed => Some(record.error.unwrap_or_else(|| "Unknown error.".to_string())),
            _ => record.error,
        };
        Self {
            task_id: record.task_id,
            status: record.status,
            progress: record.progress,
            result: record.result,
            error,
            message: record.message,
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

// ============================================================================
// Handler Functions
// ============================================================================

/// GET / - Welcome message.
pub async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to the Keyword Clustering API. Use /cluster_keywords to perform clustering."
    }))
}

/// GET /health - Liveness.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "keyword-clustering-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /cluster_keywords_sync - Cluster and return the result.
pub async fn cluster_sync_handler(
    State(state): State<Arc<ApiState>>,
    identity: Option<Extension<ClientIdentity>>,
    Json(request): Json<ClusterRequest>,
) -> Response {
    if let Some(response) = rate_limited(state.sync_limiter.as_ref(), identity.as_deref()) {
        return response;
    }
    if let Some(response) = validate_size(&request, state.sync_max_keywords, "synchronous") {
        return response;
    }
    let Some(pipeline) = state.pipeline.clone() else {
        return ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "model_unavailable", UNAVAILABLE_MESSAGE);
    };

    tracing::info!(keywords = request.keywords.len(), "Synchronous clustering request");

    match pipeline.run(request).await {
        Ok(output) => (StatusCode::OK, Json(output)).into_response(),
        Err(e) if e.is_unavailable() => {
            tracing::error!(error = %e, "Encoder unavailable");
            ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "model_unavailable", UNAVAILABLE_MESSAGE)
        }
        Err(e) => {
            tracing::error!(error = %e, "Synchronous clustering failed");
            ErrorResponse::reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "clustering_failed",
                format!("An unexpected error occurred: {}", e),
            )
        }
    }
}

/// POST /cluster_keywords - Queue a clustering job.
pub async fn cluster_async_handler(
    State(state): State<Arc<ApiState>>,
    identity: Option<Extension<ClientIdentity>>,
    Json(request): Json<ClusterRequest>,
) -> Response {
    if let Some(response) = rate_limited(state.async_limiter.as_ref(), identity.as_deref()) {
        return response;
    }
    if let Some(response) = validate_size(&request, state.async_max_keywords, "asynchronous") {
        return response;
    }
    let Some(jobs) = state.jobs.as_ref() else {
        return ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "model_unavailable", UNAVAILABLE_MESSAGE);
    };

    let keywords = request.keywords.len();
    match jobs.submit(request).await {
        Ok(task_id) => {
            tracing::info!(task_id = %task_id, keywords, "Clustering task submitted");
            (
                StatusCode::ACCEPTED,
                Json(TaskSubmitted {
                    task_id,
                    status: JobStatus::Pending,
                    message: "Clustering task submitted successfully. Use /results/{task_id} to check status."
                        .to_string(),
                }),
            )
                .into_response()
        }
        Err(KwClusterError::Job(e @ JobError::QueueFull(_))) => {
            ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "queue_full", e.to_string())
        }
        Err(e) => ErrorResponse::reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "submit_failed",
            format!("Failed to submit task: {}", e),
        ),
    }
}

/// GET /results/:task_id - Poll a job.
pub async fn results_handler(
    State(state): State<Arc<ApiState>>,
    Path(task_id): Path<String>,
) -> Response {
    match state.store.get(&task_id).await {
        Some(record) => (StatusCode::OK, Json(TaskResult::from(record))).into_response(),
        None => ErrorResponse::reply(StatusCode::NOT_FOUND, "not_found", "Task not found."),
    }
}

fn rate_limited(
    limiter: Option<&DefaultKeyedRateLimiter<String>>,
    identity: Option<&ClientIdentity>,
) -> Option<Response> {
    let (limiter, identity) = (limiter?, identity?);
    match limiter.check_key(&identity.key) {
        Ok(()) => None,
        Err(_) => {
            tracing::warn!(client = ?identity.client_name, "Rate limit exceeded");
            Some(ErrorResponse::reply(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded",
            ))
        }
    }
}

fn validate_size(request: &ClusterRequest, max: usize, mode: &str) -> Option<Response> {
    let count = request.keywords.len();
    if count == 0 {
        return Some(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            "empty_input",
            "No keywords provided",
        ));
    }
    if count > max {
        return Some(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            "too_many_keywords",
            format!(
                "For {} processing, a maximum of {} keywords is allowed (got {}).",
                mode, max, count
            ),
        ));
    }
    None
}
