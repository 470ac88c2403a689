//! Bounded job queue with a fixed worker pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clustering::{ClusterRequest, ClusteringOutput, ClusteringPipeline};
use crate::config::JobsConfig;
use crate::error::{JobError, Result};

use super::{JobRecord, JobStore};

/// Something that can execute a clustering request.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, request: ClusterRequest) -> Result<ClusteringOutput>;
}

#[async_trait]
impl JobRunner for ClusteringPipeline {
    async fn run(&self, request: ClusterRequest) -> Result<ClusteringOutput> {
        ClusteringPipeline::run(self, request).await
    }
}

struct QueuedJob {
    task_id: String,
    request: ClusterRequest,
}

/// Handle for submitting jobs. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    store: JobStore,
    capacity: usize,
}

impl JobQueue {
    /// Start `max_jobs` workers draining a queue of `queue_capacity` jobs.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(runner: Arc<dyn JobRunner>, store: JobStore, config: &JobsConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<QueuedJob>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let timeout = Duration::from_secs(config.job_timeout_secs.max(1));

        let workers = config.max_jobs.max(1);
        for worker in 0..workers {
            let receiver = receiver.clone();
            let runner = runner.clone();
            let store = store.clone();
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else {
                        debug!(worker, "Job queue closed, worker exiting");
                        break;
                    };
                    execute(worker, job, runner.clone(), &store, timeout).await;
                }
            });
        }

        info!(workers, capacity, "Job workers started");
        Self {
            sender,
            store,
            capacity,
        }
    }

    /// Enqueue a request and return its task id.
    ///
    /// The job is recorded as pending before it is queued, so the id can be
    /// polled immediately.
    pub async fn submit(&self, request: ClusterRequest) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        self.store.put(JobRecord::pending(&task_id)).await;

        let job = QueuedJob {
            task_id: task_id.clone(),
            request,
        };
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!(task_id = %task_id, "Job queued");
                Ok(task_id)
            }
            Err(e) => {
                let err = match e {
                    mpsc::error::TrySendError::Full(_) => JobError::QueueFull(self.capacity),
                    mpsc::error::TrySendError::Closed(_) => JobError::QueueClosed,
                };
                self.store
                    .update(&task_id, |r| r.failed(err.to_string()))
                    .await;
                Err(err.into())
            }
        }
    }

    /// Look up a job record.
    pub async fn status(&self, task_id: &str) -> Result<JobRecord> {
        self.store
            .get(task_id)
            .await
            .ok_or_else(|| JobError::NotFound(task_id.to_string()).into())
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }
}

/// Run one job to a terminal state.
///
/// The run happens on its own task so a panic inside the pipeline fails the
/// job instead of the worker. A job that times out is marked failed at once,
/// but the worker does not take another job until the run has returned.
async fn execute(
    worker: usize,
    job: QueuedJob,
    runner: Arc<dyn JobRunner>,
    store: &JobStore,
    timeout: Duration,
) {
    let QueuedJob { task_id, request } = job;
    if !store.update(&task_id, |r| r.started()).await {
        warn!(task_id = %task_id, "Job record expired before start, skipping");
        return;
    }
    info!(worker, task_id = %task_id, keywords = request.keywords.len(), "Job started");

    let mut handle = tokio::spawn(async move { runner.run(request).await });

    let mut timed_out = false;
    let outcome = match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(Ok(output))) => Ok(output),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(join)) => Err(format!("Job panicked: {}", join)),
        Err(_) => {
            timed_out = true;
            Err(JobError::Timeout(timeout.as_secs()).to_string())
        }
    };

    match outcome {
        Ok(output) => {
            info!(
                task_id = %task_id,
                clusters = output.summary.total_clusters_found,
                "Job completed"
            );
            store.update(&task_id, |r| r.completed(output)).await;
        }
        Err(error) => {
            warn!(task_id = %task_id, error = %error, "Job failed");
            store.update(&task_id, |r| r.failed(error)).await;
        }
    }

    // Clustering runs on the blocking pool and cannot be interrupted, so the
    // worker stays busy until the abandoned run actually ends.
    if timed_out {
        let _ = handle.await;
        debug!(worker, task_id = %task_id, "Timed out run finished, worker released");
    }
}
