//! TTL-bounded job record store.

use std::time::Duration;

use moka::future::Cache;

use super::JobRecord;

/// In-memory job records, expired `keep_result_secs` after their last update.
#[derive(Clone)]
pub struct JobStore {
    records: Cache<String, JobRecord>,
}

impl JobStore {
    pub fn new(keep_result_secs: u64) -> Self {
        let records = Cache::builder()
            .time_to_live(Duration::from_secs(keep_result_secs.max(1)))
            .build();
        Self { records }
    }

    pub async fn get(&self, task_id: &str) -> Option<JobRecord> {
        self.records.get(task_id).await
    }

    pub async fn put(&self, record: JobRecord) {
        self.records.insert(record.task_id.clone(), record).await;
    }

    /// Apply `f` to an existing record. Returns false if the record expired.
    pub async fn update<F>(&self, task_id: &str, f: F) -> bool
    where
        F: FnOnce(JobRecord) -> JobRecord,
    {
        match self.records.get(task_id).await {
            Some(record) => {
                self.put(f(record)).await;
                true
            }
            None => false,
        }
    }

    /// Number of live records.
    pub async fn len(&self) -> u64 {
        self.records.run_pending_tasks().await;
        self.records.entry_count()
    }
}
