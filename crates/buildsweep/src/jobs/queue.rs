use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::jobs::model::JobTypeKey;
use crate::retention::Cutoff;

/// What the pruner needs from the job-queue store.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Ids of jobs of the given types queued at or before `cutoff`, grouped
    /// by type. Types without matches are absent from the map.
    async fn jobs_upto_by_type(
        &self,
        job_types: &[JobTypeKey],
        cutoff: Cutoff,
    ) -> anyhow::Result<BTreeMap<JobTypeKey, Vec<Uuid>>>;

    /// Delete `job_id` and every job that transitively depends on it.
    /// Returns how many jobs were removed; 0 if `job_id` no longer exists.
    async fn delete_job_including_dependents(&self, job_id: Uuid) -> anyhow::Result<u64>;
}
