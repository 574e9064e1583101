use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::jobs::model::JobTypeKey;
use crate::jobs::queue::JobQueue;
use crate::retention::Cutoff;

#[derive(Debug, Default, Clone)]
pub struct PruneReport {
    pub dry_run: bool,
    pub matched: BTreeMap<JobTypeKey, Vec<Uuid>>,
    // root jobs whose cascade went through
    pub deleted_roots: Vec<Uuid>,
    // rows removed, dependents included
    pub removed_jobs: u64,
    pub failed: Vec<Uuid>,
}

impl PruneReport {
    pub fn matched_count(&self) -> usize {
        self.matched.values().map(Vec::len).sum()
    }
}

/// Deletes expired jobs (and whatever depends on them) from the queue.
#[derive(Clone)]
pub struct JobRetentionPruner {
    queue: Arc<dyn JobQueue>,
}

impl JobRetentionPruner {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// A query failure aborts the pass and is returned. Delete failures are
    /// per job: logged, recorded in the report, and skipped over.
    pub async fn prune(
        &self,
        job_types: &[JobTypeKey],
        cutoff: Cutoff,
        dry_run: bool,
    ) -> anyhow::Result<PruneReport> {
        let matched = self
            .queue
            .jobs_upto_by_type(job_types, cutoff)
            .await
            .map_err(|e| e.context("querying expired jobs"))?;

        let mut report = PruneReport {
            dry_run,
            ..Default::default()
        };

        for (job_type, ids) in &matched {
            tracing::info!(%job_type, count = ids.len(), "Deleting jobs and their dependents");

            if dry_run {
                tracing::info!(%job_type, jobs = ?ids, "Dry run, skipping deletion of jobs");
                continue;
            }

            for &job_id in ids {
                match self.queue.delete_job_including_dependents(job_id).await {
                    Ok(0) => {
                        tracing::debug!(%job_id, "job already removed");
                    }
                    Ok(removed) => {
                        tracing::debug!(%job_id, removed, "deleted job");
                        report.deleted_roots.push(job_id);
                        report.removed_jobs += removed;
                    }
                    Err(e) => {
                        tracing::error!(%job_id, error = %e, "Error deleting job");
                        report.failed.push(job_id);
                    }
                }
            }
        }

        report.matched = matched;
        Ok(report)
    }
}
