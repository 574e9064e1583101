use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::cloud::{
    AwsCleaner, CloudCleaner, CloudCleanupInvoker, GcpCleaner, GcpCredentialsLoader, Provider,
};
use crate::config::{ConfigError, GcpCredentialsConfig, MaintenanceConfig};
use crate::db;
use crate::jobs::{JobQueue, JobRetentionPruner, JobsRepo, PruneReport};
use crate::retention::{Cutoff, RetentionPolicy};

/// Outcome of one phase. Only logged and reported, never persisted.
#[derive(Debug)]
pub enum PhaseResult {
    Ok,
    Skipped,
    Failed(anyhow::Error),
}

impl PhaseResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseResult::Ok => "ok",
            PhaseResult::Skipped => "skipped",
            PhaseResult::Failed(_) => "failed",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, PhaseResult::Ok)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PhaseResult::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PhaseResult::Failed(_))
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub cutoff: Cutoff,
    pub aws: PhaseResult,
    pub gcp: PhaseResult,
    pub jobs: PhaseResult,
    pub prune: Option<PruneReport>,
}

/// Everything the coordinator talks to. `job_queue` is only needed when DB
/// maintenance is enabled.
#[derive(Clone)]
pub struct Collaborators {
    pub aws: Arc<dyn CloudCleaner>,
    pub gcp: Arc<dyn CloudCleaner>,
    pub gcp_credentials: GcpCredentialsLoader,
    pub job_queue: Option<Arc<dyn JobQueue>>,
}

/// Runs the cloud phases side by side, waits for both, then prunes the job
/// queue.
pub struct CleanupCoordinator {
    config: Arc<MaintenanceConfig>,
    policy: RetentionPolicy,
    cutoff: Cutoff,
    cloud: CloudCleanupInvoker,
    pruner: Option<JobRetentionPruner>,
}

impl CleanupCoordinator {
    /// Rejects unusable configuration before anything is launched.
    pub fn new(
        config: MaintenanceConfig,
        cutoff: Cutoff,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.enable_db_maintenance && collaborators.job_queue.is_none() {
            return Err(ConfigError::MissingJobQueue);
        }
        for (slot, cleaner) in [
            (Provider::Aws, &collaborators.aws),
            (Provider::Gcp, &collaborators.gcp),
        ] {
            if cleaner.provider() != slot {
                return Err(ConfigError::ProviderMismatch {
                    slot,
                    got: cleaner.provider(),
                });
            }
        }

        let config = Arc::new(config);
        let policy = RetentionPolicy::new(&config.architectures);
        let cloud = CloudCleanupInvoker::new(
            config.clone(),
            cutoff,
            collaborators.aws,
            collaborators.gcp,
            collaborators.gcp_credentials,
        );
        let pruner = collaborators.job_queue.map(JobRetentionPruner::new);

        Ok(Self {
            config,
            policy,
            cutoff,
            cloud,
            pruner,
        })
    }

    pub async fn run(&self) -> RunReport {
        tracing::info!(cutoff = %self.cutoff, "Cutoff date");
        if self.config.dry_run {
            tracing::info!("Dry run, no state will be changed");
        }

        let aws_task = {
            let cloud = self.cloud.clone();
            tokio::spawn(async move { cloud.aws_phase().await })
        };
        let gcp_task = {
            let cloud = self.cloud.clone();
            tokio::spawn(async move { cloud.gcp_phase().await })
        };

        // both cloud phases settle before the queue is touched
        let (aws, gcp) = tokio::join!(aws_task, gcp_task);
        let aws = aws.unwrap_or_else(|e| {
            tracing::error!(error = %e, "AWS cleanup task aborted");
            PhaseResult::Failed(anyhow::anyhow!("aws phase task failed: {e}"))
        });
        let gcp = gcp.unwrap_or_else(|e| {
            tracing::error!(error = %e, "GCP cleanup task aborted");
            PhaseResult::Failed(anyhow::anyhow!("gcp phase task failed: {e}"))
        });
        tracing::info!("🦀🦀🦀 cloud cleanup done 🦀🦀🦀");

        let (jobs, prune) = self.prune_phase().await;

        tracing::info!(
            aws = aws.as_str(),
            gcp = gcp.as_str(),
            jobs = jobs.as_str(),
            "maintenance run finished"
        );

        RunReport {
            cutoff: self.cutoff,
            aws,
            gcp,
            jobs,
            prune,
        }
    }

    async fn prune_phase(&self) -> (PhaseResult, Option<PruneReport>) {
        if !self.config.enable_db_maintenance {
            tracing::info!("🦀🦀🦀 DB maintenance not enabled, skipping 🦀🦀🦀");
            return (PhaseResult::Skipped, None);
        }

        let Some(pruner) = &self.pruner else {
            return (
                PhaseResult::Failed(ConfigError::MissingJobQueue.into()),
                None,
            );
        };

        let job_types = self.policy.job_types();
        match pruner.prune(&job_types, self.cutoff, self.config.dry_run).await {
            Ok(report) => {
                tracing::info!(
                    matched = report.matched_count(),
                    deleted = report.deleted_roots.len(),
                    removed = report.removed_jobs,
                    failed = report.failed.len(),
                    "🦀🦀🦀 dbqueue cleanup done 🦀🦀🦀"
                );
                (PhaseResult::Ok, Some(report))
            }
            Err(e) => {
                tracing::error!(error = %e, "Error querying jobs");
                (PhaseResult::Failed(e), None)
            }
        }
    }
}

/// Wire up the real collaborators and run once. Only configuration problems
/// (including an unreachable job queue) produce a failing exit code; phase
/// failures are logged and the run still succeeds.
pub async fn run(config: MaintenanceConfig) -> ExitCode {
    match prepare(config).await {
        Ok(coordinator) => {
            coordinator.run().await;
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "fatal configuration error");
            ExitCode::FAILURE
        }
    }
}

async fn prepare(config: MaintenanceConfig) -> anyhow::Result<CleanupCoordinator> {
    config.validate()?;

    let policy = RetentionPolicy::new(&config.architectures);
    let cutoff = policy.cutoff_now();

    let job_queue: Option<Arc<dyn JobQueue>> = if config.enable_db_maintenance {
        let repo = JobsRepo::connect(config.postgres.connect_options()?)
            .await
            .context("connecting to job queue")?;
        if config.runs_migrations() {
            db::run_migrations(repo.pool()).await?;
        } else if config.migrate_on_startup {
            tracing::info!("Dry run, skipping migrations");
        }
        Some(Arc::new(repo))
    } else {
        None
    };

    let collaborators = Collaborators {
        aws: Arc::new(AwsCleaner::default()),
        gcp: Arc::new(GcpCleaner::default()),
        gcp_credentials: Arc::new(GcpCredentialsConfig::from_env),
        job_queue,
    };

    Ok(CleanupCoordinator::new(config, cutoff, collaborators)?)
}
