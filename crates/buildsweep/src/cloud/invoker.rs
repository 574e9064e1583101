use std::sync::Arc;

use crate::cloud::aws::AWS_REGION;
use crate::cloud::{CleanupRequest, CloudCleaner, CloudCredentials};
use crate::config::{ConfigError, GcpCredentialsConfig, MaintenanceConfig};
use crate::coordinator::PhaseResult;
use crate::retention::Cutoff;

pub type GcpCredentialsLoader =
    Arc<dyn Fn() -> Result<GcpCredentialsConfig, ConfigError> + Send + Sync>;

/// Runs one provider's cleanup collaborator per phase, deciding whether it
/// runs at all and turning its outcome into a `PhaseResult`. Each phase is
/// self-contained so the coordinator can run them side by side.
#[derive(Clone)]
pub struct CloudCleanupInvoker {
    config: Arc<MaintenanceConfig>,
    cutoff: Cutoff,
    aws: Arc<dyn CloudCleaner>,
    gcp: Arc<dyn CloudCleaner>,
    gcp_credentials: GcpCredentialsLoader,
}

impl CloudCleanupInvoker {
    pub fn new(
        config: Arc<MaintenanceConfig>,
        cutoff: Cutoff,
        aws: Arc<dyn CloudCleaner>,
        gcp: Arc<dyn CloudCleaner>,
        gcp_credentials: GcpCredentialsLoader,
    ) -> Self {
        Self {
            config,
            cutoff,
            aws,
            gcp,
            gcp_credentials,
        }
    }

    pub async fn aws_phase(&self) -> PhaseResult {
        if !self.config.enable_aws_maintenance {
            tracing::info!("AWS maintenance not enabled, skipping");
            return PhaseResult::Skipped;
        }

        tracing::info!("Cleaning up AWS");
        let request = CleanupRequest {
            max_concurrency: self.config.max_concurrent_requests,
            dry_run: self.config.dry_run,
            credentials: CloudCredentials::AwsStatic {
                access_key_id: self.config.aws.access_key_id.clone(),
                secret_access_key: self.config.aws.secret_access_key.clone(),
            },
            region: Some(AWS_REGION.to_string()),
            cutoff: self.cutoff,
        };

        match self.aws.cleanup(request).await {
            Ok(summary) => {
                tracing::info!(
                    provider = %self.aws.provider(),
                    expired = summary.expired,
                    deleted = summary.deleted,
                    failed = summary.failed,
                    "AWS cleanup finished"
                );
                PhaseResult::Ok
            }
            Err(e) => {
                tracing::error!(provider = %self.aws.provider(), error = %e, "AWS cleanup failed");
                PhaseResult::Failed(e)
            }
        }
    }

    pub async fn gcp_phase(&self) -> PhaseResult {
        if !self.config.enable_gcp_maintenance {
            tracing::info!("GCP maintenance not enabled, skipping");
            return PhaseResult::Skipped;
        }

        tracing::info!("Cleaning up GCP");
        let gcp_conf = match (self.gcp_credentials)() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Unable to load GCP config from environment");
                return PhaseResult::Failed(e.into());
            }
        };

        if !gcp_conf.valid() {
            tracing::error!("GCP credentials invalid, fields missing");
            return PhaseResult::Failed(anyhow::anyhow!("GCP credentials invalid, fields missing"));
        }

        let creds = match gcp_conf.to_json() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Unable to marshal gcp conf");
                return PhaseResult::Failed(e);
            }
        };

        let request = CleanupRequest {
            max_concurrency: self.config.max_concurrent_requests,
            dry_run: self.config.dry_run,
            credentials: CloudCredentials::GcpServiceAccount(creds),
            region: None,
            cutoff: self.cutoff,
        };

        match self.gcp.cleanup(request).await {
            Ok(summary) => {
                tracing::info!(
                    provider = %self.gcp.provider(),
                    expired = summary.expired,
                    deleted = summary.deleted,
                    failed = summary.failed,
                    "GCP cleanup finished"
                );
                PhaseResult::Ok
            }
            Err(e) => {
                tracing::error!(provider = %self.gcp.provider(), error = %e, "GCP Cleanup failed");
                PhaseResult::Failed(e)
            }
        }
    }
}
