use buildsweep::config::MaintenanceConfig;
use buildsweep::logging;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();

    let cfg = match MaintenanceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "unable to load maintenance config");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        dry_run = cfg.dry_run,
        max_concurrent_requests = cfg.max_concurrent_requests,
        aws = cfg.enable_aws_maintenance,
        gcp = cfg.enable_gcp_maintenance,
        db = cfg.enable_db_maintenance,
        architectures = ?cfg.architectures,
        "service maintenance starting"
    );

    buildsweep::run(cfg).await
}
