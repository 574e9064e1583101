use std::io::Write;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cloud::cli::CliTool;
use crate::cloud::{
    delete_bounded, CleanupRequest, CleanupSummary, CloudCleaner, CloudCredentials, Provider,
    IMAGE_NAME_PREFIX,
};
use crate::retention::Cutoff;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpImage {
    pub name: String,
    pub creation_timestamp: String,
}

#[derive(Deserialize)]
struct ServiceAccountProject {
    project_id: String,
}

/// Images created at or before the cutoff.
pub fn expired_images(images: Vec<GcpImage>, cutoff: Cutoff) -> Vec<GcpImage> {
    images
        .into_iter()
        .filter(|image| match DateTime::parse_from_rfc3339(&image.creation_timestamp) {
            Ok(created) => cutoff.is_expired(created.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(
                    image = %image.name,
                    creation_timestamp = %image.creation_timestamp,
                    error = %e,
                    "skipping gcp image with unparseable creation timestamp"
                );
                false
            }
        })
        .collect()
}

/// Deletes expired composer images from the service account's project,
/// through the `gcloud` CLI.
#[derive(Clone, Debug)]
pub struct GcpCleaner {
    program: String,
}

impl Default for GcpCleaner {
    fn default() -> Self {
        Self::new("gcloud")
    }
}

impl GcpCleaner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CloudCleaner for GcpCleaner {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    async fn cleanup(&self, request: CleanupRequest) -> anyhow::Result<CleanupSummary> {
        let CloudCredentials::GcpServiceAccount(creds) = &request.credentials else {
            anyhow::bail!("gcp cleanup requires service account credentials");
        };

        let project: ServiceAccountProject =
            serde_json::from_str(creds).context("parsing gcp service account credentials")?;

        // gcloud reads the key from a file; it lives until this call returns
        let mut key_file = tempfile::NamedTempFile::new().context("creating gcp key file")?;
        key_file.write_all(creds.as_bytes())?;
        key_file.flush()?;

        let cli = CliTool::new(&self.program)
            .env(
                "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE",
                key_file.path().display().to_string(),
            )
            .env("CLOUDSDK_CORE_PROJECT", project.project_id)
            .env("CLOUDSDK_CORE_DISABLE_PROMPTS", "1");

        let name_filter = format!("--filter=name~^{IMAGE_NAME_PREFIX}");
        let images: Vec<GcpImage> = cli
            .json(&[
                "compute",
                "images",
                "list",
                "--no-standard-images",
                &name_filter,
                "--format=json",
            ])
            .await
            .context("listing gcp images")?;

        let expired = expired_images(images, request.cutoff);
        let expired_count = expired.len();

        if request.dry_run {
            for image in &expired {
                tracing::info!(
                    image = %image.name,
                    creation_timestamp = %image.creation_timestamp,
                    "Dry run, gcp image would be removed"
                );
            }
            return Ok(CleanupSummary {
                expired: expired_count,
                ..Default::default()
            });
        }

        let names: Vec<String> = expired.into_iter().map(|image| image.name).collect();
        let worker_cli = cli.clone();
        let done = delete_bounded(names, request.max_concurrency, move |name| {
            let cli = worker_cli.clone();
            async move {
                cli.run(&["compute", "images", "delete", &name, "--quiet"])
                    .await?;
                tracing::info!(image = %name, "removed gcp image");
                Ok::<(), anyhow::Error>(())
            }
        })
        .await?;

        drop(key_file);

        Ok(CleanupSummary {
            expired: expired_count,
            ..done
        })
    }
}
