use std::fmt;

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

/// Region the region listing is issued against.
pub const AWS_REGION: &str = "us-east-1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeRegions {
    #[serde(default)]
    pub regions: Vec<AwsRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsRegion {
    pub region_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeImages {
    #[serde(default)]
    pub images: Vec<AwsImage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AwsImage {
    pub image_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub creation_date: String,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDeviceMapping {
    #[serde(default)]
    pub ebs: Option<EbsBlockDevice>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbsBlockDevice {
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

impl AwsImage {
    pub fn snapshot_ids(&self) -> Vec<String> {
        self.block_device_mappings
            .iter()
            .filter_map(|m| m.ebs.as_ref().and_then(|ebs| ebs.snapshot_id.clone()))
            .collect()
    }
}

/// Images created at or before the cutoff. An unreadable creation date
/// never selects an image.
pub fn expired_images(images: Vec<AwsImage>, cutoff: Cutoff) -> Vec<AwsImage> {
    images
        .into_iter()
        .filter(|image| match DateTime::parse_from_rfc3339(&image.creation_date) {
            Ok(created) => cutoff.is_expired(created.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(
                    image_id = %image.image_id,
                    creation_date = %image.creation_date,
                    error = %e,
                    "skipping aws image with unparseable creation date"
                );
                false
            }
        })
        .collect()
}

struct Target {
    region: String,
    image: AwsImage,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.image.image_id)
    }
}

/// Deregisters expired composer AMIs and their backing snapshots in every
/// region, through the `aws` CLI.
#[derive(Clone, Debug)]
pub struct AwsCleaner {
    program: String,
}

impl Default for AwsCleaner {
    fn default() -> Self {
        Self::new("aws")
    }
}

impl AwsCleaner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn cli(&self, credentials: &CloudCredentials) -> anyhow::Result<CliTool> {
        let CloudCredentials::AwsStatic {
            access_key_id,
            secret_access_key,
        } = credentials
        else {
            anyhow::bail!("aws cleanup requires static aws credentials");
        };

        Ok(CliTool::new(&self.program)
            .env("AWS_ACCESS_KEY_ID", access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", secret_access_key)
            .env("AWS_PAGER", ""))
    }
}

async fn remove_snapshot_and_deregister_image(
    cli: &CliTool,
    target: &Target,
) -> anyhow::Result<()> {
    let region = target.region.as_str();
    let image_id = target.image.image_id.as_str();

    cli.run(&[
        "ec2",
        "deregister-image",
        "--image-id",
        image_id,
        "--region",
        region,
    ])
    .await?;

    for snapshot_id in target.image.snapshot_ids() {
        cli.run(&[
            "ec2",
            "delete-snapshot",
            "--snapshot-id",
            &snapshot_id,
            "--region",
            region,
        ])
        .await?;
    }

    Ok(())
}

#[async_trait]
impl CloudCleaner for AwsCleaner {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    async fn cleanup(&self, request: CleanupRequest) -> anyhow::Result<CleanupSummary> {
        let cli = self.cli(&request.credentials)?;
        let home_region = request.region.as_deref().unwrap_or(AWS_REGION);

        let regions: DescribeRegions = cli
            .json(&[
                "ec2",
                "describe-regions",
                "--region",
                home_region,
                "--output",
                "json",
            ])
            .await
            .context("listing aws regions")?;

        let name_filter = format!("Name=tag:Name,Values={IMAGE_NAME_PREFIX}*");
        let mut summary = CleanupSummary::default();

        for region in regions.regions.into_iter().map(|r| r.region_name) {
            let images: DescribeImages = cli
                .json(&[
                    "ec2",
                    "describe-images",
                    "--owners",
                    "self",
                    "--filters",
                    &name_filter,
                    "--region",
                    &region,
                    "--output",
                    "json",
                ])
                .await
                .with_context(|| format!("listing aws images in {region}"))?;

            let expired = expired_images(images.images, request.cutoff);
            summary.expired += expired.len();

            if request.dry_run {
                for image in &expired {
                    tracing::info!(
                        image_id = %image.image_id,
                        %region,
                        creation_date = %image.creation_date,
                        "Dry run, aws image would be removed"
                    );
                }
                continue;
            }

            let targets: Vec<Target> = expired
                .into_iter()
                .map(|image| Target {
                    region: region.clone(),
                    image,
                })
                .collect();

            let worker_cli = cli.clone();
            let done = delete_bounded(targets, request.max_concurrency, move |target| {
                let cli = worker_cli.clone();
                async move {
                    remove_snapshot_and_deregister_image(&cli, &target).await?;
                    tracing::info!(image = %target, "removed aws image");
                    Ok::<(), anyhow::Error>(())
                }
            })
            .await?;
            summary.absorb(CleanupSummary { expired: 0, ..done });
        }

        Ok(summary)
    }
}
