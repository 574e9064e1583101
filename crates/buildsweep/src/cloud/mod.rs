pub mod aws;
pub mod cli;
pub mod gcp;
pub mod invoker;

pub use aws::AwsCleaner;
pub use gcp::GcpCleaner;
pub use invoker::{CloudCleanupInvoker, GcpCredentialsLoader};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::retention::Cutoff;

/// Only AMIs/images whose name carries this prefix are ever considered.
pub const IMAGE_NAME_PREFIX: &str = "composer-api-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Aws,
    Gcp,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Gcp => "gcp",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub enum CloudCredentials {
    AwsStatic {
        access_key_id: String,
        secret_access_key: String,
    },
    // service-account JSON
    GcpServiceAccount(String),
}

// never print key material
impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudCredentials::AwsStatic { access_key_id, .. } => f
                .debug_struct("AwsStatic")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<redacted>")
                .finish(),
            CloudCredentials::GcpServiceAccount(_) => {
                f.debug_tuple("GcpServiceAccount").field(&"<redacted>").finish()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupRequest {
    /// Upper bound on in-flight delete requests against the cloud API.
    pub max_concurrency: usize,
    pub dry_run: bool,
    pub credentials: CloudCredentials,
    pub region: Option<String>,
    pub cutoff: Cutoff,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl CleanupSummary {
    pub fn absorb(&mut self, other: CleanupSummary) {
        self.expired += other.expired;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }
}

/// A provider-specific cleanup routine. Implementations enumerate expired
/// resources, honor `dry_run`, and rate-limit themselves to
/// `max_concurrency` in-flight deletes.
#[async_trait]
pub trait CloudCleaner: Send + Sync {
    fn provider(&self) -> Provider;

    async fn cleanup(&self, request: CleanupRequest) -> anyhow::Result<CleanupSummary>;
}

/// Run `delete` over `items` with at most `max_concurrency` in flight.
/// Per-item failures are logged and counted, never returned.
pub(crate) async fn delete_bounded<T, F, Fut>(
    items: Vec<T>,
    max_concurrency: usize,
    delete: F,
) -> anyhow::Result<CleanupSummary>
where
    T: fmt::Display + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    // Semaphore::new panics above MAX_PERMITS
    let permits = max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
    let semaphore = Arc::new(Semaphore::new(permits));
    let delete = Arc::new(delete);
    let mut summary = CleanupSummary::default();
    let mut join_set = JoinSet::new();

    for item in items {
        let permit = semaphore.clone().acquire_owned().await?;
        let delete = delete.clone();
        join_set.spawn(async move {
            let _permit = permit;
            let label = item.to_string();
            (label, delete(item).await)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((_, Ok(()))) => summary.deleted += 1,
            Ok((label, Err(e))) => {
                tracing::error!(resource = %label, error = %e, "cleanup of resource failed");
                summary.failed += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "cleanup task panicked");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
