use chrono::{DateTime, Utc};

use serde_json::Value;

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// `{kind}:{architecture}`, the `type` column of the queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobTypeKey {
    pub kind: String,
    pub arch: String,
}

impl JobTypeKey {
    pub fn new(kind: &str, arch: &str) -> Self {
        Self {
            kind: kind.to_string(),
            arch: arch.to_string(),
        }
    }
}

impl fmt::Display for JobTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.arch)
    }
}

impl FromStr for JobTypeKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((kind, arch)) if !kind.is_empty() && !arch.is_empty() => {
                Ok(Self::new(kind, arch))
            }
            _ => anyhow::bail!("invalid job type key: {s:?}"),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRecord {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    pub job_type: String,
    pub args: Value,

    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub canceled: bool,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub args: Value,
    pub queued_at: DateTime<Utc>,
    // ids this job depends on; they must already exist
    pub dependencies: Vec<Uuid>,
}
