use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::jobs::model::JobTypeKey;

pub const RETENTION_DAYS: i64 = 14;
pub const JOB_KIND: &str = "osbuild";

/// The retention boundary for one run. Anything created at or before it is
/// eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cutoff(DateTime<Utc>);

impl Cutoff {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// At or before the cutoff. Every phase decides "old enough" with this.
    pub fn is_expired(&self, t: DateTime<Utc>) -> bool {
        t <= self.0
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub retention: Duration,
    pub job_kind: String,
    pub architectures: Vec<String>,
}

impl RetentionPolicy {
    pub fn new(architectures: &[String]) -> Self {
        Self {
            retention: Duration::days(RETENTION_DAYS),
            job_kind: JOB_KIND.to_string(),
            architectures: architectures.to_vec(),
        }
    }

    pub fn cutoff_from(&self, now: DateTime<Utc>) -> Cutoff {
        Cutoff(now - self.retention)
    }

    /// Convenience: the cutoff relative to the wall clock. Call once per run.
    pub fn cutoff_now(&self) -> Cutoff {
        self.cutoff_from(Utc::now())
    }

    /// `{kind}:{arch}` for every configured architecture, deduplicated and sorted.
    pub fn job_types(&self) -> Vec<JobTypeKey> {
        let mut keys: Vec<JobTypeKey> = self
            .architectures
            .iter()
            .map(|arch| JobTypeKey::new(&self.job_kind, arch))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}
