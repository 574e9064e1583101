// crates/buildsweep/src/jobs/repo.rs

use crate::jobs::model::{JobRecord, JobTypeKey, NewJob};
use crate::jobs::queue::JobQueue;
use crate::retention::Cutoff;
use async_trait::async_trait;
use sqlx::{postgres::PgConnectOptions, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(options: PgConnectOptions) -> anyhow::Result<Self> {
        let pool = crate::db::make_pool_with(options).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ----------------------------
    // Enqueue
    // ----------------------------

    /// Insert a job and its dependency edges in one transaction.
    /// Fails if any dependency does not exist.
    pub async fn enqueue(&self, job: NewJob) -> anyhow::Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (type, args, queued_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&job.job_type)
        .bind(&job.args)
        .bind(job.queued_at)
        .fetch_one(&mut *tx)
        .await?;

        for dep in &job.dependencies {
            sqlx::query(
                r#"
                INSERT INTO job_dependencies (job_id, dependency_id)
                VALUES ($1, $2)
                "#,
            )
            .bind(id)
            .bind(dep)
            .execute(&mut *tx)
            .await
            .map_err(|e| anyhow::anyhow!("dependency {dep} of new job rejected: {e}"))?;
        }

        tx.commit().await?;
        Ok(id)
    }

    // ----------------------------
    // Reads
    // ----------------------------

    pub async fn get_job(&self, job_id: Uuid) -> anyhow::Result<Option<JobRecord>> {
        let job = sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT id, type, args, queued_at, started_at, finished_at, canceled
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    /// Direct dependents only (jobs that list `job_id` as a dependency).
    pub async fn dependents(&self, job_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT job_id
            FROM job_dependencies
            WHERE dependency_id = $1
            ORDER BY job_id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl JobQueue for JobsRepo {
    async fn jobs_upto_by_type(
        &self,
        job_types: &[JobTypeKey],
        cutoff: Cutoff,
    ) -> anyhow::Result<BTreeMap<JobTypeKey, Vec<Uuid>>> {
        let types: Vec<String> = job_types.iter().map(ToString::to_string).collect();

        // inclusive, same boundary as Cutoff::is_expired
        let rows: Vec<(String, Vec<Uuid>)> = sqlx::query_as(
            r#"
            SELECT type, array_agg(id ORDER BY queued_at, id)
            FROM jobs
            WHERE type = ANY($1)
              AND queued_at <= $2
            GROUP BY type
            "#,
        )
        .bind(&types)
        .bind(cutoff.instant())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped = BTreeMap::new();
        for (job_type, ids) in rows {
            grouped.insert(job_type.parse::<JobTypeKey>()?, ids);
        }
        Ok(grouped)
    }

    async fn delete_job_including_dependents(&self, job_id: Uuid) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        // root plus everything that (transitively) depends on it
        let doomed: Vec<Uuid> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE doomed(id) AS (
                SELECT id FROM jobs WHERE id = $1
                UNION
                SELECT d.job_id
                FROM job_dependencies d
                JOIN doomed ON d.dependency_id = doomed.id
            )
            SELECT id FROM doomed
            "#,
        )
        .bind(job_id)
        .fetch_all(&mut *tx)
        .await?;

        // already gone, e.g. removed by an earlier cascade
        if doomed.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        sqlx::query(
            r#"
            DELETE FROM job_dependencies
            WHERE job_id = ANY($1) OR dependency_id = ANY($1)
            "#,
        )
        .bind(&doomed)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE id = ANY($1)
            "#,
        )
        .bind(&doomed)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }
}
