use buildsweep::db;
use buildsweep::jobs::{JobQueue, JobsRepo, NewJob};
use buildsweep::retention::{RetentionPolicy, JOB_KIND};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::env;
use uuid::Uuid;

const USAGE: &str = "sweepctl <command>\n\
     Commands:\n\
     - migrate\n\
     - reset\n\
     - seed <n> <age_days> [type]\n\
     - expired [arch...]\n\
     - delete <job_id>\n\
     \n\
     Uses DATABASE_URL or TEST_DATABASE_URL.\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    let url = env::var("DATABASE_URL")
        .or_else(|_| env::var("TEST_DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or TEST_DATABASE_URL must be set"))?;

    let pool = db::make_pool(&url).await?;
    let repo = JobsRepo::new(pool.clone());

    match args[1].as_str() {
        "migrate" => {
            db::run_migrations(&pool).await?;
            println!("migrations OK");
        }
        "reset" => reset(&pool).await?,
        "seed" => {
            let n: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);
            let age_days: i64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(20);
            let job_type = args
                .get(4)
                .cloned()
                .unwrap_or_else(|| format!("{JOB_KIND}:x86_64"));
            seed(&repo, n, age_days, &job_type).await?;
        }
        "expired" => {
            let archs: Vec<String> = if args.len() > 2 {
                args[2..].to_vec()
            } else {
                vec!["x86_64".to_string()]
            };
            show_expired(&repo, &archs).await?;
        }
        "delete" => {
            let id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("usage: sweepctl delete <job_id>"))?;
            let job_id: Uuid = id.parse()?;
            let removed = repo.delete_job_including_dependents(job_id).await?;
            println!("deleted {job_id} (+ dependents): {removed} jobs removed");
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

async fn reset(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            job_dependencies,
            jobs
        CASCADE
        "#,
    )
    .execute(pool)
    .await?;

    println!("reset OK");
    Ok(())
}

/// Each chain is a root job plus one job depending on it, both `age_days` old.
async fn seed(repo: &JobsRepo, n: usize, age_days: i64, job_type: &str) -> anyhow::Result<()> {
    let queued_at = Utc::now() - Duration::days(age_days);

    for i in 0..n {
        let root = repo
            .enqueue(NewJob {
                job_type: job_type.to_string(),
                args: json!({ "seed": i }),
                queued_at,
                dependencies: vec![],
            })
            .await?;

        let dependent = repo
            .enqueue(NewJob {
                job_type: job_type.to_string(),
                args: json!({ "seed": i, "depends_on": root }),
                queued_at,
                dependencies: vec![root],
            })
            .await?;

        println!("+ inserted {job_type} root={root} dependent={dependent}");
    }
    Ok(())
}

async fn show_expired(repo: &JobsRepo, archs: &[String]) -> anyhow::Result<()> {
    let policy = RetentionPolicy::new(archs);
    let cutoff = policy.cutoff_now();
    let grouped = repo.jobs_upto_by_type(&policy.job_types(), cutoff).await?;

    println!("cutoff: {cutoff}");
    if grouped.is_empty() {
        println!("nothing to prune");
    }
    for (job_type, ids) in grouped {
        println!("{job_type}: {} jobs", ids.len());
        for id in ids {
            let dependents = repo.dependents(id).await?;
            println!("  {id} (direct dependents: {})", dependents.len());
        }
    }
    Ok(())
}
