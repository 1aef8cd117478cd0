use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use clap::Parser;
use dotenvy::dotenv;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use aq_common::config::QueueConfig;
use aq_common::db::application_queue::{
    claim_next_queued, mark_item_completed, mark_item_failed, recover_stuck_items,
};
use aq_common::db::migrations::run_migrations;
use aq_common::db::pool::connect;
use aq_common::queue::application_queue::QueueItem;
use aq_common::queue::retry::RetryScheduler;
use aq_common::service::{BrowserAutomationAgent, Outcome};
use aq_common::CandidateProfile;

#[derive(Parser, Debug)]
#[command(about = "Claims queued job applications and runs them through the automation agent")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: String,

    /// Worker id recorded into the queue
    #[arg(long, default_value = "aq-dispatcher")]
    worker_id: String,

    /// Command executed per application; receives the job URL as its
    /// argument and the item + profile as JSON on stdin
    #[arg(long, env = "AQ_AGENT_CMD")]
    agent_cmd: String,

    /// Directory containing one `<candidate_id>.json` profile per candidate
    #[arg(long, env = "AQ_PROFILE_DIR")]
    profile_dir: PathBuf,

    /// Optional cap on how many items to process in one run
    #[arg(long)]
    max_items: Option<usize>,

    /// Exit when the queue is empty instead of polling
    #[arg(long, default_value_t = false)]
    exit_on_empty: bool,

    /// Idle poll interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    idle_poll_interval_ms: u64,
}

fn load_profile(dir: &Path, candidate_id: i64) -> Result<CandidateProfile, String> {
    let path = dir.join(format!("{candidate_id}.json"));
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read profile {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid profile {}: {e}", path.display()))
}

/// Agent that shells out to an external automation command. Exit code zero
/// means the application was submitted; the last stdout line becomes the
/// outcome message either way.
struct CommandAgent {
    command: String,
}

#[async_trait]
impl BrowserAutomationAgent for CommandAgent {
    async fn apply(&self, item: &QueueItem, profile: &CandidateProfile) -> Outcome {
        let payload = match serde_json::to_vec(&serde_json::json!({
            "item": item,
            "profile": profile,
        })) {
            Ok(payload) => payload,
            Err(err) => {
                return Outcome {
                    success: false,
                    message: format!("cannot serialize agent payload: {err}"),
                }
            }
        };

        let mut child = match Command::new(&self.command)
            .arg(&item.job_url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return Outcome {
                    success: false,
                    message: format!("cannot spawn agent {}: {err}", self.command),
                }
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            // An agent may decide from the URL alone and exit without ever
            // reading stdin; a broken pipe here is not a failure.
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        }

        match child.wait_with_output().await {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let message = stdout
                    .lines()
                    .rev()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or(if output.status.success() {
                        "submitted"
                    } else {
                        "agent reported failure"
                    })
                    .to_string();
                Outcome {
                    success: output.status.success(),
                    message,
                }
            }
            Err(err) => Outcome {
                success: false,
                message: format!("agent did not finish: {err}"),
            },
        }
    }
}

async fn process_item(
    pool: &aq_common::db::PgPool,
    cli: &Cli,
    config: &QueueConfig,
    agent: &CommandAgent,
    scheduler: &RetryScheduler,
    item: QueueItem,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = match load_profile(&cli.profile_dir, item.candidate_id) {
        Ok(profile) => {
            let apply_timeout = StdDuration::from_secs(config.apply_timeout_secs);
            match timeout(apply_timeout, agent.apply(&item, &profile)).await {
                Ok(outcome) => outcome,
                Err(_) => Outcome {
                    success: false,
                    message: format!("automation timed out after {}s", apply_timeout.as_secs()),
                },
            }
        }
        Err(message) => Outcome {
            success: false,
            message,
        },
    };

    let now = Utc::now();
    if outcome.success {
        mark_item_completed(pool, item.id, &outcome.message, now).await?;
        info!(item_id = item.id, job_url = %item.job_url, "application submitted");
    } else {
        let status =
            mark_item_failed(pool, item.id, &outcome.message, scheduler.next_retry_at(now), now)
                .await?;
        warn!(
            item_id = item.id,
            job_url = %item.job_url,
            status = status.as_str(),
            message = %outcome.message,
            "application attempt failed"
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    aq_common::logging::init("aq-dispatcher");

    let cli = Cli::parse();
    let config = QueueConfig::from_env();
    let scheduler = RetryScheduler::new(config.retry_backoff_secs);
    let agent = CommandAgent {
        command: cli.agent_cmd.clone(),
    };

    let pool = connect(&cli.db_url)?;
    run_migrations(&pool).await?;
    info!(
        worker_id = %cli.worker_id,
        agent_cmd = %cli.agent_cmd,
        poll_secs = config.poll_interval_secs,
        "dispatcher worker started"
    );

    let mut processed = 0usize;
    let max_items = cli.max_items.unwrap_or(usize::MAX);

    while processed < max_items {
        let recovered =
            recover_stuck_items(&pool, Utc::now(), Duration::minutes(config.lease_timeout_minutes))
                .await?;
        if recovered > 0 {
            warn!(recovered, "recovered items from expired leases");
        }

        let Some(item) = claim_next_queued(&pool, &cli.worker_id, Utc::now()).await? else {
            if cli.exit_on_empty {
                if processed == 0 {
                    info!("queue is empty; exiting");
                }
                break;
            }
            sleep(StdDuration::from_millis(cli.idle_poll_interval_ms)).await;
            continue;
        };

        process_item(&pool, &cli, &config, &agent, &scheduler, item).await?;
        processed += 1;
    }

    info!(processed, "dispatcher run finished");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("aq-dispatcher failed: {err}");
        std::process::exit(1);
    }
}
