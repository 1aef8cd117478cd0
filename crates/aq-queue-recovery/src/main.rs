use chrono::{Duration, Utc};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use aq_common::db::application_queue::recover_stuck_items;
use aq_common::db::pool::connect;

/// One-shot sweep that returns applications with expired processing leases
/// to the queue. Intended to run from cron as a safety net alongside the
/// dispatcher's own sweep.
#[derive(Parser, Debug)]
#[command(about = "Recovers stuck job applications whose worker died mid-flight")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: String,

    /// How long a processing lease may run before it is considered dead
    #[arg(long, default_value_t = 30)]
    lease_timeout_minutes: i64,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    aq_common::logging::init("aq-queue-recovery");

    let cli = Cli::parse();
    let pool = connect(&cli.db_url)?;

    let recovered = recover_stuck_items(
        &pool,
        Utc::now(),
        Duration::minutes(cli.lease_timeout_minutes),
    )
    .await?;

    info!(
        recovered,
        lease_timeout_minutes = cli.lease_timeout_minutes,
        "queue recovery sweep finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("aq-queue-recovery failed: {err}");
        std::process::exit(1);
    }
}
