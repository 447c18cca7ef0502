use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Timelike, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use jobharvest_common::{Config, Job};
use jobharvest_scraper::bootstrap::{self, Catalogs};
use jobharvest_scraper::traits::JobSink;

#[derive(Parser)]
#[command(name = "jobharvest", about = "Multi-source job scraping core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole slot table once, back to back.
    RunDaily,
    /// Force a single slot to run now.
    RunSlot {
        #[arg(long)]
        hour: u8,
    },
    /// Run all slots without resetting the day's counters.
    Sweep,
    /// Stay up and run each slot at its scheduled hour.
    Watch,
}

/// Emits each normalized job as a JSON line on stdout.
struct StdoutSink;

#[async_trait]
impl JobSink for StdoutSink {
    async fn upsert(&self, job: &Job) -> Result<()> {
        println!("{}", serde_json::to_string(job)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("jobharvest_scraper=info".parse()?)
                .add_directive("jobharvest_common=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Job harvest core starting...");
    let config = Config::from_env();
    config.log_redacted();

    let harvester = bootstrap::build(&config, Catalogs::default(), Arc::new(StdoutSink)).await;
    let scheduler = harvester.scheduler;

    match cli.command {
        Command::RunDaily => {
            let summary = scheduler.run_daily().await;
            eprintln!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::RunSlot { hour } => {
            let summary = scheduler.run_slot(hour).await;
            eprintln!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Sweep => {
            let summary = scheduler.run_full_sweep().await;
            eprintln!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Watch => loop {
            let now = Utc::now();
            let hour = now.hour() as u8;
            let minutes_past = now.minute();

            // Run the slot at the top of its hour, then sleep to the next.
            if minutes_past == 0 {
                if hour == 0 {
                    scheduler.reset_day().await;
                }
                let summary = scheduler.run_slot(hour).await;
                info!(
                    hour,
                    jobs = summary.jobs_collected,
                    "Scheduled slot finished"
                );
            }
            let seconds_to_next_minute = 60 - now.second() as u64;
            tokio::time::sleep(std::time::Duration::from_secs(seconds_to_next_minute.max(1)))
                .await;
        },
    }

    Ok(())
}
