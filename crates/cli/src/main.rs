//! execintel-scheduler — scheduler daemon for the executive-intelligence
//! toolkit.
//!
//! Schedules the default daily KPI summary job, then runs until Ctrl-C.
//! Shutdown cancels every outstanding job before exit; jobs are in-memory
//! only and must be reissued on the next start.

mod jobs;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use execintel_scheduler::{ExecutionJournal, Scheduler, SchedulerConfig};

use crate::jobs::DailyKpiSummary;

/// Executive-intelligence scheduler daemon.
#[derive(Parser, Debug)]
#[command(name = "execintel-scheduler", version, about)]
struct Cli {
    /// Data directory for the execution journal and generated reports.
    /// Overrides `SCHEDULER_DATA_DIR` (default: `data`).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Polling interval per job loop, in milliseconds.
    /// Overrides `SCHEDULER_POLL_MS` (default: 30000).
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Hour (UTC, 0-23) at which the daily KPI summary fires.
    #[arg(long, env = "KPI_SUMMARY_HOUR", default_value_t = 6)]
    kpi_hour: u32,

    /// Minute (0-59) at which the daily KPI summary fires.
    #[arg(long, env = "KPI_SUMMARY_MINUTE", default_value_t = 0)]
    kpi_minute: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so env-derived settings can see it.
    execintel_scheduler::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Cli::parse();
    let mut config = SchedulerConfig::from_env();
    if let Some(poll_ms) = args.poll_ms {
        config.poll_interval_ms = poll_ms;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    let data_dir = config.data_dir.clone();

    let journal =
        ExecutionJournal::new(&data_dir).context("failed to initialize execution journal")?;
    let scheduler = Scheduler::with_journal(config, journal);

    let job_id = scheduler
        .schedule_daily(
            args.kpi_hour,
            args.kpi_minute,
            DailyKpiSummary::new(&data_dir),
        )
        .context("failed to schedule daily KPI summary")?;
    info!(
        job_id,
        hour = args.kpi_hour,
        minute = args.kpi_minute,
        "daily KPI summary scheduled"
    );

    info!("scheduler running — Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    scheduler.shutdown();
    info!("goodbye");
    Ok(())
}
