use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique handle for a scheduled job. Positive, monotonically assigned by the
/// owning registry, never reused within a process lifetime.
pub type JobId = u64;

/// Recurrence rule for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Fire every `minutes` minutes.
    Interval { minutes: u32 },
    /// Fire once per day at `hour`:`minute` UTC.
    Daily { hour: u32, minute: u32 },
}

impl JobKind {
    /// Short human-readable recurrence description for logs and listings.
    pub fn describe(&self) -> String {
        match self {
            JobKind::Interval { minutes } => format!("every {}m", minutes),
            JobKind::Daily { hour, minute } => format!("daily at {:02}:{:02}", hour, minute),
        }
    }
}

/// Read-only snapshot of one live job, as returned by `list_jobs`.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub kind: JobKind,
    /// Declared action name, retained for display and journaling only.
    pub action: String,
    /// Earliest instant at which the job's loop may fire next.
    pub next_run: DateTime<Utc>,
    /// When the most recent firing was attempted, if ever.
    pub last_run: Option<DateTime<Utc>>,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long each job loop sleeps between due-checks, in milliseconds.
    /// Firing latency after `next_run` is bounded by this value.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Root directory for the execution journal and generated artifacts.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_poll_interval_ms() -> u64 {
    30_000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            data_dir: default_data_dir(),
        }
    }
}

impl SchedulerConfig {
    /// Build config from environment variables (call [`load_dotenv`] first).
    /// Keys: `SCHEDULER_POLL_MS`, `SCHEDULER_DATA_DIR`.
    pub fn from_env() -> Self {
        Self {
            poll_interval_ms: env_u64("SCHEDULER_POLL_MS", default_poll_interval_ms()),
            data_dir: env_opt("SCHEDULER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
        }
    }

    /// Resolve the polling cadence as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
