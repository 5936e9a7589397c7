//! Default scheduled payloads. The scheduler treats these as opaque
//! [`JobAction`]s; they stand in for the toolkit's report-building side.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use execintel_scheduler::JobAction;

/// Writes a date-stamped Markdown KPI summary under `<data_dir>/reports/`.
///
/// The headline sections are placeholders until the KPI feeds are wired in;
/// the point of this action is to exercise the daily schedule end to end.
pub struct DailyKpiSummary {
    reports_dir: PathBuf,
}

impl DailyKpiSummary {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            reports_dir: data_dir.join("reports"),
        }
    }
}

impl JobAction for DailyKpiSummary {
    fn name(&self) -> &str {
        "daily_kpi_summary"
    }

    fn run(&self) -> Result<()> {
        std::fs::create_dir_all(&self.reports_dir).with_context(|| {
            format!("failed to create reports dir: {}", self.reports_dir.display())
        })?;

        let now = Utc::now();
        let path = self
            .reports_dir
            .join(format!("kpi-summary-{}.md", now.format("%Y-%m-%d")));

        let mut body = String::new();
        body.push_str(&format!("# Executive KPI Summary — {}\n\n", now.format("%Y-%m-%d")));
        body.push_str(&format!("Generated at {} UTC.\n\n", now.format("%H:%M:%S")));
        body.push_str("## Revenue\n\n_No feed connected._\n\n");
        body.push_str("## Orders\n\n_No feed connected._\n\n");
        body.push_str("## Anomalies\n\n_No feed connected._\n");

        std::fs::write(&path, body)
            .with_context(|| format!("failed to write KPI summary: {}", path.display()))?;
        info!(path = %path.display(), "daily KPI summary written");
        Ok(())
    }
}
