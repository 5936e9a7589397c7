//! The scheduler itself: public API plus the per-job polling loop.
//!
//! One dedicated OS thread per live job. Each loop wakes on the configured
//! polling cadence, checks whether its job is still live and due, fires the
//! action with the registry lock released, then re-books `next_run` and
//! `last_run`. Cancellation is cooperative and observed at the top of each
//! iteration; an in-flight firing always completes first.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::action::JobAction;
use crate::error::Result;
use crate::journal::{ExecutionJournal, JournalEntry, JournalEvent};
use crate::registry::{JobRecord, JobRegistry};
use crate::schedule;
use crate::types::{JobDescriptor, JobId, JobKind, SchedulerConfig};

/// Background job scheduler.
///
/// Owns its registry — construct one scheduler per subsystem (or per test)
/// and they share nothing. Jobs are in-memory only; after a process restart
/// the surrounding application must reissue its `schedule_*` calls.
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    journal: Option<Arc<ExecutionJournal>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            journal: None,
        }
    }

    /// Scheduler that appends every lifecycle event to `journal`.
    pub fn with_journal(config: SchedulerConfig, journal: ExecutionJournal) -> Self {
        Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            journal: Some(Arc::new(journal)),
        }
    }

    /// Register a job firing every `minutes` minutes and start its loop.
    /// Returns immediately; the first firing is `minutes` from now.
    pub fn schedule_interval(
        &self,
        minutes: u32,
        action: impl JobAction + 'static,
    ) -> Result<JobId> {
        self.schedule(JobKind::Interval { minutes }, Arc::new(action))
    }

    /// Register a job firing daily at `hour`:`minute` UTC and start its loop.
    pub fn schedule_daily(
        &self,
        hour: u32,
        minute: u32,
        action: impl JobAction + 'static,
    ) -> Result<JobId> {
        self.schedule(JobKind::Daily { hour, minute }, Arc::new(action))
    }

    fn schedule(&self, kind: JobKind, action: Arc<dyn JobAction>) -> Result<JobId> {
        schedule::validate(&kind)?;

        let id = self.registry.allocate_id();
        let action_name = action.name().to_string();
        let next_run = schedule::next_run(&kind, Utc::now());
        self.registry.insert(JobRecord {
            id,
            kind,
            action_name: action_name.clone(),
            next_run,
            last_run: None,
            cancelled: false,
        });

        info!(
            job_id = id,
            action = %action_name,
            recurrence = %kind.describe(),
            next_run = %next_run,
            "job scheduled"
        );
        journal_event(self.journal.as_ref(), id, &action_name, JournalEvent::Scheduled, None);

        self.spawn_loop(id, action);
        Ok(id)
    }

    /// Cancel a job. Returns `true` and removes it if it was live; `false`
    /// for unknown or already-cancelled ids (a harmless no-op, never an
    /// error). The job's loop stops at its next wake-up; an in-flight firing
    /// may still complete.
    pub fn cancel(&self, id: JobId) -> bool {
        match self.registry.cancel(id) {
            Some(record) => {
                info!(job_id = id, action = %record.action_name, "job cancelled");
                journal_event(
                    self.journal.as_ref(),
                    id,
                    &record.action_name,
                    JournalEvent::Cancelled,
                    None,
                );
                true
            }
            None => {
                debug!(job_id = id, "cancel for unknown job id");
                false
            }
        }
    }

    /// Point-in-time snapshot of all live jobs, insertion order.
    pub fn list_jobs(&self) -> Vec<JobDescriptor> {
        self.registry.snapshot()
    }

    /// Clean-shutdown path: cancel every outstanding job. Loops exit on
    /// their next wake-up; there is no blocking join.
    pub fn shutdown(&self) {
        let ids = self.registry.ids();
        info!(jobs = ids.len(), "scheduler shutting down");
        for id in ids {
            self.cancel(id);
        }
    }

    fn spawn_loop(&self, id: JobId, action: Arc<dyn JobAction>) {
        let registry = Arc::clone(&self.registry);
        let journal = self.journal.clone();
        let poll = self.config.poll_interval();
        thread::Builder::new()
            .name(format!("job-{}", id))
            .spawn(move || run_loop(registry, journal, id, action, poll))
            .expect("failed to spawn job loop thread");
    }
}

/// Per-job execution loop. Runs until the job disappears from the registry.
fn run_loop(
    registry: Arc<JobRegistry>,
    journal: Option<Arc<ExecutionJournal>>,
    id: JobId,
    action: Arc<dyn JobAction>,
    poll: Duration,
) {
    debug!(job_id = id, action = %action.name(), "job loop started");
    loop {
        // Cancellation is observed here, at the top of each iteration.
        let record = match registry.get(id) {
            Some(record) if !record.cancelled => record,
            _ => break,
        };

        if Utc::now() >= record.next_run {
            let attempted_at = Utc::now();
            // Registry lock is not held across the invocation.
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.run()));
            match outcome {
                Ok(Ok(())) => {
                    debug!(job_id = id, action = %action.name(), "job fired");
                    journal_event(journal.as_ref(), id, action.name(), JournalEvent::Fired, None);
                }
                Ok(Err(e)) => {
                    warn!(job_id = id, action = %action.name(), error = %e, "job action failed");
                    journal_event(
                        journal.as_ref(),
                        id,
                        action.name(),
                        JournalEvent::Failed,
                        Some(format!("{:#}", e)),
                    );
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(job_id = id, action = %action.name(), error = %message, "job action panicked");
                    journal_event(
                        journal.as_ref(),
                        id,
                        action.name(),
                        JournalEvent::Failed,
                        Some(message),
                    );
                }
            }
            // One firing per due cycle: next_run restarts from now, not from
            // the missed deadline.
            let next = schedule::next_run(&record.kind, Utc::now());
            registry.record_attempt(id, attempted_at, next);
        }

        thread::sleep(poll);
    }
    debug!(job_id = id, "job loop exited");
}

fn journal_event(
    journal: Option<&Arc<ExecutionJournal>>,
    job_id: JobId,
    action: &str,
    event: JournalEvent,
    error: Option<String>,
) {
    let Some(journal) = journal else { return };
    let entry = JournalEntry {
        timestamp: Utc::now(),
        job_id,
        action: action.to_string(),
        event,
        error,
    };
    // Journal trouble must never take down a loop.
    if let Err(e) = journal.record(entry) {
        warn!(job_id, error = %e, "failed to append journal entry");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "action panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ClosureAction;
    use crate::error::SchedulerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counting action; optionally fails or panics on every invocation.
    struct CountingAction {
        name: String,
        fired: Arc<AtomicUsize>,
        mode: Mode,
    }

    enum Mode {
        Succeed,
        Fail,
        Panic,
    }

    impl CountingAction {
        fn new(name: &str, mode: Mode) -> (Self, Arc<AtomicUsize>) {
            let fired = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name: name.to_string(),
                    fired: Arc::clone(&fired),
                    mode,
                },
                fired,
            )
        }
    }

    impl JobAction for CountingAction {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(&self) -> anyhow::Result<()> {
            self.fired.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Succeed => Ok(()),
                Mode::Fail => anyhow::bail!("kpi feed unavailable"),
                Mode::Panic => panic!("report template exploded"),
            }
        }
    }

    /// Slow poll so loops stay asleep unless a test forces a job due.
    fn idle_scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig {
            poll_interval_ms: 3_600_000,
            ..SchedulerConfig::default()
        })
    }

    /// Fast poll for firing tests.
    fn fast_scheduler() -> Scheduler {
        Scheduler::new(SchedulerConfig {
            poll_interval_ms: 10,
            ..SchedulerConfig::default()
        })
    }

    fn settle() {
        thread::sleep(Duration::from_millis(200));
    }

    #[test]
    fn ids_strictly_increase_across_schedules() {
        let scheduler = idle_scheduler();
        let mut previous = 0;
        for _ in 0..5 {
            let (action, _) = CountingAction::new("tick", Mode::Succeed);
            let id = scheduler.schedule_interval(30, action).unwrap();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let scheduler = idle_scheduler();
        let cases = [
            scheduler.schedule_interval(0, ClosureAction::new("bad", || Ok(()))),
            scheduler.schedule_daily(24, 0, ClosureAction::new("bad", || Ok(()))),
            scheduler.schedule_daily(9, 60, ClosureAction::new("bad", || Ok(()))),
        ];
        for result in cases {
            assert!(matches!(result, Err(SchedulerError::InvalidParameter(_))));
        }
        // No jobs were created by the failed calls.
        assert!(scheduler.list_jobs().is_empty());

        assert!(scheduler
            .schedule_daily(0, 0, ClosureAction::new("midnight", || Ok(())))
            .is_ok());
        assert!(scheduler
            .schedule_daily(23, 59, ClosureAction::new("last_minute", || Ok(())))
            .is_ok());
    }

    #[test]
    fn list_jobs_matches_returned_handles() {
        let scheduler = idle_scheduler();
        let mut handles = Vec::new();
        for i in 0..4 {
            let (action, _) = CountingAction::new(&format!("job_{}", i), Mode::Succeed);
            handles.push(scheduler.schedule_interval(15, action).unwrap());
        }

        let listed = scheduler.list_jobs();
        assert_eq!(listed.len(), 4);
        let ids: Vec<_> = listed.iter().map(|d| d.id).collect();
        assert_eq!(ids, handles);
        assert_eq!(listed[0].action, "job_0");
        assert!(listed.iter().all(|d| d.last_run.is_none()));
    }

    #[test]
    fn cancel_is_true_exactly_once() {
        let scheduler = idle_scheduler();
        let (action, _) = CountingAction::new("tick", Mode::Succeed);
        let id = scheduler.schedule_interval(30, action).unwrap();

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(!scheduler.cancel(9999));
        assert!(scheduler.list_jobs().is_empty());
    }

    #[test]
    fn due_job_fires_and_stops_after_cancel() {
        let scheduler = fast_scheduler();
        let (action, fired) = CountingAction::new("tick", Mode::Succeed);
        let id = scheduler.schedule_interval(1, action).unwrap();

        scheduler.registry.force_due(id);
        settle();

        assert!(fired.load(Ordering::SeqCst) >= 1, "forced-due job should fire");
        // One firing per due cycle: next_run restarted from the attempt, so
        // the count cannot have kept climbing every poll.
        assert!(fired.load(Ordering::SeqCst) <= 2);
        assert_eq!(scheduler.list_jobs().len(), 1, "firing must not remove the job");

        assert!(scheduler.cancel(id));
        settle();
        let after_cancel = fired.load(Ordering::SeqCst);
        settle();
        assert_eq!(fired.load(Ordering::SeqCst), after_cancel);
    }

    #[test]
    fn failing_job_stays_live_and_keeps_retrying() {
        let scheduler = fast_scheduler();
        let (action, fired) = CountingAction::new("flaky", Mode::Fail);
        let id = scheduler.schedule_interval(1, action).unwrap();

        scheduler.registry.force_due(id);
        settle();
        assert!(fired.load(Ordering::SeqCst) >= 1);
        let listed = scheduler.list_jobs();
        assert_eq!(listed.len(), 1, "failure never removes a job");
        let first_attempt = listed[0].last_run.expect("attempt recorded despite failure");

        scheduler.registry.force_due(id);
        settle();
        assert!(fired.load(Ordering::SeqCst) >= 2, "failing job retries on the next due cycle");
        let second_attempt = scheduler.list_jobs()[0].last_run.unwrap();
        assert!(second_attempt > first_attempt, "last_run advances on every attempt");
    }

    #[test]
    fn panicking_job_is_contained() {
        let scheduler = fast_scheduler();
        let (action, fired) = CountingAction::new("explosive", Mode::Panic);
        let id = scheduler.schedule_interval(1, action).unwrap();

        scheduler.registry.force_due(id);
        settle();

        assert!(fired.load(Ordering::SeqCst) >= 1);
        assert_eq!(scheduler.list_jobs().len(), 1, "panic never removes a job");
        assert!(scheduler.cancel(id));
    }

    #[test]
    fn two_daily_jobs_at_same_time_are_independent() {
        let scheduler = idle_scheduler();
        let (morning_a, _) = CountingAction::new("digest_a", Mode::Succeed);
        let (morning_b, _) = CountingAction::new("digest_b", Mode::Succeed);
        let a = scheduler.schedule_daily(7, 30, morning_a).unwrap();
        let b = scheduler.schedule_daily(7, 30, morning_b).unwrap();
        assert_ne!(a, b);

        let listed = scheduler.list_jobs();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].next_run, listed[1].next_run);

        assert!(scheduler.cancel(a));
        let remaining = scheduler.list_jobs();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
        assert_eq!(remaining[0].next_run, listed[1].next_run);
    }

    #[test]
    fn daily_next_run_is_seconds_aligned() {
        let scheduler = idle_scheduler();
        let (action, _) = CountingAction::new("digest", Mode::Succeed);
        scheduler.schedule_daily(6, 0, action).unwrap();

        let next = scheduler.list_jobs()[0].next_run;
        assert_eq!(next.time().format("%M:%S").to_string(), "00:00");
        assert!(next > Utc::now());
    }

    #[test]
    fn shutdown_cancels_everything() {
        let scheduler = idle_scheduler();
        let mut handles = Vec::new();
        for i in 0..3 {
            let (action, _) = CountingAction::new(&format!("job_{}", i), Mode::Succeed);
            handles.push(scheduler.schedule_interval(30, action).unwrap());
        }

        scheduler.shutdown();
        assert!(scheduler.list_jobs().is_empty());
        for id in handles {
            assert!(!scheduler.cancel(id));
        }
    }

    #[test]
    fn schedulers_are_isolated() {
        // Per-instance registries: ids and jobs do not bleed across
        // schedulers running in the same process.
        let a = idle_scheduler();
        let b = idle_scheduler();
        let (action_a, _) = CountingAction::new("a", Mode::Succeed);
        let (action_b, _) = CountingAction::new("b", Mode::Succeed);

        let id_a = a.schedule_interval(30, action_a).unwrap();
        let id_b = b.schedule_interval(30, action_b).unwrap();
        assert_eq!(id_a, id_b, "independent counters both start at 1");
        assert_eq!(a.list_jobs().len(), 1);
        assert_eq!(b.list_jobs().len(), 1);
        assert!(!b.cancel(2), "cancelling in one scheduler cannot reach the other");
    }

    #[test]
    fn journal_records_job_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let journal = ExecutionJournal::new(tmp.path()).unwrap();
        let scheduler = Scheduler::with_journal(
            SchedulerConfig {
                poll_interval_ms: 10,
                data_dir: tmp.path().to_path_buf(),
            },
            journal,
        );

        let (action, fired) = CountingAction::new("flaky", Mode::Fail);
        let id = scheduler.schedule_interval(1, action).unwrap();
        scheduler.registry.force_due(id);
        settle();
        assert!(fired.load(Ordering::SeqCst) >= 1);
        assert!(scheduler.cancel(id));
        settle();

        let reader = ExecutionJournal::new(tmp.path()).unwrap();
        let entries = reader.recent(50).unwrap();
        let events: Vec<JournalEvent> = entries.iter().rev().map(|e| e.event).collect();

        assert_eq!(events.first(), Some(&JournalEvent::Scheduled));
        assert!(events.contains(&JournalEvent::Failed));
        assert_eq!(events.last(), Some(&JournalEvent::Cancelled));
        let failure = entries.iter().find(|e| e.event == JournalEvent::Failed).unwrap();
        assert!(failure.error.as_deref().unwrap().contains("kpi feed unavailable"));
        assert!(entries.iter().all(|e| e.job_id == id && e.action == "flaky"));
    }
}
