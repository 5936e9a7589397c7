//! Insertion-ordered registry of live jobs.
//!
//! Single source of truth for all job bookkeeping, guarded by one mutex.
//! Each [`Scheduler`](crate::Scheduler) instance owns its own registry —
//! there is no process-wide singleton, so parallel schedulers stay isolated.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::types::{JobDescriptor, JobId, JobKind};

/// Authoritative bookkeeping for one live job.
#[derive(Debug, Clone)]
pub(crate) struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub action_name: String,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    /// Monotonic: false -> true only, set when the job is cancelled.
    pub cancelled: bool,
}

impl JobRecord {
    fn descriptor(&self) -> JobDescriptor {
        JobDescriptor {
            id: self.id,
            kind: self.kind,
            action: self.action_name.clone(),
            next_run: self.next_run,
            last_run: self.last_run,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Last issued id; 0 means none yet. Never decremented, never reset,
    /// even after jobs are removed.
    last_id: JobId,
    jobs: IndexMap<JobId, JobRecord>,
}

/// Mutex-guarded job table with monotonic id allocation.
#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Held only for short map operations, never across an action.
        self.inner.lock().unwrap()
    }

    /// Issue the next job id. Ids are strictly increasing and never reused.
    pub(crate) fn allocate_id(&self) -> JobId {
        let mut inner = self.lock();
        inner.last_id += 1;
        inner.last_id
    }

    pub(crate) fn insert(&self, record: JobRecord) {
        self.lock().jobs.insert(record.id, record);
    }

    /// Copy of the job's current record, or `None` if it has been removed.
    pub(crate) fn get(&self, id: JobId) -> Option<JobRecord> {
        self.lock().jobs.get(&id).cloned()
    }

    /// Record a firing attempt: `last_run` becomes the attempt start time
    /// and `next_run` the freshly computed due time. No-op when the job was
    /// cancelled between the attempt and this bookkeeping.
    pub(crate) fn record_attempt(
        &self,
        id: JobId,
        attempted_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) {
        if let Some(record) = self.lock().jobs.get_mut(&id) {
            record.last_run = Some(attempted_at);
            record.next_run = next_run;
        }
    }

    /// Mark the job cancelled and remove it. Returns the removed record, or
    /// `None` if the id was unknown or already cancelled.
    pub(crate) fn cancel(&self, id: JobId) -> Option<JobRecord> {
        let mut inner = self.lock();
        let mut record = inner.jobs.shift_remove(&id)?;
        record.cancelled = true;
        Some(record)
    }

    /// Ids of all live jobs, insertion order.
    pub(crate) fn ids(&self) -> Vec<JobId> {
        self.lock().jobs.keys().copied().collect()
    }

    /// Consistent point-in-time copy of all live jobs, insertion order.
    /// Holds the lock only for the duration of the copy.
    pub fn snapshot(&self) -> Vec<JobDescriptor> {
        self.lock().jobs.values().map(JobRecord::descriptor).collect()
    }

    /// Push a job's `next_run` into the past so the next poll fires it.
    #[cfg(test)]
    pub(crate) fn force_due(&self, id: JobId) {
        if let Some(record) = self.lock().jobs.get_mut(&id) {
            record.next_run = Utc::now() - chrono::Duration::minutes(1);
        }
    }
}
