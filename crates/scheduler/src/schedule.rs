//! Pure next-run computation. No side effects, no shared state.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SchedulerError};
use crate::types::JobKind;

/// Validate recurrence parameters at scheduling time.
///
/// Out-of-range values are a fatal configuration error for that call — they
/// are rejected, never clamped.
pub fn validate(kind: &JobKind) -> Result<()> {
    match *kind {
        JobKind::Interval { minutes } => {
            if minutes == 0 {
                return Err(SchedulerError::InvalidParameter(
                    "interval minutes must be positive".to_string(),
                ));
            }
        }
        JobKind::Daily { hour, minute } => {
            if hour > 23 {
                return Err(SchedulerError::InvalidParameter(format!(
                    "hour {} out of range 0-23",
                    hour
                )));
            }
            if minute > 59 {
                return Err(SchedulerError::InvalidParameter(format!(
                    "minute {} out of range 0-59",
                    minute
                )));
            }
        }
    }
    Ok(())
}

/// Compute the next firing time for `kind` relative to `now`.
///
/// Callers must have validated `kind` first (see [`validate`]).
pub fn next_run(kind: &JobKind, now: DateTime<Utc>) -> DateTime<Utc> {
    match *kind {
        JobKind::Interval { minutes } => now + Duration::minutes(i64::from(minutes)),
        JobKind::Daily { hour, minute } => next_daily(now, hour, minute),
    }
}

/// Today's `hour:minute:00.000` UTC if strictly after `now`, otherwise
/// tomorrow's. Seconds and subseconds of the target are always zeroed, so a
/// daily job fires at most once per calendar day, within one poll interval
/// after the target wall-clock time.
fn next_daily(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let Some(today) = now.date_naive().and_hms_opt(hour, minute, 0) else {
        // hour/minute are validated at scheduling time; unreachable for UTC
        return now + Duration::days(1);
    };
    let candidate = today.and_utc();
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}
