use thiserror::Error;

/// Errors surfaced synchronously by scheduling calls.
///
/// Runtime failures inside a job's action never appear here — they are
/// contained at the loop boundary and observable only through the log and
/// the execution journal.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Out-of-range recurrence parameter at scheduling time. Fatal to that
    /// one call; no job is created.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
