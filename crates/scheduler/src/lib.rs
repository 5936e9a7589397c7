//! Background job scheduler for the executive-intelligence toolkit.
//!
//! Jobs pair a recurrence rule ([`JobKind`]) with an opaque zero-argument
//! action ([`JobAction`]). Every registered job gets its own polling loop on
//! a dedicated thread; loops share nothing but the mutex-guarded job
//! registry owned by their [`Scheduler`]. Action failures are
//! contained at the loop boundary and surfaced only through tracing and the
//! append-only [`ExecutionJournal`].
//!
//! | Recurrence | Behaviour                                      |
//! |------------|------------------------------------------------|
//! | `Interval` | Fire every N minutes, measured from each attempt |
//! | `Daily`    | Fire at HH:MM UTC, at most once per calendar day |
//!
//! Jobs are in-memory only; nothing survives a process restart.

pub mod action;
pub mod error;
pub mod journal;
mod registry;
pub mod runner;
pub mod schedule;
pub mod types;

pub use action::{ClosureAction, JobAction};
pub use error::{Result, SchedulerError};
pub use journal::{ExecutionJournal, JournalEntry, JournalEvent};
pub use runner::Scheduler;
pub use types::{load_dotenv, JobDescriptor, JobId, JobKind, SchedulerConfig};
