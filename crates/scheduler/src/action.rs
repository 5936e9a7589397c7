use anyhow::Result;

/// A unit of work the scheduler can fire.
///
/// Actions are opaque to the scheduler: invoked with no arguments, expected
/// to return normally. The declared name is retained for display and
/// journaling only. An `Err` (or a panic) during a firing is caught at the
/// loop boundary and never cancels the job.
pub trait JobAction: Send + Sync {
    /// Name used in logs, listings, and the execution journal.
    fn name(&self) -> &str;

    /// Execute one firing.
    fn run(&self) -> Result<()>;
}

/// Adapter turning a closure into a named [`JobAction`].
pub struct ClosureAction {
    name: String,
    f: Box<dyn Fn() -> Result<()> + Send + Sync>,
}

impl ClosureAction {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn() -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl JobAction for ClosureAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<()> {
        (self.f)()
    }
}
