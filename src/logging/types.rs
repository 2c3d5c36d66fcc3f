//! Core logging types: per-object outcomes and the [`Log`] trait.

/// Reconciliation outcome of one object, for the run summary.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    /// Display form of the object identity.
    pub name: String,
    /// Final status.
    pub status: ObjectStatus,
    /// Optional detail (the error on failure, the operation count on change).
    pub message: Option<String>,
}

/// Status of a reconciled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    /// Operations were applied and the object converged.
    Changed,
    /// The object already matched the desired state.
    Unchanged,
    /// Operations were planned but not applied.
    DryRun,
    /// Validation, policy, query or convergence failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// Both [`Logger`](super::logger::Logger) (direct output) and
/// [`BufferedLog`](super::buffered::BufferedLog) (deferred output for
/// parallel reconciliation) implement this trait, so the engine can log
/// without knowing whether output is immediate or buffered.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record an object outcome for the summary.
    fn record_object(&self, name: &str, status: ObjectStatus, message: Option<&str>);
}
