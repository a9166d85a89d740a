//! Run-metadata recording seam for the external persistence layer.
//!
//! The pipeline appends one [`RunRecord`](crate::output::RunRecord) after
//! each successful run and never reads anything back — history storage,
//! analytics queries, and schema are entirely the host application's
//! business. Injecting the sink as a trait object keeps the library free of
//! any database dependency while giving hosts a single, obvious hook.
//!
//! # Why a callback instead of a channel?
//!
//! The trait is the least-invasive integration point: hosts can forward
//! records to a database insert, a message queue, or a log file without the
//! library knowing how they communicate. It is `Send + Sync` because
//! independent runs may complete concurrently on different tasks.

use crate::output::RunRecord;

/// Append-only sink for run metadata.
///
/// `record` is fire-and-forget: implementations are expected to handle (and
/// log) their own failures rather than surface them into the run — a full
/// analytics disk must never fail an otherwise successful analysis. Keep
/// implementations quick; for slow sinks, hand the record off to a task.
pub trait RunRecorder: Send + Sync {
    /// Called once after each successful run (cache hits included,
    /// distinguished by `record.cache_hit`).
    fn record(&self, record: &RunRecord);
}

/// A no-op implementation for callers that don't persist history.
pub struct NoopRecorder;

impl RunRecorder for NoopRecorder {
    fn record(&self, _record: &RunRecord) {}
}
