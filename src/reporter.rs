//! The pluggable rendering side of a tracker.
//!
//! A [`Reporter`] receives every [`Report`] the scheduler produces and is finalized exactly
//! once when scheduling stops. It is moved into the scheduler task on `start`, so
//! implementations own their state outright and need no locking.
//!
//! Implementations shipped with the crate:
//!
//! * [`TextReporter`](crate::TextReporter): legend-driven text lines, optionally with a bar.
//! * [`TracingReporter`]: one structured `tracing` event per report.
//! * [`NoopReporter`]: discards everything.

use compact_str::CompactString;
use tracing::Level;

use crate::progress::Report;

/// Capability set of a progress reporter.
pub trait Reporter: Send + 'static {
    /// Renders one snapshot.
    fn report(&mut self, report: &Report);

    /// Called once after the last report.
    fn finalize(&mut self);
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&mut self, report: &Report) {
        (**self).report(report);
    }

    fn finalize(&mut self) {
        (**self).finalize();
    }
}

/// Reporter that ignores every call.
///
/// Useful when a tracker is only queried through [`Progress::report`](crate::Progress::report).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&mut self, _report: &Report) {}

    fn finalize(&mut self) {}
}

// `tracing` callsites need their level at compile time.
macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::event!(Level::ERROR, $($rest)+);
        } else if level == Level::WARN {
            tracing::event!(Level::WARN, $($rest)+);
        } else if level == Level::INFO {
            tracing::event!(Level::INFO, $($rest)+);
        } else if level == Level::DEBUG {
            tracing::event!(Level::DEBUG, $($rest)+);
        } else {
            tracing::event!(Level::TRACE, $($rest)+);
        }
    }};
}

/// Machine-readable reporter: each snapshot becomes one `tracing` event with structured
/// fields, so progress lands wherever the application's subscriber sends its logs.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    label: CompactString,
    level: Level,
}

impl TracingReporter {
    /// Creates a reporter emitting at `INFO` with the given label.
    #[must_use]
    pub fn new(label: impl Into<CompactString>) -> Self {
        Self {
            label: label.into(),
            level: Level::INFO,
        }
    }

    /// Returns a copy emitting at `level`.
    #[must_use]
    pub fn with_level(&self, level: Level) -> Self {
        Self {
            label: self.label.clone(),
            level,
        }
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new("progress")
    }
}

impl Reporter for TracingReporter {
    fn report(&mut self, report: &Report) {
        let label = self.label.as_str();
        let eta_secs = report.eta.num_seconds().max(0);
        let elapsed_secs = report.elapsed.as_secs();
        event_at!(
            self.level,
            label,
            done = report.done,
            total = report.total,
            percent = report.percent_int,
            rps_avg = report.rps_avg,
            rps_inst = report.rps_inst,
            elapsed_secs,
            eta_secs,
            "progress"
        );
    }

    fn finalize(&mut self) {
        let label = self.label.as_str();
        event_at!(self.level, label, "finished");
    }
}
