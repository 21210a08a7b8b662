//! Fluent interface for constructing [`Progress`] instances.
//!
//! [`Progress::new`] covers the common case. The [`ProgressBuilder`] gathers the full option
//! set in one place instead:
//!
//! * **Reporting:** interval, reporter, or just a legend for the default text reporter.
//! * **Shared State:** an existing `Arc<AtomicI64>` can back the `done` counter, so a
//!   counter owned by another component (e.g. a global byte counter bumped by several
//!   workers) is reported directly.
//! * **Fallibility:** [`try_build`](ProgressBuilder::try_build) reports a bad total as an
//!   [`Error`](crate::Error) instead of panicking.

use std::{
    fmt,
    sync::{Arc, atomic::AtomicI64},
    time::Duration,
};

use compact_str::CompactString;

use crate::{
    error::Result,
    progress::{DEFAULT_REPORT_INTERVAL, Progress},
    reporter::Reporter,
    text::TextReporter,
};

/// A builder for [`Progress`] trackers.
pub struct ProgressBuilder {
    total: i64,
    report_interval: Duration,
    reporter: Option<Box<dyn Reporter>>,
    legend: Option<CompactString>,
    atomic_done: Option<Arc<AtomicI64>>,
}

impl ProgressBuilder {
    /// Starts building a tracker for `total` items.
    #[must_use]
    pub fn new(total: i64) -> Self {
        Self {
            total,
            report_interval: DEFAULT_REPORT_INTERVAL,
            reporter: None,
            legend: None,
            atomic_done: None,
        }
    }

    /// Sets the interval between scheduled reports.
    #[must_use]
    pub const fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Sets the reporter. Overrides [`legend`](Self::legend).
    #[must_use]
    pub fn reporter(mut self, reporter: impl Reporter) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Uses the default [`TextReporter`] with `legend`.
    #[must_use]
    pub fn legend(mut self, legend: impl Into<CompactString>) -> Self {
        self.legend = Some(legend.into());
        self
    }

    /// Backs the `done` counter with a pre-existing atomic.
    #[must_use]
    pub fn with_atomic_done(mut self, atomic_done: Arc<AtomicI64>) -> Self {
        self.atomic_done = Some(atomic_done);
        self
    }

    /// Consumes the builder and returns the tracker.
    ///
    /// # Panics
    ///
    /// Panics if the total is not positive.
    #[must_use]
    pub fn build(self) -> Progress {
        match self.try_build() {
            Ok(progress) => progress,
            Err(err) => panic!("{err}"),
        }
    }

    /// Consumes the builder and returns the tracker, or an error for a non-positive total.
    pub fn try_build(self) -> Result<Progress> {
        let reporter: Box<dyn Reporter> = match (self.reporter, self.legend) {
            (Some(reporter), _) => reporter,
            (None, Some(legend)) => Box::new(TextReporter::new().with_legend(legend)),
            (None, None) => Box::new(TextReporter::new()),
        };

        Progress::with_parts(
            self.total,
            self.atomic_done
                .unwrap_or_else(|| Arc::new(AtomicI64::new(0))),
            reporter,
            self.report_interval,
        )
    }
}

impl fmt::Debug for ProgressBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBuilder")
            .field("total", &self.total)
            .field("report_interval", &self.report_interval)
            .field("has_reporter", &self.reporter.is_some())
            .field("legend", &self.legend)
            .finish_non_exhaustive()
    }
}
