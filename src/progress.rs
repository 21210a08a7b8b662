//! Counter core: the shared [`Progress`] handle and its [`Report`] snapshots.
//!
//! The handle follows a "Hot/Cold" split:
//!
//! * **Hot Data:** the `done` counter lives in an [`AtomicI64`]. Producers call
//!   [`Progress::add`] from any number of threads or tasks; it never blocks.
//! * **Cold Data:** the start time and the bookkeeping of the previous report sit behind a
//!   [`Mutex`](parking_lot::Mutex). Only [`Progress::report`] touches them, which in
//!   practice means the single scheduler task plus the occasional on-demand query.
//!
//! # Snapshots
//!
//! [`Progress::report`] is *not* idempotent: every call moves the "last reported" marker,
//! so `dt` and `rps_inst` of the next report are measured relative to this one.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use web_time::Instant;

use crate::{
    error::{Error, Result},
    reporter::Reporter,
    text::TextReporter,
};

/// Interval between two scheduled reports unless overridden per tracker.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// A thread-safe, cloneable handle to a progress tracker.
///
/// Cloning is cheap (Arc bumps) and every clone points at the same counter, the same
/// report bookkeeping and the same completion latch.
#[derive(Clone)]
pub struct Progress {
    /// Fixed at construction, always positive.
    pub(crate) total: i64,

    /// Items done so far. Only ever touched with a single atomic operation.
    pub(crate) done: Arc<AtomicI64>,

    pub(crate) cold: Arc<Mutex<Cold>>,

    /// Reporter waiting to be moved into the scheduler task by `start`.
    pub(crate) reporter: Arc<Mutex<Option<Box<dyn Reporter>>>>,

    pub(crate) report_interval: Duration,

    /// Fired by the scheduler once the reporter has been finalized.
    pub(crate) finished: CancellationToken,
}

/// A moment captured on both clocks: monotonic for arithmetic, wall for display.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Stamp {
    pub(crate) instant: Instant,
    pub(crate) wall: DateTime<Local>,
}

impl Stamp {
    pub(crate) fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Local::now(),
        }
    }
}

/// "Cold" bookkeeping, updated once per report.
#[derive(Clone, Debug)]
pub(crate) struct Cold {
    pub(crate) started_at: Stamp,
    pub(crate) last_reported_at: Stamp,
    pub(crate) last_reported_done: i64,
}

impl Progress {
    /// Creates a tracker for `total` items with the default [`TextReporter`].
    ///
    /// # Panics
    ///
    /// Panics if `total <= 0`. Use [`Progress::try_new`] to get an error instead.
    #[must_use]
    pub fn new(total: i64) -> Self {
        match Self::try_new(total) {
            Ok(progress) => progress,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a tracker for `total` items, rejecting a non-positive total.
    pub fn try_new(total: i64) -> Result<Self> {
        Self::with_parts(
            total,
            Arc::new(AtomicI64::new(0)),
            Box::new(TextReporter::new()),
            DEFAULT_REPORT_INTERVAL,
        )
    }

    /// Shortcut for `Progress::new(total)` with a [`TextReporter`] using `legend`.
    ///
    /// # Panics
    ///
    /// Panics if `total <= 0`.
    #[must_use]
    pub fn with_text_legend(total: i64, legend: &str) -> Self {
        Self::new(total).with_reporter(TextReporter::new().with_legend(legend))
    }

    pub(crate) fn with_parts(
        total: i64,
        done: Arc<AtomicI64>,
        reporter: Box<dyn Reporter>,
        report_interval: Duration,
    ) -> Result<Self> {
        if total <= 0 {
            return Err(Error::InvalidTotal(total));
        }

        // Until `start` runs, creation time stands in for the start time.
        let created = Stamp::now();
        Ok(Self {
            total,
            done,
            cold: Arc::new(Mutex::new(Cold {
                started_at: created,
                last_reported_at: created,
                last_reported_done: 0,
            })),
            reporter: Arc::new(Mutex::new(Some(reporter))),
            report_interval,
            finished: CancellationToken::new(),
        })
    }

    /// Returns a new tracker sharing this one's `done` counter, with `reporter` in place of
    /// the current one.
    ///
    /// The new tracker has its own report bookkeeping and its own
    /// [`completion`](Self::completion), so it starts independently of the handle it was
    /// derived from.
    #[must_use]
    pub fn with_reporter(self, reporter: impl Reporter) -> Self {
        let fresh = self.cold.lock().clone();
        Self {
            cold: Arc::new(Mutex::new(fresh)),
            reporter: Arc::new(Mutex::new(Some(Box::new(reporter)))),
            finished: CancellationToken::new(),
            ..self
        }
    }

    /// Overrides the interval between scheduled reports. Takes effect on the next `start`.
    #[must_use]
    pub const fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    // ========================================================================
    // Hot Path
    // ========================================================================

    /// Adds `n` done items. Never blocks; safe to call from any thread.
    pub fn add(&self, n: i64) {
        self.done.fetch_add(n, Ordering::Relaxed);
    }

    /// Gets the number of items done so far.
    #[must_use]
    pub fn get_done(&self) -> i64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Gets the total item count.
    #[must_use]
    pub const fn get_total(&self) -> i64 {
        self.total
    }

    /// Gets the interval between scheduled reports.
    #[must_use]
    pub const fn report_interval(&self) -> Duration {
        self.report_interval
    }

    /// Returns a shared reference to the atomic `done` counter.
    #[must_use]
    pub fn atomic_done(&self) -> Arc<AtomicI64> {
        self.done.clone()
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Resets the start time and the last-report marker to now.
    pub(crate) fn mark_started(&self) {
        let now = Stamp::now();
        let mut cold = self.cold.lock();
        cold.started_at = now;
        cold.last_reported_at = now;
    }

    /// Computes a snapshot of the current state and moves the last-report marker to it.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn report(&self) -> Report {
        if self.total == 0 {
            return Report::default();
        }

        let now = Stamp::now();
        let done = self.done.load(Ordering::Relaxed);

        let mut cold = self.cold.lock();
        let dt = now.instant.duration_since(cold.last_reported_at.instant);
        let elapsed = now.instant.duration_since(cold.started_at.instant);
        let since_last = done - cold.last_reported_done;
        let started_at = cold.started_at.wall;
        cold.last_reported_done = done;
        cold.last_reported_at = now;
        drop(cold);

        let ratio = done as f64 / self.total as f64;
        let rps_avg = per_unit(done, elapsed.as_secs_f64());
        let rpm_avg = per_unit(done, elapsed.as_secs_f64() / 60.0);

        Report {
            now: now.wall,
            started_at,
            dt,
            total: self.total,
            done,
            left: self.total - done,
            ratio,
            percent_int: percent_int(ratio),
            percent_float: ratio * 100.0,
            elapsed,
            eta: eta(self.total - done, rps_avg),
            rps_avg,
            rps_inst: since_last as f64 / dt.as_secs_f64(),
            rpm_avg,
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("total", &self.total)
            .field("done", &self.get_done())
            .field("report_interval", &self.report_interval)
            .field("finished", &self.finished.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Average rate over `span` units of time; zero while no time has passed.
#[allow(clippy::cast_precision_loss)]
fn per_unit(done: i64, span: f64) -> f64 {
    if span > 0.0 { done as f64 / span } else { 0.0 }
}

#[allow(clippy::cast_possible_truncation)]
fn percent_int(ratio: f64) -> i64 {
    (ratio * 100.0).floor() as i64
}

/// Seconds left at `rate`, rounded. Not clamped: negative once `done` exceeds `total`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn eta(left: i64, rate: f64) -> TimeDelta {
    if rate == 0.0 {
        return TimeDelta::zero();
    }
    let secs = left as f64 / rate;
    if secs.is_finite() {
        TimeDelta::seconds(secs.round() as i64)
    } else {
        TimeDelta::zero()
    }
}

/// A point-in-time view of a [`Progress`] tracker.
///
/// Plain data: produced fresh by every [`Progress::report`] call and handed to reporters
/// by reference.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// Wall-clock time the snapshot was taken.
    pub now: DateTime<Local>,
    /// Wall-clock time reporting started.
    pub started_at: DateTime<Local>,
    /// Time since the previous snapshot.
    pub dt: Duration,
    /// Total number of items.
    pub total: i64,
    /// Number of items done.
    pub done: i64,
    /// `total - done`; negative once more than `total` items were reported.
    pub left: i64,
    /// `done / total`, not capped at 1.
    pub ratio: f64,
    /// `floor(ratio * 100)`.
    pub percent_int: i64,
    /// `ratio * 100`.
    pub percent_float: f64,
    /// Time since reporting started.
    pub elapsed: Duration,
    /// Estimated time to finish, whole seconds. Negative when `done > total`.
    pub eta: TimeDelta,
    /// Average items per second since start.
    pub rps_avg: f64,
    /// Items per second since the previous snapshot. `NaN` or infinite when `dt` is zero.
    pub rps_inst: f64,
    /// Average items per minute since start.
    pub rpm_avg: f64,
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::{Progress, eta};
    use crate::Error;

    /// Basic Lifecycle
    #[test]
    #[allow(clippy::float_cmp)]
    fn test_basic_lifecycle() {
        let p = Progress::new(100);

        assert_eq!(p.get_done(), 0);
        assert_eq!(p.get_total(), 100);

        p.add(40);
        p.add(10);
        let r = p.report();

        assert_eq!(r.done, 50);
        assert_eq!(r.left, 50);
        assert_eq!(r.ratio, 0.5);
        assert_eq!(r.percent_int, 50);
        assert_eq!(r.percent_float, 50.0);
    }

    /// Concurrency & Atomics
    /// Ensures that high-contention updates from multiple threads are lossless.
    #[test]
    fn test_concurrency_atomics() {
        let p = Progress::new(1000);
        let mut handles = vec![];

        for _ in 0..10 {
            let p_ref = p.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    p_ref.add(1);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(p.report().done, 1000, "Atomic updates should be lossless");
    }

    #[test]
    #[should_panic(expected = "total should be greater than 0")]
    fn test_zero_total_panics() {
        let _ = Progress::new(0);
    }

    #[test]
    fn test_try_new_rejects_negative_total() {
        assert_eq!(Progress::try_new(-3).unwrap_err(), Error::InvalidTotal(-3));
        assert!(Progress::try_new(1).is_ok());
    }

    /// Completion
    #[test]
    #[allow(clippy::float_cmp)]
    fn test_full_completion() {
        let p = Progress::new(100);
        p.add(100);
        let r = p.report();

        assert_eq!(r.ratio, 1.0);
        assert_eq!(r.percent_int, 100);
        assert_eq!(r.left, 0);
    }

    /// Overshoot is reported as-is: no clamping of ratio, left or ETA.
    #[test]
    fn test_overshoot_is_not_clamped() {
        let p = Progress::new(10);
        p.add(15);
        thread::sleep(Duration::from_millis(5));
        let r = p.report();

        assert_eq!(r.left, -5);
        assert!(r.ratio > 1.0);
        assert_eq!(r.percent_int, 150);
        assert!(r.eta.num_seconds() <= 0);
    }

    /// Throughput & ETA
    #[test]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn test_eta_follows_average_rate() {
        let p = Progress::new(100);
        p.add(10);
        thread::sleep(Duration::from_millis(20));
        let r = p.report();

        assert!(r.rps_avg > 0.0);
        let expected = ((r.total - r.done) as f64 / r.rps_avg).round() as i64;
        assert_eq!(r.eta.num_seconds(), expected);
    }

    #[test]
    fn test_eta_is_zero_without_rate() {
        assert_eq!(eta(100, 0.0).num_seconds(), 0);
        assert_eq!(eta(100, 4.0).num_seconds(), 25);
        assert_eq!(eta(-8, 4.0).num_seconds(), -2);

        let p = Progress::new(100);
        thread::sleep(Duration::from_millis(2));
        assert_eq!(p.report().eta.num_seconds(), 0);
    }

    /// Snapshot bookkeeping
    /// A second report right after the first measures from the first one.
    #[test]
    fn test_report_twice_measures_from_previous() {
        let p = Progress::new(20);
        p.add(5);
        thread::sleep(Duration::from_millis(50));

        let first = p.report();
        let second = p.report();

        assert_eq!(first.done, 5);
        assert_eq!(second.done, 5, "no double counting");
        assert!(first.dt >= Duration::from_millis(50));
        assert!(second.dt < first.dt);
        assert!(second.elapsed >= first.elapsed);
    }

    #[test]
    fn test_clones_share_the_counter() {
        let p = Progress::new(10);
        let producer = p.clone();
        producer.add(3);

        assert_eq!(p.get_done(), 3);
        assert_eq!(p.atomic_done().load(std::sync::atomic::Ordering::Relaxed), 3);
    }

    #[test]
    fn test_report_interval_override() {
        let p = Progress::new(1).with_report_interval(Duration::from_millis(250));
        assert_eq!(p.report_interval(), Duration::from_millis(250));
        assert_eq!(Progress::new(1).report_interval(), super::DEFAULT_REPORT_INTERVAL);
    }
}
