//! Background report scheduling.
//!
//! [`Progress::start`] and [`Progress::start_with_signal`] move the tracker's reporter into a
//! tokio task which:
//!
//! 1. reports once immediately,
//! 2. then waits for the earlier of the report interval and the stop signal, reporting on
//!    every interval tick,
//! 3. finalizes the reporter once the signal fires, and finally
//! 4. completes the tracker's [`Completion`].
//!
//! Emission is asynchronous relative to the stop signal: wait on
//! [`Progress::completion`] before writing anything else to the same output.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{Error, Result},
    progress::Progress,
    reporter::Reporter,
};

/// Resolves once a started tracker has finalized its reporter.
///
/// Cheap to clone; every clone observes the same event.
#[derive(Clone, Debug)]
pub struct Completion(CancellationToken);

impl Completion {
    /// Waits until the reporter has been finalized.
    pub async fn wait(&self) {
        self.0.cancelled().await;
    }

    /// Returns `true` once the reporter has been finalized.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.0.is_cancelled()
    }
}

impl Progress {
    /// Starts periodic reporting until `token` is cancelled.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if this tracker (or a clone of it) was started before.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn start(&self, token: CancellationToken) -> Result<JoinHandle<()>> {
        self.start_with_signal(async move { token.cancelled().await })
    }

    /// Starts periodic reporting until `signal` resolves, whatever it resolves to.
    ///
    /// Any future works as a signal, e.g. a `oneshot::Receiver<T>`: both a sent value and a
    /// dropped sender stop the reporting.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyStarted`] if this tracker (or a clone of it) was started before.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn start_with_signal<S>(&self, signal: S) -> Result<JoinHandle<()>>
    where
        S: Future + Send + 'static,
        S::Output: Send,
    {
        let reporter = self.reporter.lock().take().ok_or(Error::AlreadyStarted)?;
        self.mark_started();
        debug!(
            total = self.total,
            interval = ?self.report_interval,
            "progress reporting started"
        );

        Ok(tokio::spawn(run(self.clone(), reporter, signal)))
    }

    /// Returns the handle that resolves once reporting has stopped and the reporter has
    /// been finalized.
    #[must_use]
    pub fn completion(&self) -> Completion {
        Completion(self.finished.clone())
    }
}

async fn run<S: Future>(progress: Progress, mut reporter: Box<dyn Reporter>, signal: S) {
    tokio::pin!(signal);

    reporter.report(&progress.report());
    loop {
        tokio::select! {
            biased;
            _ = &mut signal => break,
            () = tokio::time::sleep(progress.report_interval) => {
                reporter.report(&progress.report());
            }
        }
    }

    reporter.finalize();
    debug!(done = progress.get_done(), "progress reporting stopped");
    progress.finished.cancel();
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use parking_lot::Mutex;
    use tokio::sync::oneshot;
    use tokio_util::sync::CancellationToken;

    use crate::{Error, Progress, Reporter, progress::Report};

    /// Records everything it is asked to do.
    #[derive(Clone, Default)]
    struct Recorder {
        reports: Arc<Mutex<Vec<Report>>>,
        finalized: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn reports(&self) -> Vec<Report> {
            self.reports.lock().clone()
        }

        fn finalized(&self) -> usize {
            self.finalized.load(Ordering::SeqCst)
        }
    }

    impl Reporter for Recorder {
        fn report(&mut self, report: &Report) {
            self.reports.lock().push(report.clone());
        }

        fn finalize(&mut self) {
            // Must happen strictly after the last report.
            assert!(!self.reports.lock().is_empty());
            self.finalized.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Immediate Cancellation
    /// One report, one finalize, and the completion fires only afterwards.
    #[tokio::test(start_paused = true)]
    async fn test_cancel_immediately() {
        let recorder = Recorder::default();
        let progress = Progress::new(10).with_reporter(recorder.clone());
        let token = CancellationToken::new();

        progress.start(token.clone()).unwrap();
        token.cancel();
        progress.completion().wait().await;

        assert_eq!(recorder.reports().len(), 1);
        assert_eq!(recorder.finalized(), 1);
        assert!(progress.completion().is_done());
    }

    /// Interval Cadence
    /// Reports at t=0, 1s, 2s, 3s; cancellation at 3.5s beats the 4s tick.
    #[tokio::test(start_paused = true)]
    async fn test_reports_on_interval() {
        let recorder = Recorder::default();
        let progress = Progress::new(100)
            .with_reporter(recorder.clone())
            .with_report_interval(Duration::from_secs(1));
        let token = CancellationToken::new();

        let handle = progress.start(token.clone()).unwrap();
        for _ in 0..3 {
            progress.add(10);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
        handle.await.unwrap();

        let reports = recorder.reports();
        assert_eq!(reports.len(), 4);
        assert_eq!(recorder.finalized(), 1);
        assert!(reports.windows(2).all(|w| w[0].done <= w[1].done));
        assert!(reports.windows(2).all(|w| w[0].now <= w[1].now));
        assert_eq!(reports.last().map(|r| r.total), Some(100));
    }

    /// Generic Signals
    /// A oneshot channel with an arbitrary payload stops the scheduler.
    #[tokio::test(start_paused = true)]
    async fn test_start_with_oneshot_signal() {
        let recorder = Recorder::default();
        let progress = Progress::new(5).with_reporter(recorder.clone());
        let (tx, rx) = oneshot::channel::<String>();

        progress.start_with_signal(rx).unwrap();
        progress.add(5);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        tx.send("stop".to_owned()).unwrap();
        progress.completion().wait().await;

        assert_eq!(recorder.reports().len(), 2);
        assert_eq!(recorder.finalized(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_scheduler() {
        let recorder = Recorder::default();
        let progress = Progress::new(5).with_reporter(recorder.clone());
        let (tx, rx) = oneshot::channel::<()>();

        progress.start_with_signal(rx).unwrap();
        drop(tx);
        progress.completion().wait().await;

        assert_eq!(recorder.finalized(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected() {
        let progress = Progress::new(3).with_reporter(Recorder::default());
        let token = CancellationToken::new();

        progress.start(token.clone()).unwrap();
        let err = progress.clone().start(token.clone()).unwrap_err();
        assert_eq!(err, Error::AlreadyStarted);

        token.cancel();
        progress.completion().wait().await;
    }

    /// Swapping the reporter yields a tracker with its own lifecycle.
    #[tokio::test(start_paused = true)]
    async fn test_swapped_reporter_has_own_completion() {
        let first = Recorder::default();
        let second = Recorder::default();
        let progress = Progress::new(10).with_reporter(first.clone());
        let derived = progress.clone().with_reporter(second.clone());
        let first_token = CancellationToken::new();
        let second_token = CancellationToken::new();

        progress.start(first_token.clone()).unwrap();
        derived.start(second_token.clone()).unwrap();
        assert_eq!(
            progress.clone().start(first_token.clone()).unwrap_err(),
            Error::AlreadyStarted
        );

        progress.add(4);
        assert_eq!(derived.get_done(), 4, "the counter stays shared");

        second_token.cancel();
        derived.completion().wait().await;
        assert!(!progress.completion().is_done());
        assert_eq!(second.finalized(), 1);
        assert_eq!(first.finalized(), 0);

        first_token.cancel();
        progress.completion().wait().await;
        assert_eq!(first.finalized(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_pending_while_running() {
        let progress = Progress::new(3).with_reporter(Recorder::default());
        let token = CancellationToken::new();

        progress.start(token.clone()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!progress.completion().is_done());

        token.cancel();
        progress.completion().wait().await;
        assert!(progress.completion().is_done());
    }

    /// Producers running on other tasks are all accounted for in the final report.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers() {
        let recorder = Recorder::default();
        let progress = Progress::new(400)
            .with_reporter(recorder.clone())
            .with_report_interval(Duration::from_millis(5));
        let token = CancellationToken::new();
        progress.start(token.clone()).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let progress = progress.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        progress.add(1);
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        assert_eq!(progress.report().done, 400);
        token.cancel();
        progress.completion().wait().await;
        assert_eq!(recorder.finalized(), 1);
    }
}
