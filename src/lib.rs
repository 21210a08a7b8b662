//! # `atomic_pv`
//!
//! Progress tracking for long-running iterative work: producers report completed items, a
//! background task periodically renders a status line with elapsed time, rate, ETA and an
//! optional progress bar.
//!
//! It is designed to be:
//!
//! * **Lock-free on the hot path**: [`Progress::add`] is a single atomic addition, callable
//!   from any number of threads or tasks.
//! * **Pluggable**: rendering goes through the [`Reporter`] trait. [`TextReporter`] renders
//!   user-defined legends, [`TracingReporter`] emits structured `tracing` events.
//! * **Deterministic on shutdown**: reporting stops on a cancellation signal and
//!   [`Progress::completion`] resolves only after the reporter has been finalized.
//!
//! ```no_run
//! # async fn demo() -> atomic_pv::Result<()> {
//! use atomic_pv::{LEGEND_PROGRESS_BAR, Progress};
//! use tokio_util::sync::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let progress = Progress::with_text_legend(50, LEGEND_PROGRESS_BAR);
//! progress.start(token.clone())?;
//!
//! for _ in 0..50 {
//!     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     progress.add(1);
//! }
//!
//! token.cancel();
//! progress.completion().wait().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! * [`progress`]: the [`Progress`] counter and its [`Report`] snapshots.
//! * [`builder`]: fluent construction of [`Progress`] instances.
//! * [`scheduler`]: starting the background reporter and awaiting its [`Completion`].
//! * [`reporter`]: the [`Reporter`] trait and the non-text reporters.
//! * [`text`]: legend compilation and the [`TextReporter`].
//! * [`io`]: [`std::io::Read`]/[`std::io::Write`] wrappers counting bytes.
//! * [`iter`]: extension traits counting iterator items.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod builder;
pub mod error;
pub mod io;
pub mod iter;
pub mod progress;
pub mod reporter;
pub mod scheduler;
pub mod text;

pub use builder::ProgressBuilder;
pub use error::{Error, Result};
pub use iter::{ProgressIter, ProgressIteratorExt};
pub use progress::{DEFAULT_REPORT_INTERVAL, Progress, Report};
pub use reporter::{NoopReporter, Reporter, TracingReporter};
pub use scheduler::Completion;
pub use text::{
    CompiledLegend, DEFAULT_FLOAT_PRECISION, DEFAULT_PROGRESS_BAR_WIDTH, LEGEND_DEFAULT,
    LEGEND_PROGRESS_BAR, TextOptions, TextReporter,
};
