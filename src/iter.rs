//! Iterator adapters that count yielded items.
//!
//! [`ProgressIteratorExt`] adds helper methods to any [`Iterator`] so a loop can feed a
//! tracker without calling [`Progress::add`] by hand:
//!
//! ```ignore
//! use atomic_pv::ProgressIteratorExt;
//!
//! let rows = load_rows().into_iter().progress()?;
//! let progress = rows.tracker().clone();
//! progress.start(token.clone())?;
//! for row in rows {
//!     // ...
//! }
//! ```

use crate::{
    error::{Error, Result},
    progress::Progress,
};

/// Wraps an iterator and adds 1 to its tracker for every item yielded.
pub struct ProgressIter<I> {
    iter: I,
    progress: Progress,
}

impl<I> ProgressIter<I> {
    /// Creates a new `ProgressIter`.
    ///
    /// Usually constructed via [`ProgressIteratorExt`] methods.
    pub const fn new(iter: I, progress: Progress) -> Self {
        Self { iter, progress }
    }

    /// Returns the tracker fed by this iterator.
    pub const fn tracker(&self) -> &Progress {
        &self.progress
    }
}

impl<I: Iterator> Iterator for ProgressIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.iter.next();
        if item.is_some() {
            self.progress.add(1);
        }
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// Extension trait attaching progress tracking to any iterator.
pub trait ProgressIteratorExt: Iterator + Sized {
    /// Wraps the iterator in a new tracker whose total is the iterator's exact length.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownLength`] when `size_hint` gives no exact, non-zero length.
    fn progress(self) -> Result<ProgressIter<Self>>;

    /// Wraps the iterator using an existing tracker.
    fn progress_with(self, progress: Progress) -> ProgressIter<Self>;
}

impl<I: Iterator> ProgressIteratorExt for I {
    fn progress(self) -> Result<ProgressIter<Self>> {
        let total = match self.size_hint() {
            (lower, Some(upper)) if lower == upper && upper > 0 => {
                i64::try_from(upper).map_err(|_| Error::UnknownLength)?
            }
            _ => return Err(Error::UnknownLength),
        };
        Ok(ProgressIter::new(self, Progress::try_new(total)?))
    }

    fn progress_with(self, progress: Progress) -> ProgressIter<Self> {
        ProgressIter::new(self, progress)
    }
}
