//! I/O wrappers counting transferred bytes.
//!
//! [`ProgressReader`] and [`ProgressWriter`] pass every call through to the wrapped
//! [`Read`]/[`Write`] and add the number of bytes actually transferred to a [`Progress`]
//! tracker. Size the tracker in bytes (e.g. the file length) and the text reporter's rates
//! become bytes per second.

use std::io::{self, Read, Write};

use crate::progress::Progress;

fn add_bytes(progress: &Progress, n: usize) {
    progress.add(i64::try_from(n).unwrap_or(i64::MAX));
}

/// A [`Read`] adapter adding the bytes read to a tracker.
pub struct ProgressReader<R> {
    inner: R,
    progress: Progress,
}

impl<R> ProgressReader<R> {
    /// Wraps `inner`, feeding `progress`.
    pub const fn new(inner: R, progress: Progress) -> Self {
        Self { inner, progress }
    }

    /// Unwraps the reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        add_bytes(&self.progress, n);
        Ok(n)
    }
}

/// A [`Write`] adapter adding the bytes written to a tracker.
pub struct ProgressWriter<W> {
    inner: W,
    progress: Progress,
}

impl<W> ProgressWriter<W> {
    /// Wraps `inner`, feeding `progress`.
    pub const fn new(inner: W, progress: Progress) -> Self {
        Self { inner, progress }
    }

    /// Unwraps the writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        add_bytes(&self.progress, n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
