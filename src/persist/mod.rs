//! Strategies for getting an entry's bytes onto the user's storage.
//!
//! Platforms differ wildly in what they let us do here,
//! so each [`Strategy`] is one way of doing it, from the most capable
//! (the user picks a destination and we stream straight into it)
//! down to the most portable (buffer everything and hand it off).
//! The [`download`](crate::download) module tries them in order.

use std::io;

use log::*;

use crate::download::DownloadMethod;
use crate::entry::ArchiveEntry;
use crate::result::*;

pub mod blob;
pub mod handle;
pub mod proxy;

/// What happened when a strategy tried to save an entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PersistenceOutcome {
    /// The entry was saved.
    Success,
    /// The user backed out. Nothing else should be tried.
    Cancelled,
    /// The strategy can't work here. Nothing was attempted.
    Unsupported,
    /// The strategy was tried and failed.
    Error,
}

impl PersistenceOutcome {
    /// Collapses the result of a save attempt into an outcome,
    /// logging whatever error gets swallowed on the way.
    pub(crate) fn classify<T>(tier: &str, result: SaveResult<T>) -> Self {
        match result {
            Ok(_) => PersistenceOutcome::Success,
            Err(SaveError::Aborted) => {
                debug!("{tier}: cancelled by the user");
                PersistenceOutcome::Cancelled
            }
            Err(SaveError::Unsupported(why)) => {
                debug!("{tier}: unavailable: {why}");
                PersistenceOutcome::Unsupported
            }
            Err(e) => {
                debug!("{tier}: failed: {e:#}");
                PersistenceOutcome::Error
            }
        }
    }
}

/// One way of saving an archive entry.
pub trait Strategy {
    /// How the download was delivered if this strategy succeeds.
    fn method(&self) -> DownloadMethod;

    /// Checks if the platform has what this strategy needs.
    ///
    /// Must be cheap and must not allocate anything that needs cleanup:
    /// [`attempt()`](Strategy::attempt) calls it first
    /// and bails with [`PersistenceOutcome::Unsupported`] if it fails.
    fn probe(&self) -> bool;

    /// Tries to save the given entry, absorbing any errors along the way.
    ///
    /// Directory entries aren't saveable; strategies report them as unsupported.
    fn attempt(&self, entry: &dyn ArchiveEntry) -> PersistenceOutcome;
}

/// A destination we can stream into, such as a file the user picked.
///
/// Whatever was written only becomes visible once the sink is closed.
pub trait WritableFile: io::Write + Send {
    /// Finishes the write, making the data visible at its destination.
    fn close(self: Box<Self>) -> SaveResult<()>;

    /// Throws away whatever was written so far.
    fn abort(self: Box<Self>) -> SaveResult<()>;
}

/// Owns a [`WritableFile`] until it's either closed or aborted.
///
/// If it goes out of scope before [`close()`](SinkGuard::close) is called
/// (an error, a panic, an early return), the sink is aborted.
pub(crate) struct SinkGuard {
    sink: Option<Box<dyn WritableFile>>,
}

impl SinkGuard {
    pub(crate) fn new(sink: Box<dyn WritableFile>) -> Self {
        Self { sink: Some(sink) }
    }

    pub(crate) fn close(mut self) -> SaveResult<()> {
        match self.sink.take() {
            Some(sink) => sink.close(),
            None => Ok(()),
        }
    }
}

impl io::Write for SinkGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Some(sink) => sink.write(buf),
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            debug!("Aborting unfinished write");
            if let Err(e) = sink.abort() {
                warn!("Couldn't abort unfinished write: {e}");
            }
        }
    }
}

/// Streams the entry into the sink, closing it on success
/// and aborting it otherwise.
pub(crate) fn stream_into(
    entry: &dyn ArchiveEntry,
    sink: Box<dyn WritableFile>,
) -> SaveResult<u64> {
    let mut guard = SinkGuard::new(sink);
    let mut reader = entry.open()?;
    let written = io::copy(&mut reader, &mut guard)?;
    guard.close()?;
    trace!("Wrote {written} bytes of {}", entry.filename());
    Ok(written)
}
