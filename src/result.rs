//! Error types and the related `Result<T>`

use std::io;

use thiserror::Error;

pub type SaveResult<T> = Result<T, SaveError>;

#[derive(Debug, Error)]
pub enum SaveError {
    /// The environment lacks a capability a strategy needs.
    /// Expected on most platforms, so it's never logged as a fault.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The user dismissed a destination prompt or cancelled a transfer.
    #[error("Aborted by the user")]
    Aborted,

    /// An error from underlying I/O
    #[error("I/O Error: {0}")]
    Io(#[source] io::Error),

    /// A platform capability failed in some way that isn't I/O.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Every tier failed, including the terminal one.
    #[error("No save method succeeded")]
    Exhausted,
}

impl From<io::Error> for SaveError {
    fn from(e: io::Error) -> Self {
        if UserAborted::is_wrapped_by(&e) {
            SaveError::Aborted
        } else {
            SaveError::Io(e)
        }
    }
}

/// Payload for an `io::Error` raised when the user cancels mid-transfer.
///
/// Sinks only speak `io::Write`, so they can't return [`SaveError::Aborted`]
/// directly. Wrap this instead (`io::Error::other(UserAborted)`)
/// and the conversion into `SaveError` will recognize it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transfer cancelled by the user")]
pub struct UserAborted;

impl UserAborted {
    pub fn into_io(self) -> io::Error {
        io::Error::other(self)
    }

    fn is_wrapped_by(e: &io::Error) -> bool {
        e.get_ref()
            .and_then(|inner| inner.downcast_ref::<UserAborted>())
            .is_some()
    }
}
