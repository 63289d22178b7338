//! Save an archive entry with whatever the platform supports.
//!
//! A [`Downloader`] walks its strategies in a fixed order:
//!
//! 1. [`DirectHandle`]: the user picks a destination and we stream into it.
//! 2. [`ProxyStream`]: stream through a proxy service with no prompt.
//! 3. [`ObjectUrl`]: buffer the whole thing and trigger a plain download.
//!
//! The first success wins. If the user cancels at any point,
//! we stop right there instead of trying something else behind their back.
//! Strategies that are unsupported or fail just pass to the next one.

use std::fmt;

use log::*;

use crate::entry::ArchiveEntry;
use crate::persist::blob::{ObjectUrl, ObjectUrls};
use crate::persist::handle::{DirectHandle, SaveFilePicker};
use crate::persist::proxy::{AssetProbe, ProxyStream, StreamService};
use crate::persist::{PersistenceOutcome, Strategy};
use crate::result::*;

/// How a download was finally delivered, if at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DownloadMethod {
    /// Streamed into a destination the user picked
    Filesystem,
    /// Streamed through the proxy service
    StreamSaver,
    /// Buffered in memory and handed off as an object URL
    Blob,
    /// The user cancelled, or there was nothing to download.
    Cancelled,
}

impl fmt::Display for DownloadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DownloadMethod::Filesystem => "filesystem",
            DownloadMethod::StreamSaver => "streamsaver",
            DownloadMethod::Blob => "blob",
            DownloadMethod::Cancelled => "cancelled",
        })
    }
}

/// Tries each of its strategies in turn until one delivers the entry.
pub struct Downloader {
    tiers: Vec<Box<dyn Strategy>>,
}

impl Downloader {
    /// Builds a downloader that tries the given strategies in order.
    pub fn new(tiers: Vec<Box<dyn Strategy>>) -> Self {
        Self { tiers }
    }

    /// Direct save, then proxy stream, then object URL.
    pub fn standard<P, A, S, U>(
        handle: DirectHandle<P>,
        proxy: ProxyStream<A, S>,
        blob: ObjectUrl<U>,
    ) -> Self
    where
        P: SaveFilePicker + 'static,
        A: AssetProbe + 'static,
        S: StreamService + 'static,
        U: ObjectUrls + 'static,
    {
        let tiers: Vec<Box<dyn Strategy>> =
            vec![Box::new(handle), Box::new(proxy), Box::new(blob)];
        Self::new(tiers)
    }

    /// Saves the entry, returning how it was delivered.
    ///
    /// Directories can't be downloaded and come back as
    /// [`DownloadMethod::Cancelled`] without anything being tried.
    /// An error is only returned if every strategy failed,
    /// the last one included.
    pub fn download(&self, entry: &dyn ArchiveEntry) -> SaveResult<DownloadMethod> {
        if entry.is_directory() {
            debug!("{} is a directory; not downloading", entry.filename());
            return Ok(DownloadMethod::Cancelled);
        }

        for tier in &self.tiers {
            match tier.attempt(entry) {
                PersistenceOutcome::Success => {
                    let method = tier.method();
                    info!("Saved {} via {method}", entry.filename());
                    return Ok(method);
                }
                PersistenceOutcome::Cancelled => {
                    info!("Save of {} cancelled", entry.filename());
                    return Ok(DownloadMethod::Cancelled);
                }
                PersistenceOutcome::Unsupported | PersistenceOutcome::Error => {
                    trace!("{} didn't work, moving on", tier.method());
                }
            }
        }

        warn!("Every save method failed for {}", entry.filename());
        Err(SaveError::Exhausted)
    }
}
