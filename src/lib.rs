//! zipview lets you browse a ZIP archive like a directory tree
//! and save individual entries with whatever the platform allows.
//!
//! zipview doesn't read ZIP files itself. Bring your own reader
//! and implement [`ArchiveEntry`] for its entries
//! (or use [`MemoryEntry`] for data you already have):
//!
//! ```
//! use zipview::*;
//!
//! let entries = vec![
//!     MemoryEntry::file("dir1/file1.txt", "one"),
//!     MemoryEntry::file("dir1/dir2/file3.txt", "three"),
//!     MemoryEntry::file("file5.txt", "five"),
//! ];
//!
//! // List one directory at a time, no tree required.
//! let root = list(&entries, &ListingScope::root(DEFAULT_MAX_DEPTH));
//! assert_eq!(root.directories, ["dir1"]);
//! assert_eq!(root.files[0].filename, "file5.txt");
//!
//! let dir1 = list(&entries, &ListingScope::new("dir1", DEFAULT_MAX_DEPTH));
//! assert_eq!(dir1.directories, ["dir1/dir2"]);
//! assert_eq!(dir1.files[0].filename, "dir1/file1.txt");
//! ```
//!
//! Saving is the messier part. Depending on where we're running,
//! we might be able to stream straight into a file the user picks,
//! stream through a proxy service, or only hand off a buffer in memory.
//! A [`Downloader`] tries each of these in that order
//! and tells you which one worked:
//!
//! ```no_run
//! use std::io;
//! use zipview::*;
//! use zipview::native::*;
//! use zipview::persist::blob::ObjectUrl;
//! use zipview::persist::handle::DirectHandle;
//! use zipview::persist::proxy::{ProxyConfig, ProxyStream};
//!
//! let downloader = Downloader::standard(
//!     DirectHandle::new(true, Some(TerminalPicker::new(io::stdin().lock(), "."))),
//!     ProxyStream::new(
//!         true,
//!         ProxyConfig::default(),
//!         ServedDir::new("public"),
//!         DownloadsDir::new("downloads"),
//!     ),
//!     ObjectUrl::new(DownloadsDir::new("downloads")),
//! );
//!
//! let entry = MemoryEntry::file("dir1/file1.txt", "one");
//! match downloader.download(&entry)? {
//!     DownloadMethod::Cancelled => println!("Never mind then"),
//!     method => println!("Saved via {method}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! If the user cancels, nothing else is tried.
//! Unsupported or failed strategies fall through to the next one.

pub mod download;
pub mod entry;
pub mod listing;
pub mod native;
pub mod path;
pub mod persist;
pub mod result;

pub use download::{DownloadMethod, Downloader};
pub use entry::{ArchiveEntry, MemoryEntry};
pub use listing::{list, Listing, ListingScope, DEFAULT_MAX_DEPTH};
pub use persist::{PersistenceOutcome, Strategy};
