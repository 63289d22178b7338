//! Filesystem-backed versions of the platform capabilities,
//! for running the save strategies outside of a browser.
//!
//! - [`TerminalPicker`] asks for a destination on the terminal.
//! - [`ServedDir`] checks for the proxy's assets in a directory being served.
//! - [`DownloadsDir`] stands in for the browser's download manager,
//!   both for proxy streams and object URLs.
//!
//! Writes go to a temporary file next to the destination
//! and are only moved into place once they finish,
//! so a failed or cancelled save leaves nothing behind.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use log::*;
use tempfile::NamedTempFile;

use crate::persist::blob::{Blob, ObjectUrls};
use crate::persist::handle::{FileHandle, SaveFilePicker};
use crate::persist::proxy::{AssetProbe, StreamService};
use crate::persist::WritableFile;
use crate::result::*;

/// Prompts for a destination on stderr and reads the answer from `input`.
///
/// An empty answer takes the suggested name in `default_dir`.
/// An answer naming a directory saves the suggested name inside it.
/// End of input or a lone `-` cancels.
pub struct TerminalPicker<R> {
    input: Mutex<R>,
    default_dir: Utf8PathBuf,
}

impl<R: BufRead> TerminalPicker<R> {
    pub fn new<P: Into<Utf8PathBuf>>(input: R, default_dir: P) -> Self {
        Self {
            input: Mutex::new(input),
            default_dir: default_dir.into(),
        }
    }
}

impl<R: BufRead> SaveFilePicker for TerminalPicker<R> {
    fn pick(&self, suggested_name: &str) -> SaveResult<Box<dyn FileHandle>> {
        let suggested = self.default_dir.join(safe_name(suggested_name));
        eprint!("Save as [{suggested}] (- to cancel): ");
        io::stderr().flush()?;

        let mut answer = String::new();
        let read = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_line(&mut answer)?;
        let answer = answer.trim();
        if read == 0 || answer == "-" {
            return Err(SaveError::Aborted);
        }

        let path = if answer.is_empty() {
            suggested
        } else {
            let chosen = Utf8PathBuf::from(answer);
            if chosen.is_dir() {
                chosen.join(safe_name(suggested_name))
            } else {
                chosen
            }
        };
        debug!("Picked {path}");
        Ok(Box::new(LocalFile::new(path)))
    }
}

/// A file the user chose to save to. Existing files get replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: Utf8PathBuf,
}

impl LocalFile {
    pub fn new<P: Into<Utf8PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl FileHandle for LocalFile {
    fn create_writable(&self) -> SaveResult<Box<dyn WritableFile>> {
        Ok(Box::new(AtomicWritable::create(&self.path, true)?))
    }
}

/// Writes to a temporary file and moves it to its destination on close.
///
/// Dropping it without closing deletes the temporary file.
pub struct AtomicWritable {
    temp: NamedTempFile,
    destination: Utf8PathBuf,
    overwrite: bool,
}

impl AtomicWritable {
    pub fn create(destination: &Utf8Path, overwrite: bool) -> SaveResult<Self> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir)?;
        trace!("Writing {destination} via {}", temp.path().display());
        Ok(Self {
            temp,
            destination: destination.to_owned(),
            overwrite,
        })
    }
}

impl Write for AtomicWritable {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}

impl WritableFile for AtomicWritable {
    fn close(mut self: Box<Self>) -> SaveResult<()> {
        self.temp.flush()?;
        let Self {
            temp,
            destination,
            overwrite,
        } = *self;
        let persisted = if overwrite {
            temp.persist(&destination)
        } else {
            temp.persist_noclobber(&destination)
        };
        persisted.map_err(|e| e.error)?;
        debug!("Saved {destination}");
        Ok(())
    }

    fn abort(self: Box<Self>) -> SaveResult<()> {
        trace!("Discarding partial write to {}", self.destination);
        self.temp.close()?;
        Ok(())
    }
}

/// A directory being served to the client,
/// where the proxy's assets are expected to live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedDir {
    root: Utf8PathBuf,
}

impl ServedDir {
    pub fn new<P: Into<Utf8PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl AssetProbe for ServedDir {
    fn exists(&self, path: &str) -> SaveResult<bool> {
        let on_disk = self.root.join(path.trim_start_matches('/'));
        match fs::metadata(&on_disk) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// A downloads folder, playing the part of the browser's download manager.
///
/// New downloads never replace existing files.
/// Like browsers, we number them instead: `notes.txt`, `notes (1).txt`, ...
///
/// Object URLs are revoked by one background thread, started with the first
/// revocation and stopped when this is dropped. Anything still pending then
/// goes with the map.
pub struct DownloadsDir {
    dir: Utf8PathBuf,
    urls: ObjectMap,
    next_url: AtomicUsize,
    reaper: OnceLock<Sender<(Instant, String)>>,
}

type ObjectMap = Arc<Mutex<HashMap<String, Blob>>>;

impl DownloadsDir {
    pub fn new<P: Into<Utf8PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            urls: Arc::default(),
            next_url: AtomicUsize::new(0),
            reaper: OnceLock::new(),
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns how many object URLs haven't been revoked yet.
    pub fn live_urls(&self) -> usize {
        lock(&self.urls).len()
    }

    fn new_download(&self, name: &str) -> SaveResult<AtomicWritable> {
        let destination = unique_destination(&self.dir, name);
        AtomicWritable::create(&destination, false)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StreamService for DownloadsDir {
    fn supported(&self) -> bool {
        self.dir.is_dir()
    }

    fn create_write_stream(
        &self,
        mitm: &str,
        name: &str,
        size: Option<u64>,
    ) -> SaveResult<Box<dyn WritableFile>> {
        match size {
            Some(size) => debug!("Streaming {name} ({size} bytes) via {mitm}"),
            None => debug!("Streaming {name} via {mitm}"),
        }
        Ok(Box::new(self.new_download(name)?))
    }
}

impl ObjectUrls for DownloadsDir {
    fn create_object_url(&self, blob: Blob) -> SaveResult<String> {
        let id = self.next_url.fetch_add(1, Ordering::Relaxed) + 1;
        let url = format!("blob:zipview/{id}");
        trace!("{url}: {} bytes of {}", blob.bytes.len(), blob.content_type);
        lock(&self.urls).insert(url.clone(), blob);
        Ok(url)
    }

    fn trigger_download(&self, url: &str, name: &str) -> SaveResult<()> {
        let urls = lock(&self.urls);
        let blob = urls
            .get(url)
            .ok_or_else(|| SaveError::Platform(format!("No object at {url}")))?;
        let mut download = Box::new(self.new_download(name)?);
        download.write_all(&blob.bytes)?;
        download.close()
    }

    fn revoke_after(&self, url: String, delay: Duration) {
        let reaper = self.reaper.get_or_init(|| {
            let (requests, pending) = mpsc::channel();
            let urls = Arc::clone(&self.urls);
            thread::spawn(move || reap(urls, pending));
            requests
        });
        if let Err(mpsc::SendError((_, url))) = reaper.send((Instant::now() + delay, url)) {
            warn!("Revoker is gone; revoking {url} now");
            revoke(&self.urls, &url);
        }
    }
}

/// Revokes URLs as their deadlines pass, until the sending side hangs up.
fn reap(urls: ObjectMap, pending: Receiver<(Instant, String)>) {
    let mut due: BinaryHeap<Reverse<(Instant, String)>> = BinaryHeap::new();
    loop {
        let now = Instant::now();
        while let Some(Reverse((when, url))) = due.pop() {
            if when > now {
                due.push(Reverse((when, url)));
                break;
            }
            revoke(&urls, &url);
        }

        let next = match due.peek() {
            Some(Reverse((when, _))) => pending.recv_timeout(when.saturating_duration_since(now)),
            None => pending.recv().map_err(RecvTimeoutError::from),
        };
        match next {
            Ok(request) => due.push(Reverse(request)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                trace!("Revoker stopping with {} URLs pending", due.len());
                return;
            }
        }
    }
}

fn revoke(urls: &ObjectMap, url: &str) {
    if lock(urls).remove(url).is_none() {
        warn!("Revoked unknown object URL {url}");
    } else {
        trace!("Revoked {url}");
    }
}

/// Makes sure a name from the archive can't point outside the directory
/// it's saved in.
fn safe_name(name: &str) -> String {
    let name = name.replace(['/', '\\'], "_");
    match name.as_str() {
        "" | "." | ".." => String::from("download"),
        _ => name,
    }
}

fn unique_destination(dir: &Utf8Path, name: &str) -> Utf8PathBuf {
    let name = safe_name(name);
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Utf8Path::new(&name);
    let (stem, extension) = match (as_path.file_stem(), as_path.extension()) {
        (Some(stem), Some(ext)) => (stem, Some(ext)),
        _ => (name.as_str(), None),
    };
    let mut n = 1;
    loop {
        let numbered = match extension {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        };
        if !numbered.exists() {
            return numbered;
        }
        n += 1;
    }
}
