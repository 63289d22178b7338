//! The last resort: read the whole entry into memory and hand it off
//! as a download.
//!
//! Every platform can do this, but it holds the entire file in memory,
//! so it only runs after the streaming strategies have passed.

use std::io::Read;
use std::time::Duration;

use log::*;

use super::{PersistenceOutcome, Strategy};
use crate::download::DownloadMethod;
use crate::entry::ArchiveEntry;
use crate::path::file_name;
use crate::result::*;

/// How long a temporary URL stays alive after its download is triggered.
pub const REVOKE_DELAY: Duration = Duration::from_secs(1);

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Most we'll reserve up front on the archive's word.
/// The declared size is only a hint; past this, the buffer grows as it reads.
const PREALLOCATION_LIMIT: u64 = 64 * 1024 * 1024;

/// Decompressed contents plus a content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// The platform's downloadable-object machinery.
pub trait ObjectUrls {
    /// Registers the blob and returns a temporary URL for it.
    fn create_object_url(&self, blob: Blob) -> SaveResult<String>;

    /// Kicks off the platform's own download of `url`, saved as `name`.
    fn trigger_download(&self, url: &str, name: &str) -> SaveResult<()>;

    /// Releases `url` once `delay` has passed.
    fn revoke_after(&self, url: String, delay: Duration);
}

/// Guesses a content type from the file's extension,
/// then from its first few bytes.
pub fn content_type(filename: &str, bytes: &[u8]) -> &'static str {
    let extension = file_name(filename)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    extension
        .as_deref()
        .and_then(content_type_for_extension)
        .or_else(|| infer::get(bytes).map(|t| t.mime_type()))
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}

/// Reads the entry into memory and triggers a download of it.
///
/// Nothing comes after this tier, so read or hand-off failures are reported
/// as [`PersistenceOutcome::Error`] for the caller to surface.
pub struct ObjectUrl<U> {
    urls: U,
}

impl<U: ObjectUrls> ObjectUrl<U> {
    pub fn new(urls: U) -> Self {
        Self { urls }
    }

    fn save(&self, entry: &dyn ArchiveEntry) -> SaveResult<()> {
        let mut bytes = Vec::new();
        let hint = entry
            .uncompressed_size()
            .unwrap_or(0)
            .min(PREALLOCATION_LIMIT);
        bytes
            .try_reserve_exact(usize::try_from(hint).unwrap_or(0))
            .map_err(|e| SaveError::Platform(format!("Can't buffer {}: {e}", entry.filename())))?;
        entry.open()?.read_to_end(&mut bytes)?;

        let content_type = content_type(entry.filename(), &bytes);
        trace!("{} is {content_type}", entry.filename());
        let url = self.urls.create_object_url(Blob {
            bytes,
            content_type,
        })?;

        // Revoke the URL even if the hand-off fails.
        let triggered = self
            .urls
            .trigger_download(&url, file_name(entry.filename()));
        self.urls.revoke_after(url, REVOKE_DELAY);
        triggered
    }
}

impl<U: ObjectUrls> Strategy for ObjectUrl<U> {
    fn method(&self) -> DownloadMethod {
        DownloadMethod::Blob
    }

    fn probe(&self) -> bool {
        true
    }

    fn attempt(&self, entry: &dyn ArchiveEntry) -> PersistenceOutcome {
        if entry.is_directory() {
            return PersistenceOutcome::Unsupported;
        }
        debug!("Downloading {} via object URL", entry.filename());
        PersistenceOutcome::classify("Object URL", self.save(entry))
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::io;

    use super::*;
    use crate::entry::MemoryEntry;

    #[derive(Default)]
    struct FakeUrls {
        fail_trigger: bool,
        created: RefCell<Vec<Blob>>,
        triggered: RefCell<Vec<(String, String)>>,
        revoked: RefCell<Vec<(String, Duration)>>,
    }

    impl ObjectUrls for FakeUrls {
        fn create_object_url(&self, blob: Blob) -> SaveResult<String> {
            let mut created = self.created.borrow_mut();
            created.push(blob);
            Ok(format!("blob:test/{}", created.len()))
        }

        fn trigger_download(&self, url: &str, name: &str) -> SaveResult<()> {
            self.triggered
                .borrow_mut()
                .push((url.to_owned(), name.to_owned()));
            if self.fail_trigger {
                return Err(SaveError::Platform(String::from("no anchor")));
            }
            Ok(())
        }

        fn revoke_after(&self, url: String, delay: Duration) {
            self.revoked.borrow_mut().push((url, delay));
        }
    }

    /// An entry whose reader breaks halfway through.
    struct BrokenEntry;

    impl ArchiveEntry for BrokenEntry {
        fn filename(&self) -> &str {
            "huge.bin"
        }

        fn is_directory(&self) -> bool {
            false
        }

        fn uncompressed_size(&self) -> Option<u64> {
            None
        }

        fn open(&self) -> io::Result<Box<dyn io::Read + Send + '_>> {
            Ok(Box::new(io::Read::chain(
                &b"partial"[..],
                FailingReader,
            )))
        }
    }

    struct FailingReader;

    impl io::Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::OutOfMemory, "too big"))
        }
    }

    #[test]
    fn downloads_and_revokes() {
        let tier = ObjectUrl::new(FakeUrls::default());
        let entry = MemoryEntry::file("dir1/file1.txt", "one");
        assert!(tier.probe());
        assert_eq!(tier.attempt(&entry), PersistenceOutcome::Success);

        let urls = &tier.urls;
        assert_eq!(
            *urls.created.borrow(),
            [Blob {
                bytes: b"one".to_vec(),
                content_type: "text/plain"
            }]
        );
        assert_eq!(
            *urls.triggered.borrow(),
            [(String::from("blob:test/1"), String::from("file1.txt"))]
        );
        assert_eq!(
            *urls.revoked.borrow(),
            [(String::from("blob:test/1"), REVOKE_DELAY)]
        );
    }

    #[test]
    fn read_failure_is_error() {
        let tier = ObjectUrl::new(FakeUrls::default());
        assert_eq!(tier.attempt(&BrokenEntry), PersistenceOutcome::Error);
        assert!(tier.urls.created.borrow().is_empty());
    }

    /// An entry whose header claims far more than it holds.
    struct Overstated(u64);

    impl ArchiveEntry for Overstated {
        fn filename(&self) -> &str {
            "small.txt"
        }

        fn is_directory(&self) -> bool {
            false
        }

        fn uncompressed_size(&self) -> Option<u64> {
            Some(self.0)
        }

        fn open(&self) -> io::Result<Box<dyn io::Read + Send + '_>> {
            Ok(Box::new(&b"abc"[..]))
        }
    }

    #[test]
    fn declared_size_is_only_a_hint() {
        for declared in [u64::MAX, 100 << 30, PREALLOCATION_LIMIT + 1] {
            let tier = ObjectUrl::new(FakeUrls::default());
            assert_eq!(
                tier.attempt(&Overstated(declared)),
                PersistenceOutcome::Success
            );
            assert_eq!(tier.urls.created.borrow()[0].bytes, b"abc");
        }
    }

    #[test]
    fn trigger_failure_still_revokes() {
        let urls = FakeUrls {
            fail_trigger: true,
            ..Default::default()
        };
        let tier = ObjectUrl::new(urls);
        let entry = MemoryEntry::file("a.txt", "a");
        assert_eq!(tier.attempt(&entry), PersistenceOutcome::Error);
        assert_eq!(tier.urls.revoked.borrow().len(), 1);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("notes/README.TXT", b""), "text/plain");
        assert_eq!(content_type("img/photo.jpeg", b""), "image/jpeg");
        assert_eq!(content_type("data.json", b"{}"), "application/json");
        // No extension: sniff the bytes.
        assert_eq!(
            content_type("image", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            "image/png"
        );
        assert_eq!(content_type("mystery", b"???"), "application/octet-stream");
        assert_eq!(content_type("archive.unknownext", b""), "application/octet-stream");
        // Dots in directory names don't count.
        assert_eq!(content_type("v1.2/LICENSE", b""), "application/octet-stream");
    }
}
