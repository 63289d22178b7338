//! Saving through a destination the user picks, streamed straight to it.

use log::*;

use super::{stream_into, PersistenceOutcome, Strategy, WritableFile};
use crate::download::DownloadMethod;
use crate::entry::ArchiveEntry;
use crate::path::file_name;
use crate::result::*;

/// Asks the user where to save a file.
pub trait SaveFilePicker {
    /// Shows the prompt with `suggested_name` filled in.
    ///
    /// Returns [`SaveError::Aborted`] if the user dismisses it.
    fn pick(&self, suggested_name: &str) -> SaveResult<Box<dyn FileHandle>>;
}

/// A destination chosen through a [`SaveFilePicker`].
pub trait FileHandle {
    /// Opens the destination for writing.
    fn create_writable(&self) -> SaveResult<Box<dyn WritableFile>>;
}

/// The richest tier: a native save prompt, any destination,
/// and no buffering of the whole file in memory.
pub struct DirectHandle<P> {
    secure_context: bool,
    picker: Option<P>,
}

impl<P: SaveFilePicker> DirectHandle<P> {
    /// `picker` is `None` where the platform has no save prompt to offer.
    pub fn new(secure_context: bool, picker: Option<P>) -> Self {
        Self {
            secure_context,
            picker,
        }
    }

    fn save(&self, picker: &P, entry: &dyn ArchiveEntry) -> SaveResult<u64> {
        let handle = picker.pick(file_name(entry.filename()))?;
        let writable = handle.create_writable()?;
        stream_into(entry, writable)
    }
}

impl<P: SaveFilePicker> Strategy for DirectHandle<P> {
    fn method(&self) -> DownloadMethod {
        DownloadMethod::Filesystem
    }

    fn probe(&self) -> bool {
        self.secure_context && self.picker.is_some()
    }

    fn attempt(&self, entry: &dyn ArchiveEntry) -> PersistenceOutcome {
        if entry.is_directory() {
            return PersistenceOutcome::Unsupported;
        }
        let picker = match &self.picker {
            Some(p) if self.probe() => p,
            _ => {
                if !self.secure_context {
                    debug!("Save prompt unavailable: insecure context");
                } else {
                    debug!("Save prompt unavailable: no picker");
                }
                return PersistenceOutcome::Unsupported;
            }
        };

        debug!("Attempting a direct save of {}", entry.filename());
        PersistenceOutcome::classify("Direct save", self.save(picker, entry))
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::entry::MemoryEntry;
    use crate::persist::test_sinks::*;

    /// Hands out a recording sink, or fails the way it's told to.
    struct FakePicker {
        dismiss: bool,
        fail_open: bool,
        fail_after: Option<usize>,
        log: Arc<Mutex<SinkLog>>,
        suggested: RefCell<Vec<String>>,
    }

    impl FakePicker {
        fn new() -> Self {
            Self {
                dismiss: false,
                fail_open: false,
                fail_after: None,
                log: Arc::default(),
                suggested: RefCell::default(),
            }
        }
    }

    struct FakeHandle {
        fail_open: bool,
        fail_after: Option<usize>,
        log: Arc<Mutex<SinkLog>>,
    }

    impl SaveFilePicker for FakePicker {
        fn pick(&self, suggested_name: &str) -> SaveResult<Box<dyn FileHandle>> {
            self.suggested.borrow_mut().push(suggested_name.to_owned());
            if self.dismiss {
                return Err(SaveError::Aborted);
            }
            Ok(Box::new(FakeHandle {
                fail_open: self.fail_open,
                fail_after: self.fail_after,
                log: self.log.clone(),
            }))
        }
    }

    impl FileHandle for FakeHandle {
        fn create_writable(&self) -> SaveResult<Box<dyn WritableFile>> {
            if self.fail_open {
                return Err(SaveError::Platform("read-only volume".into()));
            }
            Ok(Box::new(RecordingSink {
                log: self.log.clone(),
                fail_after: self.fail_after,
                user_abort: false,
            }))
        }
    }

    #[test]
    fn saves_with_suggested_name() {
        let tier = DirectHandle::new(true, Some(FakePicker::new()));
        let entry = MemoryEntry::file("dir1/dir2/file3.txt", "contents");
        assert_eq!(tier.attempt(&entry), PersistenceOutcome::Success);

        let picker = tier.picker.as_ref().unwrap();
        assert_eq!(*picker.suggested.borrow(), ["file3.txt"]);
        let log = picker.log.lock().unwrap();
        assert_eq!(log.written, b"contents");
        assert!(log.closed && !log.aborted);
    }

    #[test]
    fn unsupported_without_capability() {
        let entry = MemoryEntry::file("a.txt", "a");

        let insecure = DirectHandle::new(false, Some(FakePicker::new()));
        assert!(!insecure.probe());
        assert_eq!(insecure.attempt(&entry), PersistenceOutcome::Unsupported);
        // Nothing was prompted for.
        assert!(insecure.picker.unwrap().suggested.borrow().is_empty());

        let missing: DirectHandle<FakePicker> = DirectHandle::new(true, None);
        assert!(!missing.probe());
        assert_eq!(missing.attempt(&entry), PersistenceOutcome::Unsupported);
    }

    #[test]
    fn dismissal_is_cancellation() {
        let mut picker = FakePicker::new();
        picker.dismiss = true;
        let tier = DirectHandle::new(true, Some(picker));
        let entry = MemoryEntry::file("a.txt", "a");
        assert_eq!(tier.attempt(&entry), PersistenceOutcome::Cancelled);
    }

    #[test]
    fn write_failure_aborts() {
        let mut picker = FakePicker::new();
        picker.fail_after = Some(3);
        let tier = DirectHandle::new(true, Some(picker));
        let entry = MemoryEntry::file("a.txt", "abcdefgh");
        assert_eq!(tier.attempt(&entry), PersistenceOutcome::Error);

        let log = tier.picker.as_ref().unwrap().log.lock().unwrap();
        assert!(log.aborted && !log.closed);
    }

    #[test]
    fn open_failure_is_error() {
        let mut picker = FakePicker::new();
        picker.fail_open = true;
        let tier = DirectHandle::new(true, Some(picker));
        let entry = MemoryEntry::file("a.txt", "a");
        assert_eq!(tier.attempt(&entry), PersistenceOutcome::Error);
    }

    #[test]
    fn directories_are_unsupported() {
        let tier = DirectHandle::new(true, Some(FakePicker::new()));
        let entry = MemoryEntry::directory("dir1/");
        assert_eq!(tier.attempt(&entry), PersistenceOutcome::Unsupported);
        assert!(tier.picker.unwrap().suggested.borrow().is_empty());
    }
}
