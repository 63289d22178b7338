//! The boundary with whatever actually parses the archive.

use std::io;

/// One file or directory record in an archive.
///
/// zipview doesn't decode ZIP files itself.
/// Implement this for the entries of your archive reader of choice;
/// [`MemoryEntry`] is a ready-made one for data already in memory.
pub trait ArchiveEntry {
    /// The full, slash-delimited path of the entry inside the archive.
    fn filename(&self) -> &str;

    /// True if the entry is a directory marker rather than a file.
    fn is_directory(&self) -> bool;

    /// Uncompressed size in bytes, if the archive recorded one.
    fn uncompressed_size(&self) -> Option<u64>;

    /// Opens a reader over the decompressed contents of the entry.
    fn open(&self) -> io::Result<Box<dyn io::Read + Send + '_>>;
}

impl<E: ArchiveEntry + ?Sized> ArchiveEntry for &E {
    fn filename(&self) -> &str {
        (**self).filename()
    }

    fn is_directory(&self) -> bool {
        (**self).is_directory()
    }

    fn uncompressed_size(&self) -> Option<u64> {
        (**self).uncompressed_size()
    }

    fn open(&self) -> io::Result<Box<dyn io::Read + Send + '_>> {
        (**self).open()
    }
}

/// An archive entry whose decompressed contents are already in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryEntry {
    pub filename: String,
    pub directory: bool,
    pub contents: Vec<u8>,
}

impl MemoryEntry {
    pub fn file<S: Into<String>, B: Into<Vec<u8>>>(filename: S, contents: B) -> Self {
        Self {
            filename: filename.into(),
            directory: false,
            contents: contents.into(),
        }
    }

    pub fn directory<S: Into<String>>(filename: S) -> Self {
        Self {
            filename: filename.into(),
            directory: true,
            contents: Vec::new(),
        }
    }
}

impl ArchiveEntry for MemoryEntry {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn is_directory(&self) -> bool {
        self.directory
    }

    fn uncompressed_size(&self) -> Option<u64> {
        if self.directory {
            None
        } else {
            Some(self.contents.len() as u64)
        }
    }

    fn open(&self) -> io::Result<Box<dyn io::Read + Send + '_>> {
        Ok(Box::new(io::Cursor::new(&self.contents[..])))
    }
}
