use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use crate::error::NpyResult;

// ---------------------------------------------------------------------------
// ArchiveSource trait
// ---------------------------------------------------------------------------

/// Where an NPZ archive's bytes come from.
///
/// [`crate::npz::NpzTensors`] calls [`ArchiveSource::open`] once per lookup
/// and never keeps a reader between calls, so implementations must be able to
/// hand out independent readers.
pub trait ArchiveSource: Send + Sync {
    type Reader: Read + Seek;

    /// Open a fresh reader positioned at the start of the archive.
    fn open(&self) -> NpyResult<Self::Reader>;

    /// Human-readable location, used in error messages and logs.
    fn location(&self) -> String;
}

// ---------------------------------------------------------------------------
// LocalArchive  (std::fs)
// ---------------------------------------------------------------------------

/// An archive on the local filesystem, reopened on every call.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    path: PathBuf,
}

impl LocalArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveSource for LocalArchive {
    type Reader = BufReader<File>;

    fn open(&self) -> NpyResult<Self::Reader> {
        Ok(BufReader::new(File::open(&self.path)?))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// MemoryArchive  (bytes::Bytes)
// ---------------------------------------------------------------------------

/// An archive held in memory. Each reader shares the same buffer.
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    data: Bytes,
}

impl MemoryArchive {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ArchiveSource for MemoryArchive {
    type Reader = Cursor<Bytes>;

    fn open(&self) -> NpyResult<Self::Reader> {
        Ok(Cursor::new(self.data.clone()))
    }

    fn location(&self) -> String {
        format!("<memory: {} bytes>", self.data.len())
    }
}
