//! NPZ archives: many NPY entries in one zip file, keyed by array name.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{NpyError, NpyResult};
use crate::npy::{NPY_SUFFIX, read_array, read_header, write_array};
use crate::store::{ArchiveSource, LocalArchive};
use crate::types::{Array, ElementType, Shape};

/// Logical array name of an archive entry (`weights.npy` -> `weights`).
fn array_name(entry_name: &str) -> &str {
    entry_name.strip_suffix(NPY_SUFFIX).unwrap_or(entry_name)
}

/// Magic, version, length field and the largest header they can announce.
const MAX_FRAMING_LEN: u64 = 10 + u16::MAX as u64;

/// Entries that may reach 4 GiB, header included, need zip64 sizes.
fn needs_zip64(payload_len: u64) -> bool {
    payload_len.saturating_add(MAX_FRAMING_LEN) >= u64::from(u32::MAX)
}

fn entry_name(array_name: &str) -> String {
    format!("{array_name}{NPY_SUFFIX}")
}

// ---------------------------------------------------------------------------
// NpzTensors  (lazy, name-indexed reader)
// ---------------------------------------------------------------------------

/// Name index over an NPZ archive. Arrays are decoded only when asked for,
/// and every lookup reopens the archive through its [`ArchiveSource`], so a
/// shared `NpzTensors` can serve concurrent readers without a lock.
#[derive(Debug, Clone)]
pub struct NpzTensors<S: ArchiveSource = LocalArchive> {
    index: HashMap<String, usize>,
    source: S,
}

impl NpzTensors<LocalArchive> {
    /// Index the NPZ file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> NpyResult<Self> {
        Self::from_source(LocalArchive::new(path))
    }
}

impl<S: ArchiveSource> NpzTensors<S> {
    /// Index every entry of the archive behind `source`. When two entries map
    /// to the same array name the later one wins.
    pub fn from_source(source: S) -> NpyResult<Self> {
        let mut archive = ZipArchive::new(source.open()?)?;
        let mut index = HashMap::with_capacity(archive.len());
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            index.insert(array_name(entry.name()).to_string(), i);
        }
        debug!(location = %source.location(), entries = index.len(), "indexed npz archive");
        Ok(Self { index, source })
    }

    /// Array names in the archive, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn locate(&self, name: &str) -> NpyResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| NpyError::NotFound(format!("cannot find tensor {name}")))
    }

    /// Reopen the archive and run `decode` over one entry's bytes.
    fn with_entry<T>(
        &self,
        index: usize,
        decode: impl FnOnce(&mut dyn Read) -> NpyResult<T>,
    ) -> NpyResult<T> {
        let mut archive = ZipArchive::new(self.source.open()?)?;
        let mut entry = archive.by_index(index)?;
        decode(&mut entry)
    }

    /// Shape and element type of `name`, read from its header alone.
    pub fn shape_and_dtype(&self, name: &str) -> NpyResult<(Shape, ElementType)> {
        let index = self.locate(name)?;
        debug!(name, index, "probing npz entry");
        let header = self.with_entry(index, |mut entry| read_header(&mut entry))?;
        Ok((header.shape, header.dtype))
    }

    /// Decode the array stored under `name`.
    pub fn get(&self, name: &str) -> NpyResult<Array> {
        let index = self.locate(name)?;
        debug!(name, index, "loading npz entry");
        self.with_entry(index, |mut entry| read_array(&mut entry))
    }

    /// Decode every entry, in archive order.
    pub fn get_all(&self) -> NpyResult<Vec<(String, Array)>> {
        let mut archive = ZipArchive::new(self.source.open()?)?;
        read_all(&mut archive)
    }

    /// Decode the arrays called `names`, in the order given.
    pub fn get_many<N: AsRef<str>>(&self, names: &[N]) -> NpyResult<Vec<Array>> {
        let mut archive = ZipArchive::new(self.source.open()?)?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let index = self.index.get(name).copied().ok_or_else(|| {
                NpyError::NotFound(format!(
                    "no array for {name} in {}",
                    self.source.location()
                ))
            })?;
            let mut entry = archive.by_index(index)?;
            out.push(read_array(&mut entry)?);
        }
        debug!(count = out.len(), "loaded npz entries by name");
        Ok(out)
    }
}

fn read_all<R: Read + Seek>(archive: &mut ZipArchive<R>) -> NpyResult<Vec<(String, Array)>> {
    let mut out = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = array_name(entry.name()).to_string();
        let array = read_array(&mut entry)?;
        out.push((name, array));
    }
    debug!(count = out.len(), "loaded all npz entries");
    Ok(out)
}

// ---------------------------------------------------------------------------
// Free-standing readers
// ---------------------------------------------------------------------------

/// Decode every array in the NPZ file at `path`, in archive order.
pub fn read_npz(path: impl AsRef<Path>) -> NpyResult<Vec<(String, Array)>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading npz file");
    let mut archive = ZipArchive::new(LocalArchive::new(path).open()?)?;
    read_all(&mut archive)
}

/// Decode the arrays called `names` from the NPZ file at `path`, in the order
/// given, without indexing the rest of the archive.
pub fn read_npz_by_name<N: AsRef<str>>(path: impl AsRef<Path>, names: &[N]) -> NpyResult<Vec<Array>> {
    let path = path.as_ref();
    let mut archive = ZipArchive::new(LocalArchive::new(path).open()?)?;

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let mut entry = match archive.by_name(&entry_name(name)) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(NpyError::NotFound(format!(
                    "no array for {name} in {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        out.push(read_array(&mut entry)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NpzCompression {
    /// Entries stored as-is, like `numpy.savez`.
    #[default]
    Stored,
    /// Deflate-compressed entries, like `numpy.savez_compressed`.
    Deflated,
}

impl NpzCompression {
    fn method(self) -> CompressionMethod {
        match self {
            NpzCompression::Stored => CompressionMethod::Stored,
            NpzCompression::Deflated => CompressionMethod::Deflated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NpzWriteOptions {
    pub compression: NpzCompression,
}

impl NpzWriteOptions {
    pub fn compressed() -> Self {
        Self {
            compression: NpzCompression::Deflated,
        }
    }
}

/// Write `tensors` as an NPZ archive into `writer`, one `<name>.npy` entry
/// per array, and return the writer once the archive is finished.
///
/// A failing entry aborts the write; entries already written stay in the
/// sink.
pub fn write_npz_to<'a, W, I, N>(writer: W, tensors: I, options: &NpzWriteOptions) -> NpyResult<W>
where
    W: Write + Seek,
    I: IntoIterator<Item = (N, &'a Array)>,
    N: AsRef<str>,
{
    let mut zip = ZipWriter::new(writer);
    let mut count = 0usize;
    for (name, array) in tensors {
        let large = needs_zip64(array.data().byte_len() as u64);
        let entry_options = SimpleFileOptions::default()
            .compression_method(options.compression.method())
            .large_file(large);
        zip.start_file(entry_name(name.as_ref()), entry_options)?;
        write_array(&mut zip, array)?;
        count += 1;
    }
    let writer = zip.finish()?;
    debug!(entries = count, compression = ?options.compression, "wrote npz archive");
    Ok(writer)
}

/// Write `tensors` to a new NPZ file at `path` with stored (uncompressed)
/// entries.
pub fn write_npz<'a, I, N>(path: impl AsRef<Path>, tensors: I) -> NpyResult<()>
where
    I: IntoIterator<Item = (N, &'a Array)>,
    N: AsRef<str>,
{
    write_npz_with_options(path, tensors, &NpzWriteOptions::default())
}

pub fn write_npz_with_options<'a, I, N>(
    path: impl AsRef<Path>,
    tensors: I,
    options: &NpzWriteOptions,
) -> NpyResult<()>
where
    I: IntoIterator<Item = (N, &'a Array)>,
    N: AsRef<str>,
{
    let path = path.as_ref();
    debug!(path = %path.display(), "writing npz file");
    let file = BufWriter::new(File::create(path)?);
    let mut file = write_npz_to(file, tensors, options)?;
    file.flush()?;
    Ok(())
}
