//! Filesystem access used by discovery and conversion.
//!
//! Everything that touches files goes through the [`FileSystem`] trait so the
//! pipeline can run against the real disk ([`LocalFs`]) or an in-memory tree
//! ([`MemoryFs`]) in tests.

mod local;
mod memory;

pub use local::LocalFs;
pub use memory::{Fault, MemoryFs};

use std::io::{self, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

/// Metadata returned by [`FileSystem::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
}

/// A readable, seekable file handle.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Narrow file-access capability injected into the pipeline.
pub trait FileSystem {
    /// Stat a path without following it into a directory listing.
    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Open an existing file for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek + '_>>;

    /// Create (or truncate) a file for writing.
    ///
    /// Data is only guaranteed to be visible to other readers, and on disk
    /// for a persistent filesystem, once the returned writer has been flushed.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + '_>>;

    /// Move a file. A persistent filesystem must not return before the new
    /// name is durable, since the source of a conversion is removed next.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Visit every regular file below `root`, in file-name order.
    ///
    /// `root` itself must be a directory.
    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path, FileStat) -> io::Result<()>,
    ) -> io::Result<()>;

    /// Path usable by code that can only read from the OS filesystem.
    ///
    /// Returns `None` when the file does not live on the local disk.
    fn local_path(&self, _path: &Path) -> Option<PathBuf> {
        None
    }

    /// Returns true if anything exists at `path`.
    fn exists(&self, path: &Path) -> io::Result<bool> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Lexically normalize a path by dropping `.` components.
///
/// `..` is kept as-is; no symlinks are resolved.
pub fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
