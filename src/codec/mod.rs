//! Source container access.
//!
//! The conversion engine only sees [`RarCodec`] and [`SourceArchive`]; the
//! production implementation is [`UnrarCodec`].

mod rar;
#[cfg(test)]
pub(crate) mod testing;

pub use rar::UnrarCodec;

use std::io::{self, Read};
use std::path::Path;

use crate::io::FileSystem;

/// One file stored in a source container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, `/`-separated, never starting with `/`.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// MS-DOS timestamp, `date << 16 | time`.
    pub dos_datetime: u32,
}

/// An opened source container.
pub trait SourceArchive {
    /// Every non-directory entry, in archive order.
    fn entries(&mut self) -> io::Result<Vec<ArchiveEntry>>;

    /// Open each non-directory entry in archive order and pass it to `visit`.
    ///
    /// Stops at the first error, whether it comes from the archive or from
    /// `visit`.
    fn stream(
        &mut self,
        visit: &mut dyn FnMut(&ArchiveEntry, &mut dyn Read) -> io::Result<()>,
    ) -> io::Result<()>;
}

/// Opens RAR containers stored on a [`FileSystem`].
pub trait RarCodec {
    fn open<'a>(
        &self,
        fs: &'a dyn FileSystem,
        path: &Path,
    ) -> io::Result<Box<dyn SourceArchive + 'a>>;
}

/// Turn a stored path into a `/`-separated archive name.
pub fn entry_name(raw: &str) -> String {
    raw.replace('\\', "/").trim_start_matches('/').to_string()
}
