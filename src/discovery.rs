//! Finding the files a run should consider.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::SetupError;
use crate::io::{FileSystem, normalize};

/// Extension of archives to convert, matched case-insensitively.
pub const SOURCE_EXTENSION: &str = "cbr";
/// Extension given to converted archives.
pub const TARGET_EXTENSION: &str = "cbz";

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Returns true if `path` is named like a source archive.
pub fn is_candidate(path: &Path) -> bool {
    has_extension(path, SOURCE_EXTENSION)
}

/// Where the converted archive for `source` goes: same directory, same stem.
pub fn destination_for(source: &Path) -> PathBuf {
    source.with_extension(TARGET_EXTENSION)
}

/// Expand `roots` into every regular file they contain.
///
/// File roots are included as-is; directory roots are walked recursively.
/// The result keeps first-seen order and holds each normalized path once.
///
/// # Errors
///
/// Fails with [`SetupError::PathNotFound`] if any root cannot be stat'ed and
/// with [`SetupError::Walk`] if a directory walk fails. No partial list is
/// returned in either case.
pub fn discover(fs: &dyn FileSystem, roots: &[PathBuf]) -> Result<Vec<PathBuf>, SetupError> {
    let mut stats = Vec::with_capacity(roots.len());
    for root in roots {
        let stat = fs.stat(root).map_err(|source| SetupError::PathNotFound {
            path: root.clone(),
            source,
        })?;
        stats.push(stat);
    }

    let mut seen = HashSet::new();
    let mut files = Vec::new();
    let mut push = |path: &Path| {
        let path = normalize(path);
        if seen.insert(path.clone()) {
            files.push(path);
        }
    };

    for (root, stat) in roots.iter().zip(stats) {
        if !stat.is_dir {
            push(root.as_path());
            continue;
        }

        fs.walk(root, &mut |path, _| {
            push(path);
            Ok(())
        })
        .map_err(|source| SetupError::Walk {
            path: root.clone(),
            source,
        })?;
    }

    Ok(files)
}

/// Count and total size of a group of files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub bytes: u64,
}

impl Tally {
    fn add(&mut self, bytes: u64) {
        self.count += 1;
        self.bytes += bytes;
    }
}

/// Aggregate figures for the report header. Computed once per run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Every discovered file.
    pub total: Tally,
    /// Files named like source archives.
    pub candidates: Tally,
    /// Files already named like target archives.
    pub converted: Tally,
}

impl RunStats {
    /// Files that are neither source nor target archives.
    pub fn others(&self) -> Tally {
        Tally {
            count: self.total.count - self.candidates.count - self.converted.count,
            bytes: self.total.bytes - self.candidates.bytes - self.converted.bytes,
        }
    }
}

/// Discovered files split for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Source archives to convert, in discovery order.
    pub candidates: Vec<PathBuf>,
    pub stats: RunStats,
}

/// Split `items` into conversion candidates and compute [`RunStats`].
///
/// Every item is stat'ed again for its size.
///
/// # Errors
///
/// [`SetupError::NoCandidates`] if nothing is named like a source archive,
/// [`SetupError::Stat`] if an item vanished since discovery.
pub fn classify(fs: &dyn FileSystem, items: &[PathBuf]) -> Result<Classified, SetupError> {
    let mut stats = RunStats::default();
    let mut candidates = Vec::new();

    for item in items {
        let size = fs
            .stat(item)
            .map_err(|source| SetupError::Stat {
                path: item.clone(),
                source,
            })?
            .size;

        stats.total.add(size);
        if is_candidate(item) {
            stats.candidates.add(size);
            candidates.push(item.clone());
        } else if has_extension(item, TARGET_EXTENSION) {
            stats.converted.add(size);
        }
    }

    if candidates.is_empty() {
        return Err(SetupError::NoCandidates);
    }

    Ok(Classified { candidates, stats })
}
