use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::sniff::Format;
use crate::zip::ZipError;

/// Errors that abort a run before anything is converted.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("path not found: {}", path.display())]
    PathNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error walking {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to stat {}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No files to convert!")]
    NoCandidates,
}

/// Errors for a single conversion. The batch records these and moves on.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("is a directory")]
    IsDirectory { path: PathBuf },

    #[error("trying to open cbr: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to identify: {source}")]
    Identify {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a rar file (detected {format})")]
    NotAnArchive { path: PathBuf, format: Format },

    #[error("destination {} already exists", path.display())]
    DestinationExists { path: PathBuf },

    #[error("destination {} is also the target of {}", path.display(), other.display())]
    DestinationConflict { path: PathBuf, other: PathBuf },

    #[error("walking rar file: {source}")]
    Enumerate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to create zip {}: {source}", path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to extract rar: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to archive zip: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("written zip failed verification: {source}")]
    Verify {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("unable to move zip into place at {}: {source}", path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("converted, but deleting old cbr failed (both files kept): {source}")]
    RemoveSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    /// Returns true if a complete destination archive exists despite the
    /// error, i.e. only cleanup of the source failed.
    pub fn left_destination(&self) -> bool {
        matches!(self, ConvertError::RemoveSource { .. })
    }
}
