//! Converting a single archive.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::codec::{ArchiveEntry, RarCodec, SourceArchive};
use crate::discovery::destination_for;
use crate::error::ConvertError;
use crate::io::FileSystem;
use crate::sniff::{self, Format};
use crate::zip::{ZipError, ZipExtractor, ZipPacker};

/// A source archive and the path its conversion is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let destination = destination_for(&source);
        Self {
            source,
            destination,
        }
    }

    /// Where the archive is written before it is moved into place.
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self
            .destination
            .file_name()
            .map(OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".partial");
        self.destination.with_file_name(name)
    }
}

/// What a successful conversion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The source already held a ZIP and was only renamed.
    Renamed,
    /// The source was repacked; `entries` files were written.
    Transcoded { entries: usize },
}

/// Remembers whether the wrapped reader failed, so read errors can be told
/// apart from write errors once both surface through the packer.
struct TrackedReader<'r> {
    inner: &'r mut dyn Read,
    failed: bool,
}

impl Read for TrackedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|e| {
            if e.kind() != io::ErrorKind::Interrupted {
                self.failed = true;
            }
        })
    }
}

/// Converts source archives into target archives on one filesystem.
pub struct Converter<'a> {
    fs: &'a dyn FileSystem,
    codec: &'a dyn RarCodec,
}

impl<'a> Converter<'a> {
    pub fn new(fs: &'a dyn FileSystem, codec: &'a dyn RarCodec) -> Self {
        Self { fs, codec }
    }

    /// Convert one archive.
    ///
    /// Depending on what the source actually contains, it is renamed (ZIP),
    /// repacked (RAR) or rejected. The source is only removed once the
    /// destination is complete and verified; on any earlier failure the
    /// source is untouched and no destination is left behind.
    pub fn convert(&self, job: &ConversionJob) -> Result<Outcome, ConvertError> {
        let source = &job.source;

        let stat = self.fs.stat(source).map_err(|e| ConvertError::Open {
            path: source.clone(),
            source: e,
        })?;
        if stat.is_dir {
            return Err(ConvertError::IsDirectory {
                path: source.clone(),
            });
        }

        let format = {
            let mut file = self.fs.open(source).map_err(|e| ConvertError::Open {
                path: source.clone(),
                source: e,
            })?;
            sniff::identify(source, &mut file).map_err(|e| ConvertError::Identify {
                path: source.clone(),
                source: e,
            })?
        };

        match format {
            Format::Zip => {
                self.ensure_vacant(&job.destination)?;
                self.fs
                    .rename(source, &job.destination)
                    .map_err(|e| ConvertError::Finalize {
                        path: job.destination.clone(),
                        source: e,
                    })?;
                debug!(source = %source.display(), "renamed mislabeled zip");
                Ok(Outcome::Renamed)
            }
            Format::Rar => {
                self.ensure_vacant(&job.destination)?;
                let entries = self.transcode(job)?;
                Ok(Outcome::Transcoded { entries })
            }
            other => Err(ConvertError::NotAnArchive {
                path: source.clone(),
                format: other,
            }),
        }
    }

    fn ensure_vacant(&self, destination: &Path) -> Result<(), ConvertError> {
        match self.fs.exists(destination) {
            Ok(false) => Ok(()),
            Ok(true) => Err(ConvertError::DestinationExists {
                path: destination.to_path_buf(),
            }),
            Err(e) => Err(ConvertError::CreateDestination {
                path: destination.to_path_buf(),
                source: e,
            }),
        }
    }

    fn transcode(&self, job: &ConversionJob) -> Result<usize, ConvertError> {
        let mut archive =
            self.codec
                .open(self.fs, &job.source)
                .map_err(|e| ConvertError::Open {
                    path: job.source.clone(),
                    source: e,
                })?;

        let entries = archive.entries().map_err(|e| ConvertError::Enumerate {
            path: job.source.clone(),
            source: e,
        })?;
        debug!(source = %job.source.display(), entries = entries.len(), "listed rar entries");

        let partial = job.partial_path();
        let written = self
            .write_partial(job, archive.as_mut(), &partial)
            .and_then(|()| self.verify(&partial, &entries))
            .and_then(|()| {
                self.fs
                    .rename(&partial, &job.destination)
                    .map_err(|e| ConvertError::Finalize {
                        path: job.destination.clone(),
                        source: e,
                    })
            });
        if let Err(e) = written {
            self.discard(&partial);
            return Err(e);
        }

        self.fs
            .remove(&job.source)
            .map_err(|e| ConvertError::RemoveSource {
                path: job.source.clone(),
                source: e,
            })?;

        Ok(entries.len())
    }

    /// Stream every entry of `archive` into a new ZIP at `partial`.
    fn write_partial(
        &self,
        job: &ConversionJob,
        archive: &mut dyn SourceArchive,
        partial: &Path,
    ) -> Result<(), ConvertError> {
        let out = self
            .fs
            .create(partial)
            .map_err(|e| ConvertError::CreateDestination {
                path: partial.to_path_buf(),
                source: e,
            })?;
        let mut packer = ZipPacker::new(out);

        let mut write_failed = false;
        let streamed = archive.stream(&mut |entry, reader| {
            let mut reader = TrackedReader {
                inner: reader,
                failed: false,
            };
            let added = packer.add(&entry.name, entry.dos_datetime, &mut reader);
            if added.is_err() && !reader.failed {
                write_failed = true;
            }
            added
        });

        if let Err(e) = streamed {
            return Err(if write_failed {
                ConvertError::Write {
                    path: partial.to_path_buf(),
                    source: e,
                }
            } else {
                ConvertError::Extract {
                    path: job.source.clone(),
                    source: e,
                }
            });
        }

        packer.finish().map_err(|e| ConvertError::Write {
            path: partial.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Read `partial` back and check it holds exactly `expected`.
    ///
    /// Every entry is decoded, so a bad size or CRC fails here rather than
    /// after the source is gone.
    fn verify(&self, partial: &Path, expected: &[ArchiveEntry]) -> Result<(), ConvertError> {
        let check = || -> Result<(), ZipError> {
            let mut zip = ZipExtractor::new(self.fs.open(partial)?)?;
            let written = zip.list_files()?;

            if written.len() != expected.len() {
                return Err(ZipError::Format(format!(
                    "expected {} entries, found {}",
                    expected.len(),
                    written.len()
                )));
            }
            for (want, got) in expected.iter().zip(&written) {
                if want.name != got.file_name || want.size != got.uncompressed_size {
                    return Err(ZipError::Format(format!(
                        "entry {} ({} bytes) written as {} ({} bytes)",
                        want.name, want.size, got.file_name, got.uncompressed_size
                    )));
                }
                zip.extract_to_memory(got)?;
            }
            Ok(())
        };

        check().map_err(|e| ConvertError::Verify {
            path: partial.to_path_buf(),
            source: e,
        })
    }

    fn discard(&self, partial: &Path) {
        match self.fs.remove(partial) {
            Ok(()) => debug!(path = %partial.display(), "removed partial archive"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %partial.display(), error = %e, "unable to remove partial archive"),
        }
    }
}
