use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use unrar::Archive;

use super::{ArchiveEntry, RarCodec, SourceArchive, entry_name};
use crate::io::FileSystem;

/// RAR support backed by the `unrar` library.
///
/// The library only reads from real paths, so files that do not live on the
/// local disk are first spooled into a temporary file.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnrarCodec;

impl RarCodec for UnrarCodec {
    fn open<'a>(
        &self,
        fs: &'a dyn FileSystem,
        path: &Path,
    ) -> io::Result<Box<dyn SourceArchive + 'a>> {
        let (local, spool) = match fs.local_path(path) {
            Some(local) => (local, None),
            None => {
                let mut spool = tempfile::Builder::new()
                    .prefix("cbr2cbz-")
                    .suffix(".rar")
                    .tempfile()?;
                let copied = io::copy(&mut fs.open(path)?, &mut spool)?;
                spool.flush()?;
                debug!(path = %path.display(), bytes = copied, "spooled archive to disk");
                (spool.path().to_path_buf(), Some(spool))
            }
        };

        // Fail here rather than mid-conversion if the container is unreadable.
        Archive::new(&local)
            .open_for_listing()
            .map_err(io::Error::other)?;

        Ok(Box::new(UnrarArchive {
            path: local,
            _spool: spool,
        }))
    }
}

struct UnrarArchive {
    path: PathBuf,
    /// Keeps a spooled copy alive for as long as the archive is open.
    _spool: Option<NamedTempFile>,
}

impl SourceArchive for UnrarArchive {
    fn entries(&mut self) -> io::Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        let mut archive = Archive::new(&self.path)
            .open_for_listing()
            .map_err(io::Error::other)?;

        while let Some(header) = archive.read_header().map_err(io::Error::other)? {
            let entry = header.entry();
            if entry.is_file() {
                entries.push(ArchiveEntry {
                    name: entry_name(&entry.filename.to_string_lossy()),
                    size: entry.unpacked_size,
                    dos_datetime: entry.file_time,
                });
            }
            archive = header.skip().map_err(io::Error::other)?;
        }

        Ok(entries)
    }

    fn stream(
        &mut self,
        visit: &mut dyn FnMut(&ArchiveEntry, &mut dyn io::Read) -> io::Result<()>,
    ) -> io::Result<()> {
        let mut archive = Archive::new(&self.path)
            .open_for_processing()
            .map_err(io::Error::other)?;

        while let Some(header) = archive.read_header().map_err(io::Error::other)? {
            let entry = header.entry();
            if !entry.is_file() {
                archive = header.skip().map_err(io::Error::other)?;
                continue;
            }

            let meta = ArchiveEntry {
                name: entry_name(&entry.filename.to_string_lossy()),
                size: entry.unpacked_size,
                dos_datetime: entry.file_time,
            };
            // unrar hands back each entry fully decoded.
            let (data, rest) = header.read().map_err(io::Error::other)?;
            visit(&meta, &mut data.as_slice())?;
            archive = rest;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::{RAR_TIME, stored_rar4};
    use crate::convert::{ConversionJob, Converter, Outcome};
    use crate::io::{LocalFs, MemoryFs};
    use crate::zip::{ZipExtractor, split_dos_datetime};
    use std::fs;
    use std::io::Read;

    fn comic() -> Vec<u8> {
        stored_rar4(&[
            ("pages/", &b""[..]),
            ("pages/001.jpg", &b"one"[..]),
            ("ComicInfo.xml", &b"<x/>"[..]),
        ])
    }

    fn contents(archive: &mut dyn SourceArchive) -> Vec<(String, Vec<u8>)> {
        let mut seen = Vec::new();
        archive
            .stream(&mut |entry, data| {
                let mut buf = Vec::new();
                data.read_to_end(&mut buf)?;
                seen.push((entry.name.clone(), buf));
                Ok(())
            })
            .unwrap();
        seen
    }

    #[test]
    fn lists_files_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comic.cbr");
        fs::write(&path, comic()).unwrap();

        let local = LocalFs::new();
        let mut archive = UnrarCodec.open(&local, &path).unwrap();
        let entries = archive.entries().unwrap();

        assert_eq!(
            entries,
            [
                ArchiveEntry {
                    name: "pages/001.jpg".into(),
                    size: 3,
                    dos_datetime: RAR_TIME,
                },
                ArchiveEntry {
                    name: "ComicInfo.xml".into(),
                    size: 4,
                    dos_datetime: RAR_TIME,
                },
            ]
        );
    }

    #[test]
    fn streams_contents_in_archive_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comic.cbr");
        fs::write(&path, comic()).unwrap();

        let local = LocalFs::new();
        let mut archive = UnrarCodec.open(&local, &path).unwrap();

        assert_eq!(
            contents(archive.as_mut()),
            [
                ("pages/001.jpg".to_string(), b"one".to_vec()),
                ("ComicInfo.xml".to_string(), b"<x/>".to_vec()),
            ]
        );
    }

    #[test]
    fn spools_archives_without_a_local_path() {
        let fs = MemoryFs::new();
        fs.insert("lib/comic.cbr", comic());

        let mut archive = UnrarCodec.open(&fs, Path::new("lib/comic.cbr")).unwrap();
        assert_eq!(archive.entries().unwrap().len(), 2);
        assert_eq!(contents(archive.as_mut())[1].1, b"<x/>");
    }

    #[test]
    fn converts_on_local_disk() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("comic.cbr");
        fs::write(&source, comic()).unwrap();

        let local = LocalFs::new();
        let job = ConversionJob::new(&source);
        let outcome = Converter::new(&local, &UnrarCodec).convert(&job).unwrap();

        assert_eq!(outcome, Outcome::Transcoded { entries: 2 });
        assert!(!source.exists());
        assert!(!job.partial_path().exists());

        let file = fs::File::open(dir.path().join("comic.cbz")).unwrap();
        let mut zip = ZipExtractor::new(file).unwrap();
        let entries = zip.list_files().unwrap();
        let (time, date) = split_dos_datetime(RAR_TIME);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name, "pages/001.jpg");
        assert_eq!((entries[0].last_mod_date, entries[0].last_mod_time), (date, time));
        assert_eq!(zip.extract_to_memory(&entries[0]).unwrap(), b"one");
        assert_eq!(entries[1].file_name, "ComicInfo.xml");
        assert_eq!(zip.extract_to_memory(&entries[1]).unwrap(), b"<x/>");
    }
}
