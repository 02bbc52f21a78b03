use super::{FileStat, FileSystem, ReadSeek};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The operating system's filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

/// Buffered file writer whose flush also reaches the disk.
struct DurableFile {
    inner: BufWriter<fs::File>,
}

impl Write for DurableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.inner.get_ref().sync_all()
    }
}

/// Persist the directory entry for `path` after it was renamed into place.
#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl FileSystem for LocalFs {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = fs::metadata(path)?;
        Ok(FileStat {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek + '_>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(DurableFile {
            inner: BufWriter::new(fs::File::create(path)?),
        }))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)?;
        sync_parent(to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path, FileStat) -> io::Result<()>,
    ) -> io::Result<()> {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let meta = entry.metadata().map_err(io::Error::from)?;
            visit(
                entry.path(),
                FileStat {
                    size: meta.len(),
                    is_dir: false,
                },
            )?;
        }
        Ok(())
    }

    fn local_path(&self, path: &Path) -> Option<PathBuf> {
        Some(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_visits_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/2.cbr"), b"22").unwrap();
        fs::write(dir.path().join("a.cbr"), b"1").unwrap();
        fs::write(dir.path().join("c.cbz"), b"333").unwrap();

        let mut seen = Vec::new();
        LocalFs
            .walk(dir.path(), &mut |path, stat| {
                let rel = path.strip_prefix(dir.path()).unwrap().to_path_buf();
                seen.push((rel, stat.size));
                Ok(())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                (PathBuf::from("a.cbr"), 1),
                (PathBuf::from("b/2.cbr"), 2),
                (PathBuf::from("c.cbz"), 3),
            ]
        );
    }

    #[test]
    fn create_then_rename_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let fs_ = LocalFs::new();
        let from = dir.path().join("x.partial");
        let to = dir.path().join("x.cbz");

        {
            let mut w = fs_.create(&from).unwrap();
            w.write_all(b"hello").unwrap();
            w.flush().unwrap();
        }
        fs_.rename(&from, &to).unwrap();
        assert!(!fs_.exists(&from).unwrap());
        assert_eq!(fs_.stat(&to).unwrap().size, 5);

        fs_.remove(&to).unwrap();
        assert!(!fs_.exists(&to).unwrap());
    }

    #[test]
    fn flush_writes_through_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.cbz.partial");

        let local = LocalFs::new();
        let mut w = local.create(&path).unwrap();
        w.write_all(b"pending").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"");
        w.flush().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"pending");
    }

    #[cfg(unix)]
    #[test]
    fn bare_file_names_sync_the_working_directory() {
        sync_parent(Path::new("x.cbz")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        sync_parent(&dir.path().join("x.cbz")).unwrap();
    }
}
