//! End-to-end batches against a real directory tree.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use cbr2cbz::zip::{DOS_EPOCH, ZipExtractor, ZipPacker};
use cbr2cbz::{
    ArchiveEntry, Batch, CancelFlag, FileSystem, LocalFs, RarCodec, Reporter, SetupError,
    SourceArchive,
};

const RAR_MARKER: &[u8] = b"Rar!\x1a\x07\x01\x00";

/// Reads `name=content` lines stored after a RAR 5 marker.
struct LineCodec;

struct LineArchive(Vec<(ArchiveEntry, Vec<u8>)>);

impl RarCodec for LineCodec {
    fn open<'a>(
        &self,
        fs: &'a dyn FileSystem,
        path: &Path,
    ) -> io::Result<Box<dyn SourceArchive + 'a>> {
        let mut data = Vec::new();
        fs.open(path)?.read_to_end(&mut data)?;
        let body = data
            .strip_prefix(RAR_MARKER)
            .ok_or_else(|| io::Error::other("missing marker"))?;

        let entries = String::from_utf8_lossy(body)
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(name, content)| {
                let entry = ArchiveEntry {
                    name: name.to_string(),
                    size: content.len() as u64,
                    dos_datetime: DOS_EPOCH,
                };
                (entry, content.as_bytes().to_vec())
            })
            .collect();
        Ok(Box::new(LineArchive(entries)))
    }
}

impl SourceArchive for LineArchive {
    fn entries(&mut self) -> io::Result<Vec<ArchiveEntry>> {
        Ok(self.0.iter().map(|(entry, _)| entry.clone()).collect())
    }

    fn stream(
        &mut self,
        visit: &mut dyn FnMut(&ArchiveEntry, &mut dyn Read) -> io::Result<()>,
    ) -> io::Result<()> {
        for (entry, content) in &self.0 {
            visit(entry, &mut content.as_slice())?;
        }
        Ok(())
    }
}

fn rar(lines: &[&str]) -> Vec<u8> {
    let mut data = RAR_MARKER.to_vec();
    data.extend_from_slice(lines.join("\n").as_bytes());
    data
}

fn zip(name: &str, content: &[u8]) -> Vec<u8> {
    let mut packer = ZipPacker::new(Vec::new());
    packer.add(name, DOS_EPOCH, &mut &content[..]).unwrap();
    packer.finish().unwrap()
}

fn tree(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

fn run(roots: &[PathBuf]) -> (Result<cbr2cbz::BatchOutcome, SetupError>, String) {
    let fs = LocalFs::new();
    let mut reporter = Reporter::new(Vec::new());
    let result = Batch::new(&fs, &LineCodec, CancelFlag::new()).run(roots, &mut reporter);
    (result, String::from_utf8(reporter.finish().unwrap()).unwrap())
}

#[test]
fn converts_a_mixed_library() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib");
    fs::create_dir_all(lib.join("series")).unwrap();

    let mislabeled = zip("001.jpg", b"zip page");
    fs::write(lib.join("is-zip.cbr"), &mislabeled).unwrap();
    fs::write(
        lib.join("series/real.cbr"),
        rar(&["001.jpg=first", "002.jpg=second"]),
    )
    .unwrap();
    fs::write(lib.join("notes.cbr"), b"not an archive").unwrap();
    fs::write(lib.join("cover.jpg"), b"jpeg").unwrap();

    let (result, log) = run(&[lib.clone()]);
    let outcome = result.unwrap();

    assert_eq!(outcome.renamed, 1);
    assert_eq!(outcome.transcoded, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures.contains_key(&lib.join("notes.cbr")));
    assert!(log.contains("Other files: 1 (4 bytes)"));

    assert_eq!(
        tree(&lib),
        vec![
            PathBuf::from("cover.jpg"),
            PathBuf::from("is-zip.cbz"),
            PathBuf::from("notes.cbr"),
            PathBuf::from("series/real.cbz"),
        ]
    );
    assert_eq!(fs::read(lib.join("is-zip.cbz")).unwrap(), mislabeled);
    assert_eq!(fs::read(lib.join("notes.cbr")).unwrap(), b"not an archive");

    let mut zip = ZipExtractor::new(File::open(lib.join("series/real.cbz")).unwrap()).unwrap();
    let entries = zip.list_files().unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(names, ["001.jpg", "002.jpg"]);
    assert_eq!(zip.extract_to_memory(&entries[1]).unwrap(), b"second");
}

#[test]
fn empty_batch_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("done.cbz"), b"PK\x05\x06").unwrap();
    fs::write(dir.path().join("readme.txt"), b"hi").unwrap();

    let (result, log) = run(&[dir.path().to_path_buf()]);

    assert!(matches!(result, Err(SetupError::NoCandidates)));
    assert!(log.is_empty());
    assert_eq!(
        tree(dir.path()),
        vec![PathBuf::from("done.cbz"), PathBuf::from("readme.txt")]
    );
}

#[test]
fn existing_cbz_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("issue.cbr"), rar(&["001.jpg=new"])).unwrap();
    fs::write(dir.path().join("issue.cbz"), b"keep me").unwrap();

    let (result, log) = run(&[dir.path().join("issue.cbr")]);
    let outcome = result.unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert!(log.contains("already exists"));
    assert_eq!(fs::read(dir.path().join("issue.cbz")).unwrap(), b"keep me");
    assert!(dir.path().join("issue.cbr").exists());
    assert!(!dir.path().join("issue.cbz.partial").exists());
}

#[test]
fn missing_path_aborts_before_converting() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.cbr"), rar(&["001.jpg=x"])).unwrap();

    let (result, _) = run(&[dir.path().to_path_buf(), dir.path().join("missing")]);

    assert!(matches!(result, Err(SetupError::PathNotFound { .. })));
    assert_eq!(tree(dir.path()), vec![PathBuf::from("a.cbr")]);
}
