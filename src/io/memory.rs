use super::{FileStat, FileSystem, ReadSeek, normalize};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// Operations that can be made to fail on a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Open,
    Create,
    Write,
    Rename,
    Remove,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    faults: HashSet<(Fault, PathBuf)>,
}

/// In-memory filesystem.
///
/// Absolute and relative paths share one tree: `/a/b` and `a/b` are the same
/// file. Clones share the same tree.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    state: Arc<Mutex<State>>,
}

fn key(path: &Path) -> PathBuf {
    normalize(path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_) | Component::ParentDir))
        .collect()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

fn injected(fault: Fault, path: &Path) -> io::Error {
    io::Error::other(format!("injected {:?} failure on {}", fault, path.display()))
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test thread panicked mid-write.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a file, creating its parent directories.
    pub fn insert(&self, path: impl AsRef<Path>, data: Vec<u8>) {
        let path = key(path.as_ref());
        let mut state = self.state();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.nodes.insert(ancestor.to_path_buf(), Node::Dir);
        }
        state.nodes.insert(path, Node::File(data));
    }

    /// Create a directory and its parents.
    pub fn mkdir(&self, path: impl AsRef<Path>) {
        let path = key(path.as_ref());
        let mut state = self.state();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            state.nodes.insert(ancestor.to_path_buf(), Node::Dir);
        }
    }

    /// Contents of a file, if it exists.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.state().nodes.get(&key(path.as_ref())) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Every file path in the tree, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.state()
            .nodes
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Make `fault` fail for `path` from now on.
    pub fn inject(&self, fault: Fault, path: impl AsRef<Path>) {
        self.state().faults.insert((fault, key(path.as_ref())));
    }

    fn check(&self, fault: Fault, path: &Path) -> io::Result<()> {
        if self.state().faults.contains(&(fault, key(path))) {
            return Err(injected(fault, path));
        }
        Ok(())
    }

    fn parent_exists(state: &State, path: &Path) -> bool {
        match path.parent() {
            None => true,
            Some(parent) if parent.as_os_str().is_empty() => true,
            Some(parent) => matches!(state.nodes.get(parent), Some(Node::Dir)),
        }
    }
}

/// Buffered writer that publishes its contents on flush and on drop.
struct MemoryWriter<'a> {
    fs: &'a MemoryFs,
    path: PathBuf,
    buf: Vec<u8>,
    fail_writes: bool,
}

impl MemoryWriter<'_> {
    fn publish(&self) {
        let mut state = self.fs.state();
        state
            .nodes
            .insert(self.path.clone(), Node::File(self.buf.clone()));
    }
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(injected(Fault::Write, &self.path));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryWriter<'_> {
    fn drop(&mut self) {
        self.publish();
    }
}

impl FileSystem for MemoryFs {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let k = key(path);
        if k.as_os_str().is_empty() {
            return Ok(FileStat {
                size: 0,
                is_dir: true,
            });
        }
        match self.state().nodes.get(&k) {
            Some(Node::Dir) => Ok(FileStat {
                size: 0,
                is_dir: true,
            }),
            Some(Node::File(data)) => Ok(FileStat {
                size: data.len() as u64,
                is_dir: false,
            }),
            None => Err(not_found(path)),
        }
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek + '_>> {
        self.check(Fault::Open, path)?;
        match self.state().nodes.get(&key(path)) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir) => Err(io::Error::other(format!(
                "{}: is a directory",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + '_>> {
        self.check(Fault::Create, path)?;
        let k = key(path);
        {
            let mut state = self.state();
            if !Self::parent_exists(&state, &k) {
                return Err(not_found(path));
            }
            if let Some(Node::Dir) = state.nodes.get(&k) {
                return Err(io::Error::other(format!(
                    "{}: is a directory",
                    path.display()
                )));
            }
            state.nodes.insert(k.clone(), Node::File(Vec::new()));
        }

        let fail_writes = self.check(Fault::Write, path).is_err();
        Ok(Box::new(MemoryWriter {
            fs: self,
            path: k,
            buf: Vec::new(),
            fail_writes,
        }))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(Fault::Rename, from)?;
        let (from_key, to_key) = (key(from), key(to));
        let mut state = self.state();
        if !Self::parent_exists(&state, &to_key) {
            return Err(not_found(to));
        }
        match state.nodes.remove(&from_key) {
            Some(node @ Node::File(_)) => {
                state.nodes.insert(to_key, node);
                Ok(())
            }
            Some(Node::Dir) => {
                state.nodes.insert(from_key, Node::Dir);
                Err(io::Error::other("renaming directories is not supported"))
            }
            None => Err(not_found(from)),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.check(Fault::Remove, path)?;
        let k = key(path);
        let mut state = self.state();
        match state.nodes.get(&k) {
            Some(Node::File(_)) => {
                state.nodes.remove(&k);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::other(format!(
                "{}: is a directory",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&Path, FileStat) -> io::Result<()>,
    ) -> io::Result<()> {
        let root_key = key(root);
        if !self.stat(root)?.is_dir {
            return Err(io::Error::other(format!(
                "{}: not a directory",
                root.display()
            )));
        }

        // Snapshot so the visitor may call back into the filesystem.
        let files: Vec<(PathBuf, u64)> = self
            .state()
            .nodes
            .iter()
            .filter(|(path, _)| path.starts_with(&root_key))
            .filter_map(|(path, node)| match node {
                Node::File(data) => Some((path.clone(), data.len() as u64)),
                Node::Dir => None,
            })
            .collect();

        for (path, size) in files {
            // Report paths under the root exactly as the caller spelled it.
            let rel = path.strip_prefix(&root_key).unwrap_or(&path);
            let shown = root.join(rel);
            visit(
                &shown,
                FileStat {
                    size,
                    is_dir: false,
                },
            )?;
        }
        Ok(())
    }
}
