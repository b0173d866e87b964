// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(BTreeSet<String>),
}

/// In-memory filesystem for tests. Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    fail_appends: Arc<Mutex<bool>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        files.insert(PathBuf::from("."), MockEntry::Dir(BTreeSet::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            fail_appends: Arc::new(Mutex::new(false)),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.lock();
        files.insert(path.clone(), MockEntry::File(content.into()));
        link_into_parent(&mut files, &path);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.lock();
        if !files.contains_key(&path) {
            files.insert(path.clone(), MockEntry::Dir(BTreeSet::new()));
        }
        link_into_parent(&mut files, &path);
    }

    /// Make every subsequent `append_line` fail.
    pub fn fail_appends(&self, fail: bool) {
        *self.fail_appends.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parent_of(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        Some(Path::new("."))
    } else {
        Some(parent)
    }
}

/// Register `path` as a child of its parent, creating parents as needed.
fn link_into_parent(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let Some(parent) = parent_of(path) else {
        return;
    };
    if parent == path {
        return;
    }
    if !files.contains_key(parent) {
        files.insert(parent.to_path_buf(), MockEntry::Dir(BTreeSet::new()));
        link_into_parent(files, parent);
    }
    if let (Some(MockEntry::Dir(children)), Some(name)) = (
        files.get_mut(parent),
        path.file_name().and_then(|n| n.to_str()),
    ) {
        children.insert(name.to_string());
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let files = self.lock();
        match files.get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        if *self.fail_appends.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(anyhow!("append rejected: {:?}", path));
        }
        let mut files = self.lock();
        match files.get_mut(path) {
            Some(MockEntry::File(content)) => {
                content.extend_from_slice(line.as_bytes());
                content.push(b'\n');
            }
            Some(MockEntry::Dir(_)) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => {
                let mut content = line.as_bytes().to_vec();
                content.push(b'\n');
                files.insert(path.to_path_buf(), MockEntry::File(content));
                link_into_parent(&mut files, path);
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::File(_)))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
