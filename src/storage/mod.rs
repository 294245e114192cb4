//! Where dataset files, the manifest and the plot script end up.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File sink addressed by paths relative to the store's root.
pub trait Storage {
    fn write(&mut self, path: &Path, content: &str) -> Result<()>;

    fn read(&self, path: &Path) -> Result<String>;

    /// Removing a missing file is not an error.
    fn remove(&mut self, path: &Path) -> Result<()>;
}

/// Files under a directory on disk.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Creates `root` if needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Storage for FsStorage {
    fn write(&mut self, path: &Path, content: &str) -> Result<()> {
        fs::write(self.root.join(path), content)?;
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(path))?)
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        match fs::remove_file(self.root.join(path)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory store, used to assert on exact serialized bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStorage {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }

    pub fn files(&self) -> &BTreeMap<PathBuf, String> {
        &self.files
    }
}

impl Storage for MemoryStorage {
    fn write(&mut self, path: &Path, content: &str) -> Result<()> {
        self.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(ErrorKind::NotFound, path.display().to_string()).into()
        })
    }

    fn remove(&mut self, path: &Path) -> Result<()> {
        self.files.remove(path);
        Ok(())
    }
}
