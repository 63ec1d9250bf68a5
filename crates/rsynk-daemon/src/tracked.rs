//! Which files may be sent, and which part of them

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rsynk_core::FileBoundaries;

/// A file the server agreed to send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: PathBuf,
    /// Slice to send; `None` sends the whole file
    pub boundaries: Option<FileBoundaries>,
}

impl TrackedFile {
    pub fn whole(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            boundaries: None,
        }
    }
}

/// Maps requested paths to tracked files
pub trait TrackedFilesProvider: Send + Sync {
    /// Returns `None` when the path must not be sent.
    fn tracked(&self, path: &Path) -> Option<TrackedFile>;
}

/// Tracks every path, always as a whole file
#[derive(Debug, Default, Clone, Copy)]
pub struct AllFilesTracked;

impl TrackedFilesProvider for AllFilesTracked {
    fn tracked(&self, path: &Path) -> Option<TrackedFile> {
        Some(TrackedFile::whole(path))
    }
}

/// Tracks a fixed set of files, each limited to a byte range.
///
/// Useful for files that grow while being served, such as logs, where only
/// the part known to be complete should be sent.
#[derive(Debug, Default, Clone)]
pub struct BoundedFiles {
    files: HashMap<PathBuf, FileBoundaries>,
}

impl BoundedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, boundaries: FileBoundaries) {
        self.files.insert(path.into(), boundaries);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl TrackedFilesProvider for BoundedFiles {
    fn tracked(&self, path: &Path) -> Option<TrackedFile> {
        self.files.get(path).map(|boundaries| TrackedFile {
            path: path.to_path_buf(),
            boundaries: Some(*boundaries),
        })
    }
}
