use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::file::{EntryKind, FileError, FileStore};

/// An in-memory `FileStore` that records every write.
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, String>>,
    writes: Mutex<Vec<PathBuf>>,
    reject_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            reject_writes: false,
        }
    }

    /// Make every `write_whole` fail after recording the attempt.
    pub fn rejecting_writes(mut self) -> Self {
        self.reject_writes = true;
        self
    }

    /// Seed a file without counting it as a write.
    pub fn with_file(self, path: impl Into<PathBuf>, content: &str) -> Self {
        self.files.lock().unwrap().insert(path.into(), content.to_string());
        self
    }

    /// Current content of a file, if present.
    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// Number of `write_whole` calls made so far.
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore for MemoryStore {
    fn read_whole(&self, path: &Path) -> Result<String, FileError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| FileError::NotFound(path.display().to_string()))
    }

    fn assert_exists(&self, path: &Path, kind: EntryKind) -> Result<(), FileError> {
        let files = self.files.lock().unwrap();
        let found = match kind {
            EntryKind::File => files.contains_key(path),
            EntryKind::Directory => files.keys().any(|f| f.starts_with(path) && f != path),
        };
        if found {
            Ok(())
        } else {
            Err(FileError::NotFound(path.display().to_string()))
        }
    }

    fn write_whole(&self, path: &Path, content: &str) -> Result<(), FileError> {
        self.writes.lock().unwrap().push(path.to_path_buf());
        if self.reject_writes {
            return Err(FileError::IoError("disk full".to_string()));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }
}

/// Build `count` lines of the form `Line N` joined with newlines.
pub fn numbered_lines(count: usize) -> String {
    (1..=count)
        .map(|n| format!("Line {}", n))
        .collect::<Vec<_>>()
        .join("\n")
}
