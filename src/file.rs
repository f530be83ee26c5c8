use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::buffer::LineBuffer;

/// Default cap on how large a file may be before reads are refused
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Content of a file read into memory
#[derive(Debug, Clone)]
pub struct FileContent {
    /// Absolute path to the file
    pub path: String,
    /// File content as valid UTF-8 string
    pub content: String,
    /// Byte length of the content
    pub len: usize,
    /// BLAKE3 hash of the content (hex-encoded)
    pub checksum: String,
}

impl FileContent {
    /// Wrap already-read text, computing its length and checksum
    pub fn new(path: impl Into<String>, content: String) -> Self {
        let len = content.len();
        let checksum = checksum(&content);
        Self {
            path: path.into(),
            content,
            len,
            checksum,
        }
    }

    /// Split the content into a line buffer
    pub fn lines(&self) -> LineBuffer {
        LineBuffer::from_text(&self.content)
    }
}

/// What kind of filesystem entry a path is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// Error types for file operations
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error(
        "Relative paths are not supported. Please use an absolute path starting with '/'. Got: '{0}'"
    )]
    RelativePath(String),

    #[error("Expected a {expected} at '{path}'")]
    WrongKind { path: String, expected: EntryKind },

    #[error("File '{path}' is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Invalid UTF-8 in file: {0}")]
    InvalidUtf8(String),
}

impl From<io::Error> for FileError {
    fn from(err: io::Error) -> Self {
        FileError::IoError(err.to_string())
    }
}

fn io_error(path: &Path, err: io::Error) -> FileError {
    match err.kind() {
        io::ErrorKind::NotFound => FileError::NotFound(path.display().to_string()),
        _ => FileError::from(err),
    }
}

/// Compute the hex-encoded BLAKE3 checksum of some text
pub fn checksum(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// Whole-file storage used by the editing operations
///
/// The editing code only ever reads a file in one piece and writes it back in
/// one piece; this trait is that contract.
pub trait FileStore {
    /// Read the entire file as UTF-8 text
    fn read_whole(&self, path: &Path) -> Result<String, FileError>;

    /// Replace the entire file with `content`
    fn write_whole(&self, path: &Path, content: &str) -> Result<(), FileError>;

    /// Check that `path` exists and is the expected kind of entry
    fn assert_exists(&self, path: &Path, kind: EntryKind) -> Result<(), FileError> {
        assert_exists(path, kind)
    }

    /// Read a file and wrap it as a checksummed snapshot
    fn snapshot(&self, path: &Path) -> Result<FileContent, FileError> {
        let content = self.read_whole(path)?;
        Ok(FileContent::new(path.display().to_string(), content))
    }
}

/// `FileStore` backed by the local filesystem
#[derive(Debug, Clone)]
pub struct DiskStore {
    max_file_bytes: u64,
}

impl DiskStore {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }
}

impl Default for DiskStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl FileStore for DiskStore {
    fn read_whole(&self, path: &Path) -> Result<String, FileError> {
        let size = fs::metadata(path).map_err(|e| io_error(path, e))?.len();
        if size > self.max_file_bytes {
            return Err(FileError::TooLarge {
                path: path.display().to_string(),
                size,
                limit: self.max_file_bytes,
            });
        }

        Ok(read_file(path)?.content)
    }

    /// Stage the content in a sibling temp file, then rename it over `path`.
    /// A failure at any step leaves the existing file as it was.
    fn write_whole(&self, path: &Path, content: &str) -> Result<(), FileError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(path).ok().map(|m| m.permissions());

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(content.as_bytes())?;
        staged.as_file().sync_all()?;
        if let Some(permissions) = permissions {
            fs::set_permissions(staged.path(), permissions)?;
        }

        staged.persist(path).map_err(|e| FileError::from(e.error))?;
        Ok(())
    }
}

/// Read a UTF-8 file into a checksummed `FileContent`, with no size limit
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<FileContent, FileError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    let content =
        String::from_utf8(bytes).map_err(|_| FileError::InvalidUtf8(path.display().to_string()))?;

    Ok(FileContent::new(path.display().to_string(), content))
}

/// Resolve a caller-supplied path into a cleaned absolute path
///
/// Only absolute paths are accepted. `.` components are dropped and `..`
/// components pop the previous normal component, without touching the
/// filesystem, so the result is the same whether or not the path exists.
pub fn resolve_absolute(path: &str) -> Result<PathBuf, FileError> {
    let requested = Path::new(path);
    if !requested.is_absolute() {
        return Err(FileError::RelativePath(path.to_string()));
    }

    let mut resolved = PathBuf::new();
    for component in requested.components() {
        match component {
            Component::ParentDir => {
                if resolved.parent().is_some() {
                    resolved.pop();
                }
            }
            Component::CurDir => {}
            other => resolved.push(other.as_os_str()),
        }
    }

    Ok(resolved)
}

/// Check that `path` exists and is the expected kind of entry
pub fn assert_exists(path: &Path, kind: EntryKind) -> Result<(), FileError> {
    let metadata = fs::metadata(path).map_err(|e| io_error(path, e))?;

    let matches = match kind {
        EntryKind::File => metadata.is_file(),
        EntryKind::Directory => metadata.is_dir(),
    };

    if matches {
        Ok(())
    } else {
        Err(FileError::WrongKind {
            path: path.display().to_string(),
            expected: kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_carries_checksum() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("notes.txt");
        fs::write(&file_path, "alpha\nbeta\n").unwrap();

        let snapshot = DiskStore::default().snapshot(&file_path).unwrap();

        assert_eq!(snapshot.len, 11);
        assert_eq!(snapshot.path, file_path.display().to_string());
        assert_eq!(snapshot.checksum, checksum("alpha\nbeta\n"));
        assert_eq!(snapshot.checksum.len(), 64);
        assert_eq!(snapshot.lines().lines(), ["alpha", "beta", ""]);
    }

    #[test]
    fn test_read_rejects_binary_content() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("blob.bin");
        fs::write(&file_path, [0xC3, 0x28, 0x00]).unwrap();

        assert!(matches!(
            DiskStore::default().read_whole(&file_path),
            Err(FileError::InvalidUtf8(p)) if p.ends_with("blob.bin")
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.txt");

        assert!(matches!(DiskStore::default().read_whole(&missing), Err(FileError::NotFound(_))));
        assert!(matches!(read_file(&missing), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_disk_store_refuses_large_files() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("big.txt");
        fs::write(&file_path, "0123456789").unwrap();

        let store = DiskStore::new(4);
        match store.read_whole(&file_path) {
            Err(FileError::TooLarge { size, limit, .. }) => {
                assert_eq!(size, 10);
                assert_eq!(limit, 4);
            }
            other => panic!("Expected FileError::TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_disk_store_write_then_snapshot() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("out.txt");
        let store = DiskStore::default();

        store.write_whole(&file_path, "a\nb\n").unwrap();
        let snapshot = store.snapshot(&file_path).unwrap();

        assert_eq!(snapshot.content, "a\nb\n");
        assert_eq!(snapshot.checksum, checksum("a\nb\n"));
    }

    #[test]
    fn test_write_replaces_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("target.txt");
        fs::write(&file_path, "old\ncontent").unwrap();

        DiskStore::default().write_whole(&file_path, "new").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("script.sh");
        fs::write(&file_path, "echo hi").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o750)).unwrap();

        DiskStore::default().write_whole(&file_path, "echo bye").unwrap();

        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn test_failed_write_leaves_target_alone() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner.txt"), "keep").unwrap();

        let result = DiskStore::default().write_whole(&target, "replacement");

        assert!(matches!(result, Err(FileError::IoError(_))));
        assert_eq!(fs::read_to_string(target.join("inner.txt")).unwrap(), "keep");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "staged file must be cleaned up");
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("no_such_dir").join("f.txt");

        assert!(DiskStore::default().write_whole(&file_path, "x").is_err());
        assert!(!file_path.exists());
    }

    #[test]
    fn test_resolve_absolute_rejects_relative() {
        assert!(matches!(resolve_absolute("src/lib.rs"), Err(FileError::RelativePath(_))));
        assert!(matches!(resolve_absolute("./x"), Err(FileError::RelativePath(_))));
    }

    #[test]
    fn test_resolve_absolute_cleans_components() {
        assert_eq!(resolve_absolute("/a/./b/../c").unwrap(), PathBuf::from("/a/c"));
        assert_eq!(resolve_absolute("/../../etc").unwrap(), PathBuf::from("/etc"));
    }

    #[test]
    fn test_assert_exists_checks_kind() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("f.txt");
        fs::write(&file_path, "x").unwrap();

        assert!(assert_exists(&file_path, EntryKind::File).is_ok());
        assert!(assert_exists(dir.path(), EntryKind::Directory).is_ok());
        assert!(matches!(
            assert_exists(dir.path(), EntryKind::File),
            Err(FileError::WrongKind { expected: EntryKind::File, .. })
        ));
        assert!(matches!(
            assert_exists(&dir.path().join("missing"), EntryKind::File),
            Err(FileError::NotFound(_))
        ));
    }
}
