pub mod memory;

use std::path::Path;
use thiserror::Error;

pub use memory::MemoryFs;

/// Regular file, rw-r--r--.
pub const MODE_FILE: u32 = 0o100644;
/// Directory, rwxr-xr-x.
pub const MODE_DIR: u32 = 0o040755;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{0}: No such file or directory")]
    NotFound(String),
    #[error("{0}: Not a directory")]
    NotADirectory(String),
    #[error("{0}: Is a directory")]
    IsADirectory(String),
    #[error("{0}: File exists")]
    Exists(String),
    #[error("{0}: Permission denied")]
    PermissionDenied(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// The filesystem the emulated session lives in. Paths handed to the
/// mutating operations are expected to be already resolved (absolute).
pub trait VirtualFs: Send {
    /// Lexically resolve `path` against `cwd`. Existence is not checked.
    fn resolve_path(&self, path: &str, cwd: &str) -> String {
        normalize(path, cwd)
    }

    /// Expand a wildcard path. Returns no entries when `path` has no
    /// wildcard or nothing matches, so the caller keeps the original word.
    fn resolve_path_wc(&self, path: &str, cwd: &str) -> Vec<String>;

    fn exists(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError>;

    /// Create (or truncate) a regular file. Fails with `NotFound` when the
    /// parent directory is missing.
    fn mkfile(&mut self, path: &str, uid: u32, gid: u32, mode: u32) -> Result<(), FsError>;
    fn mkdir(&mut self, path: &str, uid: u32, gid: u32, mode: u32) -> Result<(), FsError>;
    fn update_size(&mut self, path: &str, size: u64) -> Result<(), FsError>;
    fn size(&self, path: &str) -> Result<u64, FsError>;

    /// Back the virtual file with a file on the real filesystem.
    fn update_realfile(&mut self, path: &str, real: &Path) -> Result<(), FsError>;
    fn read_file(&self, path: &str) -> Result<Vec<u8>, FsError>;
}

pub fn has_wildcard(s: &str) -> bool {
    s.contains('*') || s.contains('?') || s.contains('[')
}

/// Collapse `.`/`..`/empty components and anchor at `cwd` when relative.
pub fn normalize(path: &str, cwd: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for comp in joined.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Split an absolute path into (parent, basename).
pub fn split_parent(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => ("/".to_string(), path.to_string()),
    }
}
