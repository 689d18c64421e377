//! Reading the current content of tracked files.

use std::path::Path;

/// Source of a file's current lines.
///
/// Implementations never fail: a file that cannot be read has no lines.
pub trait FileReader: Send + Sync {
    fn read_lines(&self, path: &Path) -> Vec<String>;
}

/// Reads files from the local filesystem.
///
/// Content is decoded as UTF-8 with invalid sequences replaced, and split
/// into lines without their terminators (`\n` or `\r\n`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl FileReader for LocalFiles {
    fn read_lines(&self, path: &Path) -> Vec<String> {
        match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "File not found, treating as empty");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read file, treating as empty");
                Vec::new()
            }
        }
    }
}
