//! File system abstraction for saving downloaded payloads.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Abstraction over file system operations for testability.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Checks if a file exists at the given path.
    async fn file_exists(&self, path: &Path) -> bool;

    /// Creates all directories in the given path.
    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Writes `contents` to a new file, replacing any existing one.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;

    /// Renames a file.
    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    /// Removes a file.
    async fn remove_file(&self, path: &Path) -> std::io::Result<()>;
}

/// Default file system implementation using `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    /// Creates a new `TokioFileSystem` instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn rename_file(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

/// Returns `name` with ` (n)` inserted before its extension.
fn numbered_name(name: &str, n: usize) -> String {
    match name.rfind('.').filter(|&idx| idx > 0) {
        Some(idx) => format!("{} ({n}){}", &name[..idx], &name[idx..]),
        None => format!("{name} ({n})"),
    }
}

/// Picks a path in `dir` for `filename` that does not exist yet.
async fn free_path<F: FileSystem + ?Sized>(fs: &F, dir: &Path, filename: &str) -> PathBuf {
    let first = dir.join(filename);
    if !fs.file_exists(&first).await {
        return first;
    }
    let mut n = 1;
    loop {
        let candidate = dir.join(numbered_name(filename, n));
        if !fs.file_exists(&candidate).await {
            return candidate;
        }
        n += 1;
    }
}

/// Saves a payload under `filename` in `dir` without overwriting anything.
///
/// The payload is written to a `.part` file first and renamed into place, so
/// an interrupted save never leaves a truncated file under the final name.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot be
/// written.
pub async fn save_payload<F: FileSystem + ?Sized>(
    fs: &F,
    dir: &Path,
    filename: &str,
    payload: &[u8],
) -> std::io::Result<PathBuf> {
    if !dir.as_os_str().is_empty() {
        fs.create_dir_all(dir).await?;
    }

    let path = free_path(fs, dir, filename).await;
    let part = PathBuf::from(format!("{}.part", path.display()));

    if let Err(e) = fs.write_file(&part, payload).await {
        let _ = fs.remove_file(&part).await;
        return Err(e);
    }
    fs.rename_file(&part, &path).await?;
    Ok(path)
}
