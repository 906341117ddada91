//! Filesystem helpers shared by the phases.
//!
//! Every helper maps IO failures to [`Error::Io`] with the offending path.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use ssdbench_core::error::{Error, IoResultExt, Result};

/// Create `dir` and all parents.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.with_path("create directory", dir)
}

/// Remove a file, returning whether it existed.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(format!("remove {:?}: {}", path, e), e)),
    }
}

/// Remove a directory tree, returning whether it existed.
pub async fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(format!("remove directory {:?}: {}", path, e), e)),
    }
}

/// Remove `dir` only if it exists and holds no entries. Returns whether it
/// was removed.
pub async fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(format!("read directory {:?}: {}", dir, e), e)),
    };
    if entries.next_entry().await.with_path("read directory", dir)?.is_some() {
        return Ok(false);
    }
    tokio::fs::remove_dir(dir).await.with_path("remove directory", dir)?;
    Ok(true)
}

/// Open `path` in append mode, write `data`, close it.
///
/// Each call is a full open/write/close cycle so that small synchronous
/// appends are measured as independent operations.
pub async fn append(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_path("open for append", path)?;
    file.write_all(data).await.with_path("append to", path)?;
    file.flush().await.with_path("flush", path)?;
    Ok(())
}

/// Regular files directly under `dir`, sorted by file name.
///
/// When `extension` is given only files with that extension are returned.
pub async fn list_files_sorted(dir: &Path, extension: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await.with_path("read directory", dir)?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.with_path("read directory", dir)? {
        let path = entry.path();
        let file_type = entry.file_type().await.with_path("stat", &path)?;
        if !file_type.is_file() {
            continue;
        }
        if let Some(ext) = extension {
            if path.extension() != Some(std::ffi::OsStr::new(ext)) {
                continue;
            }
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}
