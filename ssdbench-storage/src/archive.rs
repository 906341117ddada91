//! # Archival Compressor
//!
//! Streams files through a deflate transform into a single zip archive.
//! Two modes:
//!
//! - [`ArchiveSource::Directory`]: the whole tree, entries relative to the root
//! - [`ArchiveSource::Files`]: an explicit list, entries named by basename
//!
//! The archive is written in place. A failure leaves the partial archive on
//! disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use ssdbench_core::error::{Error, IoResultExt, Result};

const WRITE_BUFFER: usize = 1024 * 1024;

/// What goes into an archive
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    Directory(PathBuf),
    Files(Vec<PathBuf>),
}

/// Summary of a written archive
#[derive(Debug, Clone, Default)]
pub struct ArchiveStats {
    pub entries: u64,
    pub input_bytes: u64,
    pub archive_bytes: u64,
    /// Listed files that vanished before they could be read
    pub skipped: Vec<PathBuf>,
}

/// Compress `source` into `destination` at `level` (0-9). Returns the
/// archive size in bytes.
pub async fn compress(source: ArchiveSource, destination: impl AsRef<Path>, level: u32) -> Result<u64> {
    Ok(compress_with_stats(source, destination, level).await?.archive_bytes)
}

pub async fn compress_with_stats(
    source: ArchiveSource,
    destination: impl AsRef<Path>,
    level: u32,
) -> Result<ArchiveStats> {
    if level > 9 {
        return Err(Error::Configuration {
            message: format!("compression level must be 0..=9, got {}", level),
        });
    }
    let destination = destination.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || write_archive(&source, &destination, level))
        .await
        .map_err(|e| Error::Internal {
            message: format!("archive task failed: {}", e),
        })?
}

fn transform_error(e: ZipError) -> Error {
    match e {
        ZipError::Io(io) => Error::io(format!("archive write: {}", io), io),
        other => Error::Transform {
            message: other.to_string(),
        },
    }
}

fn write_archive(source: &ArchiveSource, destination: &Path, level: u32) -> Result<ArchiveStats> {
    let file = File::create(destination).with_path("create archive", destination)?;
    let mut zip = ZipWriter::new(BufWriter::with_capacity(WRITE_BUFFER, file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level as i32));

    let mut stats = ArchiveStats::default();

    match source {
        ArchiveSource::Directory(root) => {
            for (path, name, is_dir) in walk_sorted(root)? {
                if is_dir {
                    zip.add_directory(name, options).map_err(transform_error)?;
                    continue;
                }
                stats.input_bytes += add_file(&mut zip, &path, &name, options)?;
                stats.entries += 1;
            }
        }
        ArchiveSource::Files(paths) => {
            for path in paths {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| Error::Configuration {
                        message: format!("cannot archive path without a file name: {:?}", path),
                    })?;
                match add_file(&mut zip, path, &name, options) {
                    Ok(bytes) => {
                        stats.input_bytes += bytes;
                        stats.entries += 1;
                    }
                    Err(Error::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                        warn!(path = ?path, "Skipping missing file while archiving");
                        stats.skipped.push(path.clone());
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    let mut writer = zip.finish().map_err(transform_error)?;
    writer.flush().with_path("flush archive", destination)?;
    drop(writer);

    stats.archive_bytes = std::fs::metadata(destination)
        .with_path("stat archive", destination)?
        .len();

    debug!(
        archive = ?destination,
        entries = stats.entries,
        input_bytes = stats.input_bytes,
        archive_bytes = stats.archive_bytes,
        "Archive written"
    );
    Ok(stats)
}

fn add_file<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
    options: FileOptions,
) -> Result<u64> {
    // Open before starting the entry so a missing file leaves no empty entry behind
    let mut input = File::open(path).with_path("open", path)?;
    let size = input.metadata().with_path("stat", path)?.len();

    zip.start_file(name, options.large_file(size > u32::MAX as u64))
        .map_err(transform_error)?;
    std::io::copy(&mut input, zip).with_path("compress", path)
}

/// Every entry under `root` as (path, archive name, is_dir), parents first,
/// siblings sorted by name.
fn walk_sorted(root: &Path) -> Result<Vec<(PathBuf, String, bool)>> {
    let mut out = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        let relative = entry.path().strip_prefix(root).map_err(|e| Error::Internal {
            message: format!("{:?} is not under {:?}: {}", entry.path(), root, e),
        })?;

        // Zip entry names always use '/'
        let mut name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let is_dir = entry.file_type().is_dir();
        if is_dir {
            name.push('/');
        }
        out.push((entry.into_path(), name, is_dir));
    }

    Ok(out)
}

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let message = format!("walk {:?}: {}", e.path().unwrap_or(root), e);
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
    Error::io(message, source)
}
