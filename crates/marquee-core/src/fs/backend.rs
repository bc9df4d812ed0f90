//! Raw filesystem primitives.
//!
//! [`FsBackend`] is the seam between the resilient accessor and the actual
//! mount: each method is a single blocking attempt with no retry of its
//! own. [`LocalFs`] implements it over `std::fs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
}

/// Size and modification time of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub len: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Single-attempt filesystem operations.
pub trait FsBackend: Send + Sync + 'static {
    /// Immediate children of `dir`.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;

    /// Metadata of a regular file. Missing files yield `ErrorKind::NotFound`.
    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Whether `path` is an existing directory (following links).
    fn is_dir(&self, path: &Path) -> io::Result<bool>;

    /// Header-only dimension probe. `Ok(None)` when the file exists but is not
    /// a decodable image.
    fn image_dimensions(&self, path: &Path) -> io::Result<Option<Dimensions>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create (or truncate) `path`, write `bytes` and sync to disk.
    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// Local (or network-mounted) filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FsBackend for LocalFs {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let depth = e.depth();
                    let err: io::Error = e.into();
                    // A child that vanished or is unreadable should not hide its siblings.
                    if depth == 0 || is_transient(&err) {
                        return Err(err);
                    }
                    warn!("Skipping unreadable entry in {}: {}", dir.display(), err);
                    continue;
                }
            };

            entries.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type().is_dir(),
                path: entry.into_path(),
            });
        }

        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = fs::metadata(path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(FileStat {
            len: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn is_dir(&self, path: &Path) -> io::Result<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn image_dimensions(&self, path: &Path) -> io::Result<Option<Dimensions>> {
        match image::image_dimensions(path) {
            Ok((width, height)) => Ok(Some(Dimensions { width, height })),
            Err(image::ImageError::IoError(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Whether an I/O error is a mount hiccup worth retrying.
///
/// Permission, missing-file and disk-full failures are terminal.
pub fn is_transient(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    #[cfg(unix)]
    {
        if let Some(code) = err.raw_os_error() {
            return matches!(
                code,
                libc::EAGAIN | libc::EBUSY | libc::ESTALE | libc::EINTR | libc::ETIMEDOUT
            );
        }
    }

    false
}
