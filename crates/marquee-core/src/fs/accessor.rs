//! Retrying filesystem accessor.
//!
//! Every call runs on the blocking pool and is retried with exponential
//! backoff while the failure is transient. Terminal failures surface as
//! [`MarqueeError::Io`]; a transient failure that outlives the retry budget
//! surfaces as [`MarqueeError::RetriesExhausted`].

use super::backend::{is_transient, Dimensions, FileStat, FsBackend, LocalFs};
use super::retry::{retry_async, RetryConfig};
use crate::config::ScanConfig;
use crate::error::{MarqueeError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of probing an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProbe {
    NotFound,
    /// Present, but the header could not be decoded.
    Undecodable,
    Image(Dimensions),
}

/// Filesystem handle that treats the mount as reliable-but-slow.
#[derive(Clone)]
pub struct ResilientFs {
    backend: Arc<dyn FsBackend>,
    retry: RetryConfig,
}

impl std::fmt::Debug for ResilientFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFs")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ResilientFs {
    pub fn new(backend: Arc<dyn FsBackend>, retry: RetryConfig) -> Self {
        Self { backend, retry }
    }

    /// Accessor over the local filesystem.
    pub fn local(retry: RetryConfig) -> Self {
        Self::new(Arc::new(LocalFs), retry)
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    async fn run<T, F>(&self, path: &Path, op: F) -> Result<T>
    where
        F: Fn(&dyn FsBackend) -> io::Result<T> + Clone + Send + Sync + 'static,
        T: Send + 'static,
    {
        let backend = self.backend.clone();
        let (result, stats) = retry_async(
            &self.retry,
            || {
                let backend = backend.clone();
                let op = op.clone();
                async move {
                    match tokio::task::spawn_blocking(move || op(backend.as_ref())).await {
                        Ok(result) => result,
                        Err(join) => Err(io::Error::other(join.to_string())),
                    }
                }
            },
            is_transient,
        )
        .await;

        result.map_err(|e| {
            if stats.exhausted {
                MarqueeError::RetriesExhausted {
                    path: path.to_path_buf(),
                    attempts: stats.attempts,
                    message: e.to_string(),
                }
            } else {
                MarqueeError::io_with_path(e, path)
            }
        })
    }

    /// Media directories directly under `root`, sorted by name.
    ///
    /// Hidden entries and NAS housekeeping folders are left out.
    pub async fn list_directories(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let dir = root.to_path_buf();
        let entries = self.run(root, move |b| b.list_dir(&dir)).await?;

        let mut dirs: Vec<_> = entries
            .into_iter()
            .filter(|e| e.is_dir && !is_ignored_dir(&e.name))
            .collect();
        dirs.sort_by(|a, b| a.name.cmp(&b.name));

        debug!("Listed {} directories under {}", dirs.len(), root.display());
        Ok(dirs.into_iter().map(|e| e.path).collect())
    }

    /// Stat a file, `None` when it does not exist.
    pub async fn probe(&self, path: &Path) -> Result<Option<FileStat>> {
        let target = path.to_path_buf();
        self.run(path, move |b| match b.stat(&target) {
            Ok(stat) => Ok(Some(stat)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    /// Whether `path` is an existing directory.
    pub async fn is_directory(&self, path: &Path) -> Result<bool> {
        let target = path.to_path_buf();
        self.run(path, move |b| b.is_dir(&target)).await
    }

    /// Read the pixel dimensions of an image file.
    pub async fn read_image_meta(&self, path: &Path) -> Result<ImageProbe> {
        let target = path.to_path_buf();
        self.run(path, move |b| match b.image_dimensions(&target) {
            Ok(Some(dims)) => Ok(ImageProbe::Image(dims)),
            Ok(None) => Ok(ImageProbe::Undecodable),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ImageProbe::NotFound),
            Err(e) => Err(e),
        })
        .await
    }

    pub async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let target = path.to_path_buf();
        self.run(path, move |b| b.read(&target)).await
    }

    /// Write one file atomically.
    pub async fn write_file(&self, path: &Path, bytes: Vec<u8>) -> Result<()> {
        self.write_files(vec![(path.to_path_buf(), bytes)]).await
    }

    /// Write several files so that either all of them land or none of the
    /// existing targets change.
    ///
    /// Each file is written to a temporary sibling first; the renames only
    /// start once every temporary is on disk. An existing target is moved
    /// aside to a backup before its replacement is renamed in, and if any
    /// rename fails the targets committed so far are put back.
    pub async fn write_files(&self, files: Vec<(PathBuf, Vec<u8>)>) -> Result<()> {
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());

        for (target, bytes) in files {
            let temp = temp_path_for(&target);
            let bytes: Arc<[u8]> = bytes.into();
            let temp_clone = temp.clone();
            let write = self
                .run(&target, move |b| b.write_new(&temp_clone, &bytes))
                .await;

            if let Err(e) = write {
                self.discard(&temp).await;
                self.discard_all(&staged).await;
                return Err(e);
            }
            staged.push((temp, target));
        }

        let mut committed: Vec<Committed> = Vec::with_capacity(staged.len());
        for idx in 0..staged.len() {
            let (temp, target) = &staged[idx];
            match self.commit(temp, target).await {
                Ok(entry) => committed.push(entry),
                Err(e) => {
                    self.roll_back(&committed).await;
                    self.discard_all(&staged[idx..]).await;
                    return Err(e);
                }
            }
        }

        for entry in &committed {
            if let Some(backup) = &entry.backup {
                self.discard(backup).await;
            }
        }
        Ok(())
    }

    /// Move `target` aside (when it exists) and rename `temp` into its place.
    async fn commit(&self, temp: &Path, target: &Path) -> Result<Committed> {
        let backup = sibling_path(target, "bak");
        let (from, to) = (target.to_path_buf(), backup.clone());
        let moved = self
            .run(target, move |b| match b.rename(&from, &to) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            })
            .await?;
        let backup = moved.then_some(backup);

        let (from, to) = (temp.to_path_buf(), target.to_path_buf());
        if let Err(e) = self.run(target, move |b| b.rename(&from, &to)).await {
            if let Some(backup) = &backup {
                self.restore(backup, target).await;
            }
            return Err(e);
        }

        debug!("Committed {}", target.display());
        Ok(Committed {
            target: target.to_path_buf(),
            backup,
        })
    }

    async fn roll_back(&self, committed: &[Committed]) {
        for entry in committed.iter().rev() {
            match &entry.backup {
                Some(backup) => self.restore(backup, &entry.target).await,
                None => self.discard(&entry.target).await,
            }
        }
    }

    async fn restore(&self, backup: &Path, target: &Path) {
        let (from, to) = (backup.to_path_buf(), target.to_path_buf());
        if let Err(e) = self.run(target, move |b| b.rename(&from, &to)).await {
            warn!(
                "Failed to restore {} from {}: {}",
                target.display(),
                backup.display(),
                e
            );
        }
    }

    /// Remove a file. Returns `false` when it was already gone.
    pub async fn remove_file(&self, path: &Path) -> Result<bool> {
        let target = path.to_path_buf();
        self.run(path, move |b| match b.remove_file(&target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        })
        .await
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = self.remove_file(path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }

    async fn discard_all(&self, staged: &[(PathBuf, PathBuf)]) {
        for (temp, _) in staged {
            self.discard(temp).await;
        }
    }
}

fn is_ignored_dir(name: &str) -> bool {
    name.starts_with('.')
        || ScanConfig::SKIPPED_DIRS
            .iter()
            .any(|skip| name.eq_ignore_ascii_case(skip))
}

/// A target that was replaced, with the previous file if there was one.
struct Committed {
    target: PathBuf,
    backup: Option<PathBuf>,
}

/// Hidden temporary sibling, unique per write.
fn temp_path_for(target: &Path) -> PathBuf {
    sibling_path(target, "tmp")
}

fn sibling_path(target: &Path, extension: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artwork".to_string());
    target.with_file_name(format!(
        ".{}.{}.{}",
        name,
        uuid::Uuid::new_v4().simple(),
        extension
    ))
}
