//! Artwork inventory scanner.
//!
//! Walks the immediate subdirectories of every library root and probes each
//! one for its artwork files. Directories are scanned concurrently; the
//! probes for a single directory run in sequence and are collected into one
//! [`ScannedItem`] before it is emitted.

use super::types::{
    ArtworkKind, ArtworkRecord, MediaCategory, MediaItem, ScanFailure, ScanReport, ScannedItem,
};
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::fs::{ImageProbe, ResilientFs};
use crate::identity::{anchor_id, parse_directory_name, sort_key};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Read-only scanner over the configured roots.
#[derive(Debug, Clone)]
pub struct InventoryScanner {
    fs: ResilientFs,
    concurrency: usize,
}

impl InventoryScanner {
    pub fn new(fs: ResilientFs, concurrency: usize) -> Self {
        Self {
            fs,
            concurrency: concurrency.max(1),
        }
    }

    pub fn fs(&self) -> &ResilientFs {
        &self.fs
    }

    /// Scan every root of `category`.
    ///
    /// A root or directory that fails with a terminal error is recorded in
    /// [`ScanReport::failures`] and the scan carries on. Only cancellation
    /// aborts the whole scan.
    pub async fn scan(
        &self,
        category: MediaCategory,
        roots: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let start = Instant::now();
        let mut report = ScanReport {
            roots: roots.to_vec(),
            ..Default::default()
        };

        let mut dirs = Vec::new();
        for root in roots {
            cancel.check()?;
            match self.fs.list_directories(root).await {
                Ok(children) => dirs.extend(children.into_iter().map(|dir| (root.clone(), dir))),
                Err(e) => {
                    warn!(root = %root.display(), "Skipping library root: {}", e);
                    report.failures.push(ScanFailure {
                        path: root.clone(),
                        message: e.to_string(),
                        is_root: true,
                    });
                }
            }
        }

        let mut results = stream::iter(dirs)
            .map(|(root, dir)| async move {
                let result = self.scan_item(category, &root, &dir).await;
                (dir, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((dir, result)) = results.next().await {
            cancel.check()?;
            match result {
                Ok(item) => report.items.push(item),
                Err(e) => {
                    warn!(path = %dir.display(), "Skipping unreadable media directory: {}", e);
                    report.failures.push(ScanFailure {
                        path: dir,
                        message: e.to_string(),
                        is_root: false,
                    });
                }
            }
        }

        report.items.sort_by(|a, b| {
            a.item
                .sort_key
                .cmp(&b.item.sort_key)
                .then_with(|| a.item.path.cmp(&b.item.path))
        });
        report.failures.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            "Scanned {} {} items in {:?} ({} failures)",
            report.items.len(),
            category,
            start.elapsed(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Probe a single media directory.
    pub async fn scan_item(
        &self,
        category: MediaCategory,
        root: &Path,
        dir: &Path,
    ) -> Result<ScannedItem> {
        let item = describe_item(category, root, dir);
        let mut artwork = BTreeMap::new();
        for kind in ArtworkKind::ALL {
            artwork.insert(kind, self.probe_artwork(dir, kind).await?);
        }
        Ok(ScannedItem { item, artwork })
    }

    /// Live record for one kind in `dir`.
    pub async fn probe_artwork(&self, dir: &Path, kind: ArtworkKind) -> Result<ArtworkRecord> {
        let mut record = ArtworkRecord::absent(kind);

        for name in kind.candidate_file_names() {
            let path = dir.join(&name);
            let Some(stat) = self.fs.probe(&path).await? else {
                continue;
            };

            record.present = true;
            record.last_modified = stat.modified;
            record.size_bytes = Some(stat.len);
            record.dimensions = match self.fs.read_image_meta(&path).await? {
                ImageProbe::Image(dims) => Some(dims),
                ImageProbe::Undecodable => {
                    debug!(path = %path.display(), "Artwork present but not decodable");
                    None
                }
                // Removed between the stat and the probe; keep what the stat saw.
                ImageProbe::NotFound => None,
            };
            record.full_path = Some(path);
            break;
        }

        for name in kind.candidate_thumb_names() {
            let path = dir.join(&name);
            if self.fs.probe(&path).await?.is_some() {
                record.thumb_path = Some(path);
                break;
            }
        }

        Ok(record)
    }

    /// Every full-size and thumbnail file of `kind` currently in `dir`.
    pub async fn existing_variants(&self, dir: &Path, kind: ArtworkKind) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for name in kind
            .candidate_file_names()
            .into_iter()
            .chain(kind.candidate_thumb_names())
        {
            let path = dir.join(name);
            if self.fs.probe(&path).await?.is_some() {
                found.push(path);
            }
        }
        Ok(found)
    }
}

/// Build the item description for a directory from its name alone.
pub fn describe_item(category: MediaCategory, root: &Path, dir: &Path) -> MediaItem {
    let folder = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned());
    let parsed = parse_directory_name(&folder);
    if parsed.is_ambiguous() {
        debug!(folder = %folder, warnings = ?parsed.warnings, "Directory name does not follow convention");
    }

    let display_title = parsed.identity.display_title();
    MediaItem {
        category,
        key: parsed.identity.key(),
        sort_key: sort_key(&display_title),
        anchor_id: anchor_id(&display_title),
        display_title,
        identity: parsed.identity,
        folder,
        path: dir.to_path_buf(),
        root: root.to_path_buf(),
        warnings: parsed.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MarqueeError;
    use crate::fs::{Dimensions, DirEntryInfo, FileStat, FsBackend, LocalFs, RetryConfig};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn retry() -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(2)
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    fn scanner() -> InventoryScanner {
        InventoryScanner::new(ResilientFs::local(retry()), 4)
    }

    /// Local filesystem with a slow, counted `stat`.
    #[derive(Default)]
    struct SlowStat {
        calls: AtomicUsize,
    }

    impl FsBackend for SlowStat {
        fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
            LocalFs.list_dir(dir)
        }
        fn stat(&self, path: &Path) -> io::Result<FileStat> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            LocalFs.stat(path)
        }
        fn is_dir(&self, path: &Path) -> io::Result<bool> {
            LocalFs.is_dir(path)
        }
        fn image_dimensions(&self, path: &Path) -> io::Result<Option<Dimensions>> {
            LocalFs.image_dimensions(path)
        }
        fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            LocalFs.read(path)
        }
        fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            LocalFs.write_new(path, bytes)
        }
        fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            LocalFs.rename(from, to)
        }
        fn remove_file(&self, path: &Path) -> io::Result<()> {
            LocalFs.remove_file(path)
        }
    }

    fn write_image(path: &Path, width: u32, height: u32) {
        image::RgbImage::new(width, height).save(path).unwrap();
    }

    #[tokio::test]
    async fn test_scan_records_artwork() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Heat (1995) {tmdb-949}");
        std::fs::create_dir(&dir).unwrap();
        write_image(&dir.join("poster.jpg"), 20, 30);
        write_image(&dir.join("poster-thumb.jpg"), 2, 3);
        write_image(&dir.join("backdrop.png"), 32, 18);

        let report = scanner()
            .scan(
                MediaCategory::Movies,
                &[temp.path().to_path_buf()],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.items.len(), 1);
        let scanned = &report.items[0];
        assert_eq!(scanned.item.key.as_str(), "id:tmdb-949");
        assert_eq!(scanned.item.display_title, "Heat (1995)");

        let poster = scanned.record(ArtworkKind::Poster);
        assert!(poster.present);
        assert_eq!(poster.dimensions_label(), "20x30");
        assert_eq!(poster.thumb_path, Some(dir.join("poster-thumb.jpg")));

        let backdrop = scanned.record(ArtworkKind::Backdrop);
        assert_eq!(backdrop.full_path, Some(dir.join("backdrop.png")));
        assert!(backdrop.thumb_path.is_none());

        assert!(!scanned.is_present(ArtworkKind::Logo));
    }

    #[tokio::test]
    async fn test_undecodable_artwork_is_present_without_dimensions() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Alien (1979)");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("logo.png"), b"garbage").unwrap();

        let record = scanner()
            .probe_artwork(&dir, ArtworkKind::Logo)
            .await
            .unwrap();
        assert!(record.present);
        assert_eq!(record.dimensions, None);
        assert_eq!(record.size_bytes, Some(7));
    }

    #[tokio::test]
    async fn test_missing_root_is_reported_not_fatal() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("Heat (1995)")).unwrap();
        let missing = temp.path().join("offline");

        let report = scanner()
            .scan(
                MediaCategory::Movies,
                &[missing.clone(), temp.path().to_path_buf()],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, missing);
        assert!(report.failures[0].is_root);
    }

    #[tokio::test]
    async fn test_items_sorted_ignoring_leading_article() {
        let temp = TempDir::new().unwrap();
        for name in ["Zodiac (2007)", "The Abyss (1989)", "Brazil (1985)"] {
            std::fs::create_dir(temp.path().join(name)).unwrap();
        }

        let report = scanner()
            .scan(
                MediaCategory::Movies,
                &[temp.path().to_path_buf()],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let folders: Vec<_> = report.items.iter().map(|i| i.item.folder.as_str()).collect();
        assert_eq!(folders, vec!["The Abyss (1989)", "Brazil (1985)", "Zodiac (2007)"]);
    }

    #[tokio::test]
    async fn test_cancelled_scan() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = scanner()
            .scan(MediaCategory::Tv, &[temp.path().to_path_buf()], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, MarqueeError::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_scan_stops_probing() {
        let temp = TempDir::new().unwrap();
        for name in ["Alien (1979)", "Brazil (1985)", "Heat (1995)", "Zodiac (2007)"] {
            std::fs::create_dir(temp.path().join(name)).unwrap();
        }
        let backend = Arc::new(SlowStat::default());
        let scanner = InventoryScanner::new(ResilientFs::new(backend.clone(), retry()), 1);
        let roots = [temp.path().to_path_buf()];
        let cancel = CancellationToken::new();

        let scan = scanner.scan(MediaCategory::Movies, &roots, &cancel);
        assert!(tokio::time::timeout(Duration::from_millis(20), scan)
            .await
            .is_err());

        let at_drop = backend.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        // Only a call already handed to the blocking pool may still land.
        assert!(backend.calls.load(Ordering::SeqCst) <= at_drop + 1);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_existing_variants() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("backdrop.png"), b"x").unwrap();
        std::fs::write(temp.path().join("backdrop-thumb.jpeg"), b"x").unwrap();
        std::fs::write(temp.path().join("poster.jpg"), b"x").unwrap();

        let mut found = scanner()
            .existing_variants(temp.path(), ArtworkKind::Backdrop)
            .await
            .unwrap();
        found.sort();
        assert_eq!(
            found,
            vec![
                temp.path().join("backdrop-thumb.jpeg"),
                temp.path().join("backdrop.png"),
            ]
        );
    }
}
