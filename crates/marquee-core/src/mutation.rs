//! Artwork mutation service.
//!
//! Saving artwork and changing its ledger state are the only writes the
//! library makes to a media directory. Each operation holds the lock for
//! its (item, kind) pair from the first probe to the last write, so calls
//! for different pairs run in parallel and calls for the same pair queue.

use crate::config::ArtworkConfig;
use crate::error::{MarqueeError, Result};
use crate::fs::Dimensions;
use crate::identity::IdentityKey;
use crate::inventory::{ArtworkKind, ArtworkRecord, InventoryScanner, MediaItem};
use crate::ledger::UnavailabilityLedger;
use crate::locks::KeyedLocks;
use crate::notify::{ArtworkNotifier, ArtworkSavedEvent};
use crate::reconcile::ArtworkStatus;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub item: MediaItem,
    pub kind: ArtworkKind,
    /// Live record read back after the write.
    pub record: ArtworkRecord,
    pub status: ArtworkStatus,
    /// Whether an unavailability mark was retracted.
    pub ledger_cleared: bool,
    /// Old variants with other extensions that were removed.
    pub removed: Vec<PathBuf>,
}

/// Result of a ledger change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerChange {
    pub item: MediaItem,
    pub kind: ArtworkKind,
    pub status: ArtworkStatus,
    /// False when the ledger already had the requested state.
    pub changed: bool,
}

/// Full-size and thumbnail encodings of a source image.
#[derive(Debug, Clone)]
pub struct RenderedArtwork {
    pub full: Vec<u8>,
    pub thumb: Vec<u8>,
    pub dimensions: Dimensions,
}

/// Writes artwork and ledger changes for single (item, kind) pairs.
pub struct ArtworkService {
    scanner: InventoryScanner,
    ledger: Arc<UnavailabilityLedger>,
    notifier: Option<Arc<dyn ArtworkNotifier>>,
    locks: KeyedLocks<(IdentityKey, ArtworkKind)>,
}

impl std::fmt::Debug for ArtworkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtworkService")
            .field("ledger", &self.ledger)
            .field("has_notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl ArtworkService {
    pub fn new(
        scanner: InventoryScanner,
        ledger: Arc<UnavailabilityLedger>,
        notifier: Option<Arc<dyn ArtworkNotifier>>,
    ) -> Self {
        Self {
            scanner,
            ledger,
            notifier,
            locks: KeyedLocks::new(),
        }
    }

    /// Save `bytes` as the `kind` artwork of `item`.
    ///
    /// The image is decoded and both encodings are produced before anything
    /// on disk changes. The full image and thumbnail are then committed
    /// together; if that fails the previous files and the ledger are left
    /// as they were.
    pub async fn save_artwork(
        &self,
        item: &MediaItem,
        kind: ArtworkKind,
        bytes: Vec<u8>,
        source_url: Option<String>,
    ) -> Result<SaveOutcome> {
        if bytes.len() as u64 > ArtworkConfig::MAX_SOURCE_BYTES {
            return Err(MarqueeError::InvalidImage {
                message: format!("{} bytes exceeds the size limit", bytes.len()),
            });
        }

        let rendered = tokio::task::spawn_blocking(move || render_artwork(&bytes, kind))
            .await
            .map_err(|e| MarqueeError::Other(format!("artwork render task failed: {}", e)))??;

        let _guard = self.locks.lock((item.key.clone(), kind)).await;

        let full_path = item.path.join(kind.file_name());
        let thumb_path = item.path.join(kind.thumb_file_name());
        let stale: Vec<PathBuf> = self
            .scanner
            .existing_variants(&item.path, kind)
            .await?
            .into_iter()
            .filter(|p| *p != full_path && *p != thumb_path)
            .collect();

        let full_len = rendered.full.len() as u64;
        self.scanner
            .fs()
            .write_files(vec![
                (full_path.clone(), rendered.full),
                (thumb_path.clone(), rendered.thumb),
            ])
            .await?;

        let mut removed = Vec::with_capacity(stale.len());
        for path in stale {
            match self.scanner.fs().remove_file(&path).await {
                Ok(true) => removed.push(path),
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), "Could not remove old artwork: {}", e),
            }
        }

        // The file on disk already makes the status green; a failed clear
        // only leaves a stale mark behind.
        let ledger_cleared = match self.ledger.clear(&item.key, kind).await {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!(key = %item.key, kind = %kind, "Could not clear unavailability mark: {}", e);
                false
            }
        };

        // The files are committed; a failed read-back only costs the stat details.
        let record = match self.scanner.probe_artwork(&item.path, kind).await {
            Ok(record) => record,
            Err(e) => {
                warn!(folder = %item.folder, kind = %kind, "Could not read back saved artwork: {}", e);
                ArtworkRecord {
                    kind,
                    present: true,
                    full_path: Some(full_path.clone()),
                    thumb_path: Some(thumb_path),
                    dimensions: Some(rendered.dimensions),
                    last_modified: None,
                    size_bytes: Some(full_len),
                }
            }
        };
        info!(
            "Saved {} for '{}' ({})",
            kind, item.folder, rendered.dimensions
        );

        self.notify(ArtworkSavedEvent {
            identity: item.identity.clone(),
            key: item.key.clone(),
            category: item.category,
            folder: item.folder.clone(),
            kind,
            path: full_path,
            saved_at: Utc::now(),
            source_url,
        });

        Ok(SaveOutcome {
            item: item.clone(),
            kind,
            status: ArtworkStatus::classify(record.present, false),
            record,
            ledger_cleared,
            removed,
        })
    }

    /// Record that no `kind` artwork exists for `item`.
    ///
    /// Refused with [`MarqueeError::ArtworkPresent`] while a file is on disk.
    pub async fn mark_unavailable(&self, item: &MediaItem, kind: ArtworkKind) -> Result<LedgerChange> {
        let _guard = self.locks.lock((item.key.clone(), kind)).await;

        let record = self.scanner.probe_artwork(&item.path, kind).await?;
        if record.present {
            return Err(MarqueeError::ArtworkPresent {
                folder: item.folder.clone(),
                kind: kind.to_string(),
            });
        }

        let changed = self.ledger.mark(&item.key, kind).await?;
        debug!(key = %item.key, kind = %kind, changed, "Marked unavailable");
        Ok(LedgerChange {
            item: item.clone(),
            kind,
            status: ArtworkStatus::Red,
            changed,
        })
    }

    /// Retract an unavailability mark.
    pub async fn clear_unavailable(&self, item: &MediaItem, kind: ArtworkKind) -> Result<LedgerChange> {
        let _guard = self.locks.lock((item.key.clone(), kind)).await;

        let changed = self.ledger.clear(&item.key, kind).await?;
        let record = self.scanner.probe_artwork(&item.path, kind).await?;
        Ok(LedgerChange {
            item: item.clone(),
            kind,
            status: ArtworkStatus::classify(record.present, false),
            changed,
        })
    }

    fn notify(&self, event: ArtworkSavedEvent) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.artwork_saved(&event).await {
                warn!(folder = %event.folder, kind = %event.kind, "Notification failed: {}", e);
            }
        });
    }
}

/// Decode `bytes` and produce the canonical full image and thumbnail for `kind`.
///
/// Source bytes already in the canonical format are kept as-is.
pub fn render_artwork(bytes: &[u8], kind: ArtworkKind) -> Result<RenderedArtwork> {
    let format = image::guess_format(bytes).map_err(|e| MarqueeError::InvalidImage {
        message: format!("unrecognised image data: {}", e),
    })?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(MarqueeError::InvalidImage {
            message: "image has no pixels".to_string(),
        });
    }

    let canonical = canonical_format(kind);
    let full = if format == canonical {
        bytes.to_vec()
    } else {
        debug!("Converting {:?} {} to {:?}", format, kind, canonical);
        encode(&img, canonical)?
    };

    let (thumb_width, thumb_height) = kind.thumb_size();
    let thumb_img = match kind {
        // Cropping would cut into a wordmark; fit it on a transparent canvas instead.
        ArtworkKind::Logo => letterbox(&img, thumb_width, thumb_height),
        ArtworkKind::Poster | ArtworkKind::Backdrop => cover(&img, thumb_width, thumb_height),
    };
    let thumb = encode(&thumb_img, canonical)?;

    Ok(RenderedArtwork {
        full,
        thumb,
        dimensions: Dimensions { width, height },
    })
}

fn canonical_format(kind: ArtworkKind) -> ImageFormat {
    match kind.canonical_extension() {
        "png" => ImageFormat::Png,
        _ => ImageFormat::Jpeg,
    }
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(PngEncoder::new(&mut buf))?
        }
        _ => DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(
            JpegEncoder::new_with_quality(&mut buf, ArtworkConfig::JPEG_QUALITY),
        )?,
    }
    Ok(buf)
}

/// Centre-crop to the target aspect ratio, then resize to exactly the target.
fn cover(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = img.dimensions();
    let target = f64::from(width) / f64::from(height);
    let current = f64::from(src_w) / f64::from(src_h);

    let (crop_w, crop_h) = if current > target {
        ((f64::from(src_h) * target).round() as u32, src_h)
    } else {
        (src_w, (f64::from(src_w) / target).round() as u32)
    };
    let crop_w = crop_w.clamp(1, src_w);
    let crop_h = crop_h.clamp(1, src_h);

    img.crop_imm((src_w - crop_w) / 2, (src_h - crop_h) / 2, crop_w, crop_h)
        .resize_exact(width, height, FilterType::Lanczos3)
}

/// Fit inside the target and centre on a transparent canvas of exactly the target size.
fn letterbox(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let fitted = img.resize(width, height, FilterType::Lanczos3).to_rgba8();
    let mut canvas = RgbaImage::new(width, height);
    let x = (width - fitted.width().min(width)) / 2;
    let y = (height - fitted.height().min(height)) / 2;
    imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));
    DynamicImage::ImageRgba8(canvas)
}
