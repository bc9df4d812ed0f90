//! Inventory types: categories, artwork kinds and per-item scan records.

use crate::config::{ArtworkConfig, ScanConfig};
use crate::error::MarqueeError;
use crate::fs::Dimensions;
use crate::identity::{IdentityKey, MediaIdentity, ParseWarning};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Library section a root belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Movies,
    Tv,
}

impl MediaCategory {
    pub const ALL: [MediaCategory; 2] = [MediaCategory::Movies, MediaCategory::Tv];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Movies => "movies",
            MediaCategory::Tv => "tv",
        }
    }
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCategory {
    type Err = MarqueeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movies" | "movie" => Ok(MediaCategory::Movies),
            "tv" | "shows" | "tv_shows" | "tv-shows" => Ok(MediaCategory::Tv),
            other => Err(MarqueeError::InvalidParams {
                message: format!("Unknown media category: {}", other),
            }),
        }
    }
}

/// Kind of artwork tracked per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkKind {
    Poster,
    Logo,
    Backdrop,
}

impl ArtworkKind {
    pub const ALL: [ArtworkKind; 3] = [ArtworkKind::Poster, ArtworkKind::Logo, ArtworkKind::Backdrop];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtworkKind::Poster => "poster",
            ArtworkKind::Logo => "logo",
            ArtworkKind::Backdrop => "backdrop",
        }
    }

    /// Extension artwork of this kind is saved with. Logos keep their alpha channel.
    pub fn canonical_extension(&self) -> &'static str {
        match self {
            ArtworkKind::Logo => "png",
            ArtworkKind::Poster | ArtworkKind::Backdrop => "jpg",
        }
    }

    /// `poster.jpg`, `logo.png`, `backdrop.jpg`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.as_str(), self.canonical_extension())
    }

    /// `poster-thumb.jpg`, `logo-thumb.png`, `backdrop-thumb.jpg`.
    pub fn thumb_file_name(&self) -> String {
        format!(
            "{}{}.{}",
            self.as_str(),
            ScanConfig::THUMB_SUFFIX,
            self.canonical_extension()
        )
    }

    /// Full-size file names probed during a scan, canonical one first.
    pub fn candidate_file_names(&self) -> Vec<String> {
        self.candidates("")
    }

    /// Thumbnail file names probed during a scan, canonical one first.
    pub fn candidate_thumb_names(&self) -> Vec<String> {
        self.candidates(ScanConfig::THUMB_SUFFIX)
    }

    fn candidates(&self, suffix: &str) -> Vec<String> {
        let canonical = self.canonical_extension();
        std::iter::once(canonical)
            .chain(
                ScanConfig::IMAGE_EXTENSIONS
                    .iter()
                    .copied()
                    .filter(|ext| *ext != canonical),
            )
            .map(|ext| format!("{}{}.{}", self.as_str(), suffix, ext))
            .collect()
    }

    /// Thumbnail target size (width, height).
    pub fn thumb_size(&self) -> (u32, u32) {
        match self {
            ArtworkKind::Poster => ArtworkConfig::POSTER_THUMB,
            ArtworkKind::Logo => ArtworkConfig::LOGO_THUMB,
            ArtworkKind::Backdrop => ArtworkConfig::BACKDROP_THUMB,
        }
    }
}

impl std::fmt::Display for ArtworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtworkKind {
    type Err = MarqueeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poster" => Ok(ArtworkKind::Poster),
            "logo" => Ok(ArtworkKind::Logo),
            "backdrop" | "fanart" => Ok(ArtworkKind::Backdrop),
            other => Err(MarqueeError::InvalidParams {
                message: format!("Unknown artwork kind: {}", other),
            }),
        }
    }
}

/// A media directory discovered by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub category: MediaCategory,
    pub identity: MediaIdentity,
    pub key: IdentityKey,
    /// Directory base name as found on disk.
    pub folder: String,
    pub path: PathBuf,
    /// Library root the directory was found under.
    pub root: PathBuf,
    pub display_title: String,
    pub sort_key: String,
    pub anchor_id: String,
    /// Non-empty when the name did not follow the naming convention.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ParseWarning>,
}

/// What is on disk for one (item, kind).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkRecord {
    pub kind: ArtworkKind,
    pub present: bool,
    pub full_path: Option<PathBuf>,
    pub thumb_path: Option<PathBuf>,
    /// `None` when absent or when the header could not be read.
    pub dimensions: Option<Dimensions>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size_bytes: Option<u64>,
}

impl ArtworkRecord {
    pub fn absent(kind: ArtworkKind) -> Self {
        Self {
            kind,
            present: false,
            full_path: None,
            thumb_path: None,
            dimensions: None,
            last_modified: None,
            size_bytes: None,
        }
    }

    /// `WxH`, or `Unknown` when not readable.
    pub fn dimensions_label(&self) -> String {
        self.dimensions
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// An item together with the records for every artwork kind.
///
/// Built in full before it is handed out, so a reader never sees an item
/// with some kinds probed and others missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedItem {
    pub item: MediaItem,
    pub artwork: BTreeMap<ArtworkKind, ArtworkRecord>,
}

impl ScannedItem {
    /// Record for `kind`; absent when the scan produced none.
    pub fn record(&self, kind: ArtworkKind) -> ArtworkRecord {
        self.artwork
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ArtworkRecord::absent(kind))
    }

    pub fn is_present(&self, kind: ArtworkKind) -> bool {
        self.artwork.get(&kind).is_some_and(|r| r.present)
    }
}

/// A directory (or root) that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub path: PathBuf,
    pub message: String,
    /// True when a whole root could not be listed.
    pub is_root: bool,
}

/// Result of scanning every root of one category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub items: Vec<ScannedItem>,
    pub failures: Vec<ScanFailure>,
    pub roots: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_names_start_with_canonical() {
        assert_eq!(
            ArtworkKind::Backdrop.candidate_file_names(),
            vec!["backdrop.jpg", "backdrop.jpeg", "backdrop.png"]
        );
        assert_eq!(
            ArtworkKind::Logo.candidate_file_names(),
            vec!["logo.png", "logo.jpg", "logo.jpeg"]
        );
        assert_eq!(
            ArtworkKind::Poster.candidate_thumb_names()[0],
            "poster-thumb.jpg"
        );
    }

    #[test]
    fn test_thumb_sizes() {
        assert_eq!(ArtworkKind::Poster.thumb_size(), (300, 450));
        assert_eq!(ArtworkKind::Logo.thumb_size(), (300, 150));
        assert_eq!(ArtworkKind::Backdrop.thumb_size(), (300, 169));
    }

    #[test]
    fn test_parse_kind_and_category() {
        assert_eq!("Backdrop".parse::<ArtworkKind>().unwrap(), ArtworkKind::Backdrop);
        assert_eq!("tv".parse::<MediaCategory>().unwrap(), MediaCategory::Tv);
        assert!("banner".parse::<ArtworkKind>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&MediaCategory::Movies).unwrap(), "\"movies\"");
        assert_eq!(serde_json::to_string(&ArtworkKind::Logo).unwrap(), "\"logo\"");
    }

    #[test]
    fn test_missing_record_is_absent() {
        let item = ScannedItem {
            item: MediaItem {
                category: MediaCategory::Movies,
                identity: crate::identity::parse_directory_name("Heat (1995)").identity,
                key: crate::identity::parse_directory_name("Heat (1995)").identity.key(),
                folder: "Heat (1995)".into(),
                path: PathBuf::from("/m/Heat (1995)"),
                root: PathBuf::from("/m"),
                display_title: "Heat (1995)".into(),
                sort_key: "heat (1995)".into(),
                anchor_id: "heat-1995".into(),
                warnings: vec![],
            },
            artwork: BTreeMap::new(),
        };
        assert!(!item.is_present(ArtworkKind::Poster));
        assert_eq!(item.record(ArtworkKind::Logo).dimensions_label(), "Unknown");
    }
}
