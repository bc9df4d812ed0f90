//! Centralized configuration for Marquee.
//!
//! Constant tables for scanning, artwork output and persistence paths, plus
//! the runtime [`LibraryConfig`] supplied by the embedding application.

use crate::error::{MarqueeError, Result};
use crate::fs::RetryConfig;
use crate::inventory::MediaCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "Marquee";
    pub const DATA_DIR_NAME: &'static str = "marquee";
}

/// Directory scanning.
pub struct ScanConfig;

impl ScanConfig {
    /// Item directories probed at the same time per scan.
    pub const DEFAULT_CONCURRENCY: usize = 16;
    /// NAS housekeeping folders that never hold media (compared case-insensitively).
    pub const SKIPPED_DIRS: &'static [&'static str] = &["@eadir", "#recycle", "#snapshot"];
    /// Extensions probed for every artwork kind, in preference order.
    pub const IMAGE_EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png"];
    pub const THUMB_SUFFIX: &'static str = "-thumb";
}

/// Artwork output.
pub struct ArtworkConfig;

impl ArtworkConfig {
    pub const POSTER_THUMB: (u32, u32) = (300, 450);
    pub const LOGO_THUMB: (u32, u32) = (300, 150);
    pub const BACKDROP_THUMB: (u32, u32) = (300, 169);
    pub const JPEG_QUALITY: u8 = 90;
    /// Largest source image accepted for saving.
    pub const MAX_SOURCE_BYTES: u64 = 50 * 1024 * 1024;
}

/// Filesystem retry defaults for flaky network mounts.
pub struct RetryDefaults;

impl RetryDefaults {
    pub const MAX_ATTEMPTS: u32 = 5;
    pub const BASE_DELAY: Duration = Duration::from_millis(500);
    pub const MAX_DELAY: Duration = Duration::from_secs(8);
}

/// Persisted document names under the data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const LEDGER_FILENAME: &'static str = "unavailable.json";
    pub const DIRECTORY_MAP_FILENAME: &'static str = "directory-map.json";
}

/// Remote services.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
    pub const USER_AGENT: &'static str = concat!("marquee/", env!("CARGO_PKG_VERSION"));
    pub const TMDB_API_BASE: &'static str = "https://api.themoviedb.org/3";
    pub const TMDB_IMAGE_BASE: &'static str = "https://image.tmdb.org/t/p/original";
    /// TMDb allows roughly 40 requests per 10 seconds.
    pub const TMDB_REQUESTS_PER_10S: u32 = 40;
    pub const TMDB_WINDOW: Duration = Duration::from_secs(10);
}

/// Runtime configuration for one library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryConfig {
    /// Movie library roots, in lookup order.
    #[serde(default)]
    pub movie_roots: Vec<PathBuf>,
    /// TV library roots, in lookup order.
    #[serde(default)]
    pub tv_roots: Vec<PathBuf>,
    /// Where the ledger and directory map are persisted.
    pub data_dir: PathBuf,
    #[serde(default = "default_concurrency")]
    pub scan_concurrency: usize,
    #[serde(skip, default)]
    pub retry: RetryConfig,
}

fn default_concurrency() -> usize {
    ScanConfig::DEFAULT_CONCURRENCY
}

impl LibraryConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            movie_roots: Vec::new(),
            tv_roots: Vec::new(),
            data_dir: data_dir.into(),
            scan_concurrency: ScanConfig::DEFAULT_CONCURRENCY,
            retry: RetryConfig::default(),
        }
    }

    /// Platform data directory, e.g. `~/.local/share/marquee`.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(AppConfig::DATA_DIR_NAME))
    }

    pub fn roots(&self, category: MediaCategory) -> &[PathBuf] {
        match category {
            MediaCategory::Movies => &self.movie_roots,
            MediaCategory::Tv => &self.tv_roots,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::LEDGER_FILENAME)
    }

    pub fn directory_map_path(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::DIRECTORY_MAP_FILENAME)
    }

    /// Reject configurations the library cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.movie_roots.is_empty() && self.tv_roots.is_empty() {
            return Err(MarqueeError::Config {
                message: "at least one movie or TV root must be configured".to_string(),
            });
        }
        if self.scan_concurrency == 0 {
            return Err(MarqueeError::Config {
                message: "scan concurrency must be at least 1".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(MarqueeError::Config {
                message: "retry attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `path` sits under one of the roots for `category`.
    pub fn owns(&self, category: MediaCategory, path: &Path) -> bool {
        self.roots(category).iter().any(|root| path.starts_with(root))
    }
}

/// Split a comma separated list of roots, ignoring blanks.
pub fn parse_root_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
