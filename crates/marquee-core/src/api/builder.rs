//! Builder for configuring MarqueeApi initialization.

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::ArtworkCatalog;
use crate::config::LibraryConfig;
use crate::error::{MarqueeError, Result};
use crate::fs::{FsBackend, LocalFs, ResilientFs, RetryConfig};
use crate::inventory::InventoryScanner;
use crate::ledger::{JsonFileStore, LedgerStore, UnavailabilityLedger};
use crate::mapping::DirectoryMap;
use crate::mutation::ArtworkService;
use crate::notify::ArtworkNotifier;
use crate::MarqueeApi;

/// Builder for configuring MarqueeApi initialization.
///
/// # Example
///
/// ```rust,ignore
/// use marquee_library::{LibraryConfig, MarqueeApi};
///
/// let api = MarqueeApi::builder(LibraryConfig::new("./marquee-data"))
///     .movie_root("/mnt/media/movies")
///     .tv_root("/mnt/media/tv")
///     .build()
///     .await?;
/// ```
pub struct MarqueeApiBuilder {
    config: LibraryConfig,
    auto_create_dirs: bool,
    backend: Option<Arc<dyn FsBackend>>,
    ledger_store: Option<Arc<dyn LedgerStore>>,
    catalog: Option<Arc<dyn ArtworkCatalog>>,
    notifier: Option<Arc<dyn ArtworkNotifier>>,
}

impl MarqueeApiBuilder {
    pub fn new(config: LibraryConfig) -> Self {
        Self {
            config,
            auto_create_dirs: true,
            backend: None,
            ledger_store: None,
            catalog: None,
            notifier: None,
        }
    }

    /// Append a movie library root.
    pub fn movie_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.movie_roots.push(root.into());
        self
    }

    /// Append a TV library root.
    pub fn tv_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.tv_roots.push(root.into());
        self
    }

    /// Create the data directory if it does not exist.
    ///
    /// Default: `true`
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    pub fn scan_concurrency(mut self, concurrency: usize) -> Self {
        self.config.scan_concurrency = concurrency;
        self
    }

    /// Retry policy for every filesystem call on the media roots.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Replace the filesystem primitives (used for fault injection in tests).
    pub fn with_fs_backend(mut self, backend: Arc<dyn FsBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the ledger's storage. Defaults to a JSON document in the data directory.
    pub fn with_ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger_store = Some(store);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ArtworkCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ArtworkNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the MarqueeApi instance.
    pub async fn build(self) -> Result<MarqueeApi> {
        let config = self.config;
        config.validate()?;

        if !config.data_dir.exists() {
            if !self.auto_create_dirs {
                return Err(MarqueeError::Config {
                    message: format!("Data directory does not exist: {}", config.data_dir.display()),
                });
            }
            std::fs::create_dir_all(&config.data_dir).map_err(|e| MarqueeError::Io {
                message: format!("Failed to create data directory: {}", config.data_dir.display()),
                path: Some(config.data_dir.clone()),
                source: Some(e),
            })?;
        }

        let backend = self.backend.unwrap_or_else(|| Arc::new(LocalFs));
        let fs = ResilientFs::new(backend, config.retry.clone());
        let scanner = InventoryScanner::new(fs, config.scan_concurrency);

        let store = self
            .ledger_store
            .unwrap_or_else(|| Arc::new(JsonFileStore::new(config.ledger_path())));
        let ledger = Arc::new(UnavailabilityLedger::load(store).await);

        let directory_map = Arc::new(DirectoryMap::new(config.directory_map_path()));
        if let Err(e) = directory_map.load().await {
            tracing::warn!("Directory map unavailable, starting empty: {}", e);
        }

        let artwork = ArtworkService::new(scanner.clone(), ledger.clone(), self.notifier);

        tracing::info!(
            "Marquee ready: {} movie roots, {} TV roots, data in {}",
            config.movie_roots.len(),
            config.tv_roots.len(),
            config.data_dir.display()
        );

        Ok(MarqueeApi {
            config,
            scanner,
            ledger,
            directory_map,
            artwork,
            catalog: self.catalog,
        })
    }
}
