//! Marquee Core - Headless library for tracking artwork across media libraries.
//!
//! Media directories named `Title (Year) {tmdb-ID}` are scanned for poster,
//! logo and backdrop images. Each artwork slot is reconciled against a
//! ledger of slots known to have no artwork anywhere, giving a
//! GREEN / YELLOW / RED status per slot plus per-root totals. The crate can
//! be used programmatically without any HTTP/RPC layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use marquee_library::{ArtworkKind, ItemRef, LibraryConfig, MarqueeApi, MediaCategory};
//!
//! #[tokio::main]
//! async fn main() -> marquee_library::Result<()> {
//!     let api = MarqueeApi::builder(LibraryConfig::new("/var/lib/marquee"))
//!         .movie_root("/mnt/media/movies")
//!         .build()
//!         .await?;
//!
//!     let listing = api.list_items(MediaCategory::Movies).await?;
//!     println!("{} of {} items complete", listing.totals.complete_items, listing.totals.items);
//!
//!     let item = ItemRef::new(MediaCategory::Movies, "Heat (1995)");
//!     api.mark_unavailable(&item, ArtworkKind::Logo).await?;
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fs;
pub mod identity;
pub mod inventory;
pub mod ledger;
pub mod locks;
pub mod mapping;
pub mod mutation;
pub mod notify;
pub mod reconcile;

mod api;

use std::path::Path;
use std::sync::Arc;

// Re-export commonly used types
pub use api::{ArtworkSearch, ItemListing, ItemRef, MarqueeApiBuilder};
pub use cancel::{CancellationToken, CancelledError};
pub use catalog::{ArtworkCatalog, CandidateArtwork, CatalogQuery, TmdbCatalog};
pub use config::LibraryConfig;
pub use error::{MarqueeError, Result};
pub use fs::{FsBackend, LocalFs, ResilientFs, RetryConfig};
pub use identity::{parse_directory_name, CatalogId, IdentityKey, MediaIdentity, ParseWarning, ParsedName};
pub use inventory::{
    ArtworkKind, ArtworkRecord, InventoryScanner, MediaCategory, MediaItem, ScanFailure, ScanReport,
    ScannedItem,
};
pub use ledger::{
    JsonFileStore, LedgerHealth, LedgerSnapshot, LedgerStore, MemoryStore, UnavailabilityLedger,
};
pub use mapping::DirectoryMap;
pub use mutation::{ArtworkService, LedgerChange, SaveOutcome};
pub use notify::{ArtworkNotifier, ArtworkSavedEvent, SlackWebhookNotifier};
pub use reconcile::{ArtworkStatus, ItemStatus, Reconciliation, RootTotals, StatusTotals};

/// Main API for Marquee Core.
///
/// Holds the scanner, the unavailability ledger and the mutation service
/// for one set of library roots. All methods take `&self`; wrap it in an
/// `Arc` to share it between tasks.
pub struct MarqueeApi {
    config: LibraryConfig,
    scanner: InventoryScanner,
    ledger: Arc<UnavailabilityLedger>,
    directory_map: Arc<DirectoryMap>,
    artwork: ArtworkService,
    catalog: Option<Arc<dyn ArtworkCatalog>>,
}

impl std::fmt::Debug for MarqueeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarqueeApi")
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .field("has_catalog", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}

impl MarqueeApi {
    /// Create a builder for configuring the API.
    pub fn builder(config: LibraryConfig) -> MarqueeApiBuilder {
        MarqueeApiBuilder::new(config)
    }

    /// Create an API with default collaborators: local filesystem, JSON
    /// ledger in the data directory, no catalog and no notifier.
    pub async fn new(config: LibraryConfig) -> Result<Self> {
        MarqueeApiBuilder::new(config).build().await
    }

    /// Directory holding the ledger and the directory map.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }
}
