//! Listing and lookup of media items.

use crate::api::types::{ItemListing, ItemRef};
use crate::cancel::CancellationToken;
use crate::config::LibraryConfig;
use crate::error::{MarqueeError, Result};
use crate::identity::parse_directory_name;
use crate::inventory::{describe_item, MediaCategory, MediaItem, ScannedItem};
use crate::reconcile::{item_status, reconcile_report, ItemStatus};
use crate::MarqueeApi;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

impl MarqueeApi {
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn roots(&self, category: MediaCategory) -> &[PathBuf] {
        self.config.roots(category)
    }

    /// Scan every root of `category` and reconcile it against the ledger.
    ///
    /// Unreadable roots and directories are reported in
    /// [`ItemListing::failures`]; the call itself only fails when cancelled.
    pub async fn list_items(&self, category: MediaCategory) -> Result<ItemListing> {
        self.list_items_with_cancel(category, &CancellationToken::new())
            .await
    }

    pub async fn list_items_with_cancel(
        &self,
        category: MediaCategory,
        cancel: &CancellationToken,
    ) -> Result<ItemListing> {
        // Marks made during the scan appear on the next listing.
        let snapshot = self.ledger.snapshot().await;
        let report = self
            .scanner
            .scan(category, self.config.roots(category), cancel)
            .await?;

        if let Err(e) = self.directory_map.record_scan(&report.items).await {
            warn!("Failed to update directory map: {}", e);
        }

        let reconciled = reconcile_report(&report, &snapshot);
        debug!(
            "{} listing: {} items, {:.1}% of artwork slots filled",
            category,
            reconciled.totals.items,
            reconciled.totals.completion() * 100.0
        );
        Ok(ItemListing {
            category,
            items: reconciled.items,
            per_root: reconciled.per_root,
            totals: reconciled.totals,
            failures: report.failures,
            ledger_health: self.ledger.health().await,
        })
    }

    /// Current status of a single item, without scanning its siblings.
    pub async fn item_status(&self, item: &ItemRef) -> Result<ItemStatus> {
        let media = self.resolve(item).await?;
        let scanned: ScannedItem = self
            .scanner
            .scan_item(media.category, &media.root, &media.path)
            .await?;
        let snapshot = self.ledger.snapshot().await;
        Ok(item_status(&scanned, &snapshot))
    }

    /// Locate the directory named by `item`.
    ///
    /// The directory map is consulted first, so an item whose folder was
    /// renamed since the last scan is still found. Every candidate must
    /// live under a configured root of the right category and still be a
    /// directory.
    pub async fn resolve(&self, item: &ItemRef) -> Result<MediaItem> {
        item.validate()?;
        let category = item.category;
        let key = parse_directory_name(&item.folder).identity.key();
        let hint = self
            .directory_map
            .hint(&key)
            .await
            .filter(|h| h.category == category);

        if let Some(hint) = hint.as_ref().filter(|h| h.folder == item.folder) {
            if let Some(found) = self.accept(category, &hint.path).await? {
                return Ok(found);
            }
        }

        for root in self.config.roots(category) {
            let path = root.join(&item.folder);
            if let Some(found) = self.accept(category, &path).await? {
                return Ok(found);
            }
        }

        if let Some(hint) = hint.filter(|h| h.folder != item.folder) {
            if let Some(found) = self.accept(category, &hint.path).await? {
                debug!(
                    "Resolved {} through directory map to {}",
                    item.folder,
                    hint.path.display()
                );
                return Ok(found);
            }
        }

        Err(MarqueeError::ItemNotFound {
            category: category.to_string(),
            folder: item.folder.clone(),
        })
    }

    async fn accept(&self, category: MediaCategory, path: &Path) -> Result<Option<MediaItem>> {
        let Some(root) = self
            .config
            .roots(category)
            .iter()
            .find(|root| path.starts_with(root))
        else {
            return Ok(None);
        };
        if !self.scanner.fs().is_directory(path).await? {
            return Ok(None);
        }
        Ok(Some(describe_item(category, root, path)))
    }
}
