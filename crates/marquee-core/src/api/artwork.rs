//! Artwork search, saving and unavailability marks.

use crate::api::types::{ArtworkSearch, ItemRef};
use crate::catalog::{ArtworkCatalog, CatalogQuery};
use crate::error::{MarqueeError, Result};
use crate::inventory::ArtworkKind;
use crate::ledger::LedgerHealth;
use crate::mutation::{LedgerChange, SaveOutcome};
use crate::MarqueeApi;
use std::sync::Arc;
use tracing::info;

impl MarqueeApi {
    fn catalog(&self) -> Result<&Arc<dyn ArtworkCatalog>> {
        self.catalog.as_ref().ok_or_else(|| MarqueeError::Config {
            message: "No artwork catalog configured".to_string(),
        })
    }

    /// Ask the catalog for `kind` artwork matching the item, largest first.
    pub async fn search_artwork(&self, item: &ItemRef, kind: ArtworkKind) -> Result<ArtworkSearch> {
        let catalog = self.catalog()?;
        let media = self.resolve(item).await?;
        let query = CatalogQuery::for_identity(&media.identity, media.category, kind);
        let candidates = catalog.search_by_title(&query).await?;
        Ok(ArtworkSearch {
            item: media,
            kind,
            catalog: catalog.name().to_string(),
            candidates,
        })
    }

    /// Download `url` through the catalog and save it as the item's `kind` artwork.
    pub async fn download_artwork(
        &self,
        item: &ItemRef,
        kind: ArtworkKind,
        url: &str,
    ) -> Result<SaveOutcome> {
        let catalog = self.catalog()?;
        let media = self.resolve(item).await?;
        let bytes = catalog.fetch_bytes(url).await?;
        info!("Downloaded {} bytes of {} for {}", bytes.len(), kind, media.folder);
        self.artwork
            .save_artwork(&media, kind, bytes, Some(url.to_string()))
            .await
    }

    /// Save caller-supplied image bytes as the item's `kind` artwork.
    pub async fn save_artwork(
        &self,
        item: &ItemRef,
        kind: ArtworkKind,
        bytes: Vec<u8>,
    ) -> Result<SaveOutcome> {
        let media = self.resolve(item).await?;
        self.artwork.save_artwork(&media, kind, bytes, None).await
    }

    pub async fn mark_unavailable(&self, item: &ItemRef, kind: ArtworkKind) -> Result<LedgerChange> {
        let media = self.resolve(item).await?;
        self.artwork.mark_unavailable(&media, kind).await
    }

    pub async fn clear_unavailable(&self, item: &ItemRef, kind: ArtworkKind) -> Result<LedgerChange> {
        let media = self.resolve(item).await?;
        self.artwork.clear_unavailable(&media, kind).await
    }

    pub async fn ledger_health(&self) -> LedgerHealth {
        self.ledger.health().await
    }
}
