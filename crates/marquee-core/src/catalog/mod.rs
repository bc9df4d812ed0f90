//! Remote artwork catalogs.
//!
//! The library only needs two things from a catalog: candidate artwork for a
//! title, and the bytes behind a candidate URL. [`TmdbCatalog`] is the
//! bundled implementation.

mod tmdb;

pub use tmdb::TmdbCatalog;

use crate::error::Result;
use crate::identity::{CatalogId, MediaIdentity};
use crate::inventory::{ArtworkKind, MediaCategory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What to look for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogQuery {
    /// Normalized title.
    pub title: String,
    pub year: Option<u16>,
    pub category: MediaCategory,
    pub kind: ArtworkKind,
    /// Lets a catalog skip the title search when it owns the id.
    pub catalog_id: Option<CatalogId>,
}

impl CatalogQuery {
    pub fn for_identity(identity: &MediaIdentity, category: MediaCategory, kind: ArtworkKind) -> Self {
        Self {
            title: identity.search_title(),
            year: identity.year,
            category,
            kind,
            catalog_id: identity.catalog_id.clone(),
        }
    }
}

/// A piece of artwork offered by a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateArtwork {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// ISO 639-1 code; `None` for artwork without text.
    pub language: Option<String>,
    pub vote_average: Option<f64>,
}

impl CandidateArtwork {
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// `WxH`.
    pub fn size_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Order candidates by resolution, largest first. Ties keep catalog order.
pub fn sort_by_resolution(candidates: &mut [CandidateArtwork]) {
    candidates.sort_by(|a, b| b.pixels().cmp(&a.pixels()));
}

#[async_trait]
pub trait ArtworkCatalog: Send + Sync {
    /// Candidates for the query, largest first. An unknown title yields an
    /// empty list, not an error.
    async fn search_by_title(&self, query: &CatalogQuery) -> Result<Vec<CandidateArtwork>>;

    /// Download the image behind a candidate URL.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(width: u32, height: u32, url: &str) -> CandidateArtwork {
        CandidateArtwork {
            url: url.to_string(),
            width,
            height,
            language: None,
            vote_average: None,
        }
    }

    #[test]
    fn test_sort_by_resolution_is_stable() {
        let mut candidates = vec![
            candidate(1280, 720, "a"),
            candidate(3840, 2160, "b"),
            candidate(720, 1280, "c"),
        ];
        sort_by_resolution(&mut candidates);
        let urls: Vec<_> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["b", "a", "c"]);
        assert_eq!(candidates[0].size_label(), "3840x2160");
    }

    #[test]
    fn test_query_uses_normalized_title() {
        let identity =
            crate::identity::parse_directory_name("Ocean's Eleven (2001) {tmdb-161}").identity;
        let query = CatalogQuery::for_identity(&identity, MediaCategory::Movies, ArtworkKind::Logo);
        assert_eq!(query.title, "oceans eleven");
        assert_eq!(query.year, Some(2001));
        assert_eq!(query.catalog_id.unwrap().id, "161");
    }
}
