//! Request and response types of the public API.

use crate::catalog::CandidateArtwork;
use crate::error::{MarqueeError, Result};
use crate::inventory::{ArtworkKind, MediaCategory, MediaItem, ScanFailure};
use crate::ledger::LedgerHealth;
use crate::reconcile::{ItemStatus, RootTotals, StatusTotals};
use serde::{Deserialize, Serialize};

/// Names a media item the way the presentation layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    pub category: MediaCategory,
    /// Directory base name.
    pub folder: String,
}

impl ItemRef {
    pub fn new(category: MediaCategory, folder: impl Into<String>) -> Self {
        Self {
            category,
            folder: folder.into(),
        }
    }

    /// A folder must be a single path component.
    pub fn validate(&self) -> Result<()> {
        let folder = self.folder.as_str();
        if folder.trim().is_empty()
            || folder == "."
            || folder == ".."
            || folder.contains(['/', '\\', '\0'])
        {
            return Err(MarqueeError::InvalidParams {
                message: format!("Invalid folder name: {:?}", self.folder),
            });
        }
        Ok(())
    }
}

/// Reconciled listing of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListing {
    pub category: MediaCategory,
    pub items: Vec<ItemStatus>,
    pub per_root: Vec<RootTotals>,
    pub totals: StatusTotals,
    /// Roots and directories skipped because of I/O errors.
    pub failures: Vec<ScanFailure>,
    pub ledger_health: LedgerHealth,
}

/// Catalog candidates for one item and kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkSearch {
    pub item: MediaItem,
    pub kind: ArtworkKind,
    pub catalog: String,
    pub candidates: Vec<CandidateArtwork>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_ref_rejects_paths() {
        for folder in ["", "  ", ".", "..", "a/b", "..\\x"] {
            assert!(ItemRef::new(MediaCategory::Movies, folder).validate().is_err(), "{folder}");
        }
        assert!(ItemRef::new(MediaCategory::Tv, "The Office (US) (2005)")
            .validate()
            .is_ok());
    }
}
