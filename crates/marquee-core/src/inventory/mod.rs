//! Artwork inventory of the media library.
//!
//! Inventory is derived fresh from the filesystem on every scan and never
//! cached between requests.

mod scanner;
mod types;

pub use scanner::{describe_item, InventoryScanner};
pub use types::{
    ArtworkKind, ArtworkRecord, MediaCategory, MediaItem, ScanFailure, ScanReport, ScannedItem,
};
