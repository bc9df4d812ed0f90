//! API implementation submodules.
//!
//! Each submodule contains `impl MarqueeApi` blocks that extend the public API
//! with domain-specific methods. The struct definition remains in `lib.rs`.

mod artwork;
mod builder;
mod items;
mod types;

pub use builder::MarqueeApiBuilder;
pub use types::{ArtworkSearch, ItemListing, ItemRef};
