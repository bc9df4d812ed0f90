//! Resilient access to media mounts.
//!
//! This module provides:
//! - The raw [`FsBackend`] seam and its [`LocalFs`] implementation
//! - Exponential backoff with jitter for transient mount errors
//! - [`ResilientFs`], the only way the rest of the crate touches media roots
//! - Atomic JSON persistence for the library's own documents

mod accessor;
mod atomic;
mod backend;
mod retry;

pub use accessor::{ImageProbe, ResilientFs};
pub(crate) use atomic::quarantine;
pub use atomic::{atomic_read_json, atomic_write_json};
pub use backend::{is_transient, Dimensions, DirEntryInfo, FileStat, FsBackend, LocalFs};
pub use retry::{retry_async, RetryConfig, RetryStats};
