//! Durable storage behind the unavailability ledger.

use crate::error::{MarqueeError, Result};
use crate::fs::{atomic_read_json, atomic_write_json, quarantine};
use crate::identity::IdentityKey;
use crate::inventory::ArtworkKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Current on-disk document version.
pub const LEDGER_VERSION: u32 = 1;

/// A manual "no such artwork exists" assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailabilityEntry {
    pub unavailable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marked_at: Option<DateTime<Utc>>,
}

impl UnavailabilityEntry {
    pub fn marked_now() -> Self {
        Self {
            unavailable: true,
            marked_at: Some(Utc::now()),
        }
    }
}

/// identity key -> artwork kind -> entry
pub type LedgerEntries = BTreeMap<IdentityKey, BTreeMap<ArtworkKind, UnavailabilityEntry>>;

/// Persisted ledger document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub entries: LedgerEntries,
}

fn default_version() -> u32 {
    LEDGER_VERSION
}

impl Default for LedgerDocument {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            entries: LedgerEntries::new(),
        }
    }
}

/// Backend the ledger reads at startup and rewrites in full on mutation.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// `Ok(None)` when nothing has been persisted yet. A document that exists
    /// but cannot be parsed is a [`MarqueeError::Json`].
    async fn load(&self) -> Result<Option<LedgerDocument>>;

    /// Replace the stored document. Readers must see either the previous or
    /// the new document in full.
    async fn persist(&self, document: LedgerDocument) -> Result<()>;

    /// Move an unparseable document aside so it is not overwritten.
    /// Returns a description of where it went.
    async fn quarantine(&self) -> Result<String>;

    /// Human readable location for logs and health reports.
    fn location(&self) -> String;
}

/// JSON document on the local filesystem, written with temp-file + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    keep_backup: bool,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: true,
        }
    }

    /// Keep (or stop keeping) a `.bak` copy of the previous document.
    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    async fn load(&self) -> Result<Option<LedgerDocument>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_read_json::<LedgerDocument>(&path))
            .await
            .map_err(|e| MarqueeError::Ledger {
                message: format!("ledger load task failed: {}", e),
            })?
    }

    async fn persist(&self, document: LedgerDocument) -> Result<()> {
        let path = self.path.clone();
        let keep_backup = self.keep_backup;
        tokio::task::spawn_blocking(move || atomic_write_json(&path, &document, keep_backup))
            .await
            .map_err(|e| MarqueeError::Ledger {
                message: format!("ledger write task failed: {}", e),
            })?
    }

    async fn quarantine(&self) -> Result<String> {
        let path = self.path.clone();
        let moved = tokio::task::spawn_blocking(move || quarantine(&path))
            .await
            .map_err(|e| MarqueeError::Ledger {
                message: format!("ledger quarantine task failed: {}", e),
            })??;
        Ok(moved.display().to_string())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store for tests and embedders that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<LedgerDocument>>,
    corrupt: AtomicBool,
    fail_persist: AtomicBool,
    persists: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: LedgerDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// A store whose document loads as unparseable.
    pub fn corrupt() -> Self {
        let store = Self::default();
        store.corrupt.store(true, Ordering::SeqCst);
        store
    }

    /// Make subsequent `persist` calls fail (or succeed again).
    pub fn fail_persists(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub async fn document(&self) -> Option<LedgerDocument> {
        self.document.lock().await.clone()
    }

    /// Number of successful persists.
    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load(&self) -> Result<Option<LedgerDocument>> {
        if self.corrupt.load(Ordering::SeqCst) {
            return Err(MarqueeError::Json {
                message: "in-memory ledger marked corrupt".to_string(),
                source: None,
            });
        }
        Ok(self.document.lock().await.clone())
    }

    async fn persist(&self, document: LedgerDocument) -> Result<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(MarqueeError::Io {
                message: "simulated write failure".to_string(),
                path: None,
                source: None,
            });
        }
        *self.document.lock().await = Some(document);
        self.persists.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn quarantine(&self) -> Result<String> {
        self.corrupt.store(false, Ordering::SeqCst);
        *self.document.lock().await = None;
        Ok("memory (discarded)".to_string())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
