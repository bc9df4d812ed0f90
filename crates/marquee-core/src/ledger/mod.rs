//! Unavailability ledger.
//!
//! Records which (item, artwork kind) pairs have been manually asserted to
//! have no artwork available. A key exists only while it is marked; absence
//! means "not decided", not "available".
//!
//! The whole document is held in memory and rewritten through the
//! [`LedgerStore`] after every mutation. Mutations of the same key are
//! serialized; mutations of different keys only share the short in-memory
//! update and the flush, which always writes the newest complete state.

mod store;

pub use store::{
    JsonFileStore, LedgerDocument, LedgerEntries, LedgerStore, MemoryStore, UnavailabilityEntry,
    LEDGER_VERSION,
};

use crate::error::{MarqueeError, Result};
use crate::identity::IdentityKey;
use crate::inventory::ArtworkKind;
use crate::locks::KeyedLocks;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Whether the ledger could be read at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LedgerHealth {
    Healthy,
    /// The stored document could not be used; the ledger started empty.
    Degraded {
        reason: String,
        /// False when mutations are refused to protect an unreadable document.
        writable: bool,
    },
}

impl LedgerHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, LedgerHealth::Healthy)
    }
}

/// Immutable view of the ledger taken at one point in time.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    entries: Arc<LedgerEntries>,
}

impl LedgerSnapshot {
    /// Snapshot marking every given pair unavailable.
    pub fn from_marks(marks: impl IntoIterator<Item = (IdentityKey, ArtworkKind)>) -> Self {
        let mut entries = LedgerEntries::new();
        for (key, kind) in marks {
            entries.entry(key).or_default().insert(
                kind,
                UnavailabilityEntry {
                    unavailable: true,
                    marked_at: None,
                },
            );
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn is_unavailable(&self, key: &IdentityKey, kind: ArtworkKind) -> bool {
        self.entry(key, kind).is_some_and(|e| e.unavailable)
    }

    pub fn entry(&self, key: &IdentityKey, kind: ArtworkKind) -> Option<&UnavailabilityEntry> {
        self.entries.get(key).and_then(|kinds| kinds.get(&kind))
    }

    /// Number of marked (item, kind) pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(|kinds| kinds.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &LedgerEntries {
        &self.entries
    }
}

#[derive(Debug)]
struct LedgerState {
    entries: Arc<LedgerEntries>,
    generation: u64,
    health: LedgerHealth,
}

impl LedgerState {
    fn writable(&self) -> bool {
        match &self.health {
            LedgerHealth::Healthy => true,
            LedgerHealth::Degraded { writable, .. } => *writable,
        }
    }

    fn get(&self, key: &IdentityKey, kind: ArtworkKind) -> Option<UnavailabilityEntry> {
        self.entries.get(key).and_then(|k| k.get(&kind)).cloned()
    }

    fn set(&mut self, key: &IdentityKey, kind: ArtworkKind, value: Option<UnavailabilityEntry>) {
        let entries = Arc::make_mut(&mut self.entries);
        match value {
            Some(entry) => {
                entries.entry(key.clone()).or_default().insert(kind, entry);
            }
            None => {
                if let Some(kinds) = entries.get_mut(key) {
                    kinds.remove(&kind);
                    if kinds.is_empty() {
                        entries.remove(key);
                    }
                }
            }
        }
        self.generation += 1;
    }

    fn document(&self) -> LedgerDocument {
        LedgerDocument {
            version: LEDGER_VERSION,
            entries: (*self.entries).clone(),
        }
    }
}

/// The ledger service.
pub struct UnavailabilityLedger {
    store: Arc<dyn LedgerStore>,
    state: RwLock<LedgerState>,
    /// Generation last written to the store.
    flushed: Mutex<u64>,
    locks: KeyedLocks<(IdentityKey, ArtworkKind)>,
}

impl std::fmt::Debug for UnavailabilityLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnavailabilityLedger")
            .field("store", &self.store.location())
            .finish_non_exhaustive()
    }
}

impl UnavailabilityLedger {
    /// Load the ledger from `store`.
    ///
    /// Never fails. An unparseable document is moved aside and the ledger
    /// starts empty; a document that cannot be read at all leaves the ledger
    /// empty and read-only. Both cases are reported through [`Self::health`].
    pub async fn load(store: Arc<dyn LedgerStore>) -> Self {
        let location = store.location();
        let (entries, health) = match store.load().await {
            Ok(Some(doc)) if doc.version > LEDGER_VERSION => {
                error!(
                    "Ledger {} has unsupported version {}; refusing to modify it",
                    location, doc.version
                );
                (
                    LedgerEntries::new(),
                    LedgerHealth::Degraded {
                        reason: format!("unsupported ledger version {}", doc.version),
                        writable: false,
                    },
                )
            }
            Ok(Some(doc)) => (prune(doc.entries), LedgerHealth::Healthy),
            Ok(None) => (LedgerEntries::new(), LedgerHealth::Healthy),
            Err(e @ MarqueeError::Json { .. }) => {
                error!("Ledger {} is corrupt: {}", location, e);
                match store.quarantine().await {
                    Ok(moved) => {
                        warn!("Moved corrupt ledger to {}", moved);
                        (
                            LedgerEntries::new(),
                            LedgerHealth::Degraded {
                                reason: format!("corrupt ledger moved to {}", moved),
                                writable: true,
                            },
                        )
                    }
                    Err(qe) => (
                        LedgerEntries::new(),
                        LedgerHealth::Degraded {
                            reason: format!("corrupt ledger could not be moved aside: {}", qe),
                            writable: false,
                        },
                    ),
                }
            }
            Err(e) => {
                error!("Ledger {} could not be read: {}", location, e);
                (
                    LedgerEntries::new(),
                    LedgerHealth::Degraded {
                        reason: format!("ledger unreadable: {}", e),
                        writable: false,
                    },
                )
            }
        };

        let count: usize = entries.values().map(|k| k.len()).sum();
        info!("Loaded {} unavailability entries from {}", count, location);

        Self {
            store,
            state: RwLock::new(LedgerState {
                entries: Arc::new(entries),
                generation: 0,
                health,
            }),
            flushed: Mutex::new(0),
            locks: KeyedLocks::new(),
        }
    }

    pub async fn is_unavailable(&self, key: &IdentityKey, kind: ArtworkKind) -> bool {
        self.state
            .read()
            .await
            .get(key, kind)
            .is_some_and(|e| e.unavailable)
    }

    /// Mark (key, kind) unavailable. Returns `false` when it already was.
    pub async fn mark(&self, key: &IdentityKey, kind: ArtworkKind) -> Result<bool> {
        self.update(key, kind, Some(UnavailabilityEntry::marked_now()))
            .await
    }

    /// Retract a mark. Returns `false` when there was none.
    pub async fn clear(&self, key: &IdentityKey, kind: ArtworkKind) -> Result<bool> {
        self.update(key, kind, None).await
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            entries: self.state.read().await.entries.clone(),
        }
    }

    pub async fn health(&self) -> LedgerHealth {
        self.state.read().await.health.clone()
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    async fn update(
        &self,
        key: &IdentityKey,
        kind: ArtworkKind,
        value: Option<UnavailabilityEntry>,
    ) -> Result<bool> {
        let _guard = self.locks.lock((key.clone(), kind)).await;

        let (previous, generation) = {
            let mut state = self.state.write().await;
            if !state.writable() {
                return Err(MarqueeError::Ledger {
                    message: format!("ledger {} is read-only", self.store.location()),
                });
            }
            let previous = state.get(key, kind);
            if previous.is_some() == value.is_some() {
                return Ok(false);
            }
            state.set(key, kind, value);
            (previous, state.generation)
        };

        // Flushes run one at a time and each writes the newest state, so a
        // later generation already on disk covers this one.
        let mut flushed = self.flushed.lock().await;
        if *flushed < generation {
            let (document, current) = {
                let state = self.state.read().await;
                (state.document(), state.generation)
            };
            if let Err(e) = self.store.persist(document).await {
                warn!(key = %key, kind = %kind, "Ledger write failed, reverting: {}", e);
                // Reverted before the flush lock is released, so no later
                // flush can write the failed change.
                self.state.write().await.set(key, kind, previous);
                return Err(e);
            }
            *flushed = current;
        }
        drop(flushed);

        debug!(key = %key, kind = %kind, "Ledger updated");
        Ok(true)
    }
}

/// Drop entries that do not assert unavailability.
fn prune(mut entries: LedgerEntries) -> LedgerEntries {
    for kinds in entries.values_mut() {
        kinds.retain(|_, entry| entry.unavailable);
    }
    entries.retain(|_, kinds| !kinds.is_empty());
    entries
}
