//! Directory mapping.
//!
//! Remembers where each identity was last seen on disk so an item can be
//! located again without searching every root. Entries are hints only:
//! they are refreshed by each scan and never removed when a directory
//! disappears, so callers must check that a hinted path still exists.

use crate::error::{MarqueeError, Result};
use crate::fs::{atomic_read_json, atomic_write_json, quarantine};
use crate::identity::IdentityKey;
use crate::inventory::{MediaCategory, MediaItem, ScannedItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Last known location of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub category: MediaCategory,
    pub folder: String,
    pub path: PathBuf,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MapData {
    #[serde(default)]
    entries: BTreeMap<IdentityKey, MappingEntry>,
}

/// Persisted identity -> directory hints.
#[derive(Debug)]
pub struct DirectoryMap {
    map_path: PathBuf,
    data: Arc<RwLock<MapData>>,
    write_lock: Mutex<()>,
}

impl DirectoryMap {
    pub fn new(map_path: impl Into<PathBuf>) -> Self {
        Self {
            map_path: map_path.into(),
            data: Arc::new(RwLock::new(MapData::default())),
            write_lock: Mutex::new(()),
        }
    }

    /// Load hints from disk. A damaged document is set aside and the map
    /// starts empty; it is rebuilt by the next scan.
    pub async fn load(&self) -> Result<()> {
        let path = self.map_path.clone();
        let loaded = tokio::task::spawn_blocking(move || atomic_read_json::<MapData>(&path))
            .await
            .map_err(|e| MarqueeError::Other(format!("directory map load task failed: {}", e)))?;

        match loaded {
            Ok(Some(data)) => {
                debug!("Loaded {} directory hints", data.entries.len());
                *self.data.write().await = data;
            }
            Ok(None) => {}
            Err(MarqueeError::Json { message, .. }) => {
                warn!("Discarding unreadable directory map: {}", message);
                let path = self.map_path.clone();
                match tokio::task::spawn_blocking(move || quarantine(&path)).await {
                    Ok(Ok(moved)) => debug!("Moved directory map to {}", moved.display()),
                    Ok(Err(e)) => warn!("Could not move directory map aside: {}", e),
                    Err(e) => warn!("Directory map quarantine task failed: {}", e),
                }
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let data = self.data.read().await.clone();
        let path = self.map_path.clone();
        tokio::task::spawn_blocking(move || atomic_write_json(&path, &data, false))
            .await
            .map_err(|e| MarqueeError::Other(format!("directory map write task failed: {}", e)))?
    }

    /// Fold a scan's items into the map. Returns how many hints changed;
    /// the document is only rewritten when that is non-zero.
    ///
    /// When several folders share one identity the existing hint is kept if
    /// it names any of them; otherwise the first folder in scan order wins.
    pub async fn record_scan(&self, items: &[ScannedItem]) -> Result<usize> {
        let mut groups: BTreeMap<&IdentityKey, Vec<&MediaItem>> = BTreeMap::new();
        for scanned in items {
            groups.entry(&scanned.item.key).or_default().push(&scanned.item);
        }

        let now = Utc::now();
        let mut changed = 0;
        {
            let mut data = self.data.write().await;
            for (key, candidates) in groups {
                if candidates.len() > 1 {
                    debug!(key = %key, "{} folders share one identity", candidates.len());
                }
                if let Some(existing) = data
                    .entries
                    .get_mut(key)
                    .filter(|e| candidates.iter().any(|c| c.path == e.path))
                {
                    existing.last_seen = now;
                    continue;
                }

                let item = candidates[0];
                data.entries.insert(
                    key.clone(),
                    MappingEntry {
                        category: item.category,
                        folder: item.folder.clone(),
                        path: item.path.clone(),
                        last_seen: now,
                    },
                );
                changed += 1;
            }
        }

        if changed > 0 {
            self.save().await?;
            debug!("Updated {} directory hints", changed);
        }
        Ok(changed)
    }

    /// Last known location for `key`, if any. May be stale.
    pub async fn hint(&self, key: &IdentityKey) -> Option<MappingEntry> {
        self.data.read().await.entries.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
