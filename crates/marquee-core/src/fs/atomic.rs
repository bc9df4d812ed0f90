//! Atomic JSON persistence for the ledger and directory map.
//!
//! Writes go to a uniquely named temp file in the target directory, are
//! synced, then renamed over the target. Readers therefore see either the
//! previous complete document or the new one, never a torn write.

use crate::error::{MarqueeError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read and parse a JSON document.
///
/// Returns `None` if the file doesn't exist; a document that exists but does
/// not parse is a [`MarqueeError::Json`].
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MarqueeError::io_with_path(e, path)),
    };

    let data = serde_json::from_str(&contents).map_err(|e| MarqueeError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write `data` to `path` atomically, optionally keeping a `.bak` copy of the
/// previous document.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| MarqueeError::io_with_path(e, parent))?;
        }
    }

    let serialized = serde_json::to_string_pretty(data)?;
    let temp_path = temp_sibling(path);

    let written = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(MarqueeError::io_with_path(e, &temp_path));
    }

    if keep_backup && path.exists() {
        let backup_path = with_suffix(path, "bak");
        match fs::copy(path, &backup_path) {
            Ok(_) => debug!("Created backup: {}", backup_path.display()),
            Err(e) => warn!("Failed to create backup {}: {}", backup_path.display(), e),
        }
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(MarqueeError::io_with_path(e, path));
    }

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Move an unreadable document out of the way so the next write does not
/// destroy it. Returns where it went.
pub(crate) fn quarantine(path: &Path) -> Result<PathBuf> {
    let target = with_suffix(path, "corrupt");
    fs::rename(path, &target).map_err(|e| MarqueeError::io_with_path(e, path))?;
    Ok(target)
}

fn temp_sibling(path: &Path) -> PathBuf {
    with_suffix(path, &format!("{}.tmp", uuid::Uuid::new_v4().simple()))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
