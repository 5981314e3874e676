//! Ledger persistence (`~/.tutor-confirm/ledger.json`)
//!
//! The ledger is written as one JSON document at the end of every run and
//! read back at the start of the next. Loading never fails: a missing file
//! starts an empty ledger, and an unreadable one is logged and replaced.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::ledger::Ledger;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateFile {
    version: u32,
    ledger: Ledger,
}

/// Default ledger location (~/.tutor-confirm/ledger.json)
pub fn default_state_path() -> PathBuf {
    crate::config::state_dir().join("ledger.json")
}

/// Load the ledger, falling back to an empty one.
pub fn load_ledger(path: &Path) -> Ledger {
    if !path.exists() {
        log::info!("No ledger at {}, starting empty", path.display());
        return Ledger::new();
    }

    match read_ledger(path) {
        Ok(mut ledger) => {
            let dropped = ledger.retain_valid();
            if dropped > 0 {
                log::warn!("Dropped {} malformed appointments from {}", dropped, path.display());
            }
            let merged = ledger.dedup_keys();
            if merged > 0 {
                log::warn!("Merged {} duplicate appointments from {}", merged, path.display());
            }
            log::info!("Loaded {} appointments from {}", ledger.len(), path.display());
            ledger
        }
        Err(e) => {
            log::warn!(
                "Failed to read ledger at {}: {}. Starting empty.",
                path.display(),
                e
            );
            Ledger::new()
        }
    }
}

fn read_ledger(path: &Path) -> Result<Ledger, ScheduleError> {
    let content = fs::read_to_string(path)?;
    let state: StateFile = serde_json::from_str(&content)?;
    if state.version != STATE_VERSION {
        log::warn!(
            "Ledger version {} differs from {}, reading anyway",
            state.version,
            STATE_VERSION
        );
    }
    Ok(state.ledger)
}

/// Write the ledger atomically: temp file in the same directory, then rename.
pub fn save_ledger(ledger: &Ledger, path: &Path) -> Result<(), ScheduleError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.exists() {
        fs::create_dir_all(&parent)?;
    }

    let state = StateFile {
        version: STATE_VERSION,
        ledger: ledger.clone(),
    };
    let content = serde_json::to_string_pretty(&state)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;

    log::debug!("Saved {} appointments to {}", ledger.len(), path.display());
    Ok(())
}
