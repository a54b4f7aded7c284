//! Processed-set persistence.
//!
//! A JSON array of absolute path strings, kept in the user's home
//! directory. Loaded once before scanning; rewritten after every
//! successful item. Loading fails soft — a missing or corrupt file is an
//! empty set, never a user-visible error. Losing a write is worse (it
//! risks reprocessing), so writes retry once before surfacing.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct ProcessedSetStore {
    path: PathBuf,
    entries: BTreeSet<String>,
}

impl ProcessedSetStore {
    /// Load the set from `path`. Missing or unparsable files yield an
    /// empty set.
    pub fn load(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    warn!("Ignoring unparsable processed-set file {:?}: {}", path, e);
                    BTreeSet::new()
                }
            },
            Err(_) => {
                debug!("No processed-set file at {:?}, starting empty", path);
                BTreeSet::new()
            }
        };

        Self { path, entries }
    }

    pub fn contains(&self, id: &Path) -> bool {
        self.entries.contains(&id.to_string_lossy().to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Record `id` as processed and persist the whole set.
    ///
    /// The in-memory insert always happens; the write retries once on
    /// failure so a transient error does not silently lose dedup state.
    pub fn mark_processed(&mut self, id: &Path) -> Result<()> {
        self.entries.insert(id.to_string_lossy().to_string());

        if let Err(first) = self.persist() {
            warn!("Failed to write processed set, retrying once: {}", first);
            self.persist()
                .with_context(|| format!("Failed to write processed set to {:?}", self.path))?;
        }
        Ok(())
    }

    /// Remove one entry (the `state forget` subcommand).
    pub fn forget(&mut self, id: &Path) -> Result<bool> {
        let removed = self.entries.remove(&id.to_string_lossy().to_string());
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Drop every entry (the `state clear` subcommand).
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }

    /// Write the set atomically: temp file in the same directory, then
    /// rename over the target.
    fn persist(&self) -> Result<()> {
        let list: Vec<&str> = self.entries.iter().map(String::as_str).collect();
        let content = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}
