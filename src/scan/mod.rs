//! Recording discovery.
//!
//! Walks the configured sources and produces the ordered, deduplicated
//! queue of items that still need processing. Sources are scanned in a
//! fixed priority order — structured recordings first, then media
//! imports, then plain transcripts — and entries within a source are
//! sorted by file name so the queue is deterministic.
//!
//! A source directory that is missing or unreadable contributes zero
//! items; it never aborts the scan of the other sources.

use crate::config::Sources;
use crate::state::ProcessedSetStore;
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Audio/video containers accepted from the import source.
pub const AUDIO_VIDEO_EXTENSIONS: &[&str] = &[
    "mp3", "mp4", "wav", "m4a", "webm", "mov", "avi", "mkv", "flac", "ogg",
];

/// File types accepted from the plain-transcript source. Content is not
/// parsed here — that is the external command's job.
pub const TRANSCRIPT_EXTENSIONS: &[&str] = &["txt", "md", "json"];

const TRANSCRIPTS_FILE: &str = "transcripts.json";
const METADATA_FILE: &str = "metadata.json";
const STATUS_COMPLETED: &str = "completed";

/// Which source a queue item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Subdirectory of the structured source (one folder per recording).
    Recording,
    /// Loose audio/video file from the import source.
    MediaImport,
    /// Loose transcript file from the alternate source.
    Transcript,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recording => "recording",
            Self::MediaImport => "media import",
            Self::Transcript => "transcript",
        }
    }
}

/// One discovered, not-yet-processed item. Immutable; only its
/// `source_path` outlives the run (persisted as "processed" on success).
#[derive(Debug, Clone)]
pub struct PendingItem {
    /// Absolute path — the dedup key and processed-set identifier.
    pub source_path: PathBuf,
    pub display_name: String,
    /// Creation time of the underlying entry, informational only.
    pub discovered_at: Option<DateTime<Local>>,
    pub kind: SourceKind,
}

impl PendingItem {
    fn new(source_path: PathBuf, kind: SourceKind) -> Self {
        let display_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source_path.to_string_lossy().to_string());
        let discovered_at = std::fs::metadata(&source_path)
            .and_then(|m| m.created())
            .ok()
            .map(DateTime::<Local>::from);

        Self {
            source_path,
            display_name,
            discovered_at,
            kind,
        }
    }
}

/// Structured-source status marker (`metadata.json`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecordingMetadata {
    status: Option<String>,
}

/// Scan every configured source and return the queue in fixed priority
/// order, already-processed items excluded.
pub fn scan_all(sources: &Sources, processed: &ProcessedSetStore) -> Vec<PendingItem> {
    let mut queue = Vec::new();
    let mut seen: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();

    let mut push = |item: PendingItem, queue: &mut Vec<PendingItem>| {
        if processed.contains(&item.source_path) {
            debug!("Already processed, skipping: {:?}", item.source_path);
            return;
        }
        if !seen.insert(item.source_path.clone()) {
            return;
        }
        queue.push(item);
    };

    for item in scan_structured(&sources.transcript_dir) {
        push(item, &mut queue);
    }
    for item in scan_imports(&sources.import_dir) {
        push(item, &mut queue);
    }
    if let Some(alt_dir) = &sources.alt_transcript_dir {
        for item in scan_transcripts(alt_dir) {
            push(item, &mut queue);
        }
    }

    queue
}

/// Structured source: every immediate subdirectory with both marker
/// files and a `completed` status is one recording. Anything else is
/// just not ready yet.
pub fn scan_structured(dir: &Path) -> Vec<PendingItem> {
    sorted_entries(dir)
        .into_iter()
        .filter(|path| path.is_dir())
        .filter(|path| is_completed_recording(path))
        .map(|path| PendingItem::new(path, SourceKind::Recording))
        .collect()
}

/// Import source: loose files with an allow-listed audio/video
/// extension (case-insensitive).
pub fn scan_imports(dir: &Path) -> Vec<PendingItem> {
    sorted_entries(dir)
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| has_extension_in(path, AUDIO_VIDEO_EXTENSIONS))
        .map(|path| PendingItem::new(path, SourceKind::MediaImport))
        .collect()
}

/// Plain-transcript source: loose txt/md/json files.
pub fn scan_transcripts(dir: &Path) -> Vec<PendingItem> {
    sorted_entries(dir)
        .into_iter()
        .filter(|path| path.is_file())
        .filter(|path| has_extension_in(path, TRANSCRIPT_EXTENSIONS))
        .map(|path| PendingItem::new(path, SourceKind::Transcript))
        .collect()
}

/// Build a queue item for an explicitly-given path (single-file mode).
/// The path must exist; the kind is inferred from its shape.
pub fn single_item(path: &Path) -> anyhow::Result<PendingItem> {
    let path = std::fs::canonicalize(path)
        .map_err(|e| anyhow::anyhow!("Cannot process {:?}: {}", path, e))?;
    let kind = if path.is_dir() {
        SourceKind::Recording
    } else if has_extension_in(&path, AUDIO_VIDEO_EXTENSIONS) {
        SourceKind::MediaImport
    } else {
        SourceKind::Transcript
    };
    Ok(PendingItem::new(path, kind))
}

/// Both marker files present and `metadata.json` reports `completed`.
fn is_completed_recording(dir: &Path) -> bool {
    let transcripts = dir.join(TRANSCRIPTS_FILE);
    let metadata_path = dir.join(METADATA_FILE);
    if !transcripts.exists() || !metadata_path.exists() {
        return false;
    }

    let content = match std::fs::read_to_string(&metadata_path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Unreadable {:?}: {}", metadata_path, e);
            return false;
        }
    };
    match serde_json::from_str::<RecordingMetadata>(&content) {
        Ok(metadata) => metadata.status.as_deref() == Some(STATUS_COMPLETED),
        Err(e) => {
            warn!("Unparsable {:?}: {}", metadata_path, e);
            false
        }
    }
}

fn has_extension_in(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .map(|e| allowed.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Immediate entries of `dir`, sorted by file name. Missing or
/// unreadable directories yield nothing.
fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) => {
            debug!("Source unavailable, skipping {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut entries: Vec<PathBuf> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
    entries
}
