//! Source directory resolution.
//!
//! Reads `.env`-style `KEY=value` overrides from the working directory
//! (process environment wins over the file), expands a leading `~`, and
//! falls back to documented defaults. A missing config file just means
//! defaults — it is never an error.

use crate::global;
use crate::runner::ProcessorCommand;
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const KEY_TRANSCRIPT_DIR: &str = "TRANSCRIPT_DIR";
pub const KEY_ALT_TRANSCRIPT_DIR: &str = "ALT_TRANSCRIPT_DIR";
pub const KEY_IMPORT_DIR: &str = "IMPORT_DIR";
pub const KEY_PROCESS_COMMAND: &str = "PROCESS_COMMAND";

const DEFAULT_TRANSCRIPT_DIR: &str = "~/Movies/meetily-recordings";
const DEFAULT_IMPORT_DIR: &str = "~/Movies/meetily-recordings/imported";
const DEFAULT_PROCESS_COMMAND: &str = "meeting-processor";

/// Effective source directories and processor command for one run.
#[derive(Debug, Clone)]
pub struct Sources {
    /// Structured source: one subdirectory per recording (Meetily layout).
    pub transcript_dir: PathBuf,
    /// Plain transcript source (loose txt/md/json files). Skipped if unset.
    pub alt_transcript_dir: Option<PathBuf>,
    /// Flat media-import source (loose audio/video files).
    pub import_dir: PathBuf,
    /// External processing command line.
    pub process_command: ProcessorCommand,
}

impl Sources {
    /// Load overrides from `./.env` and the process environment.
    pub fn load() -> Result<Self> {
        let mut vars: HashMap<String, String> = HashMap::new();

        let config_path = global::config_file();
        if let Ok(iter) = dotenvy::from_path_iter(&config_path) {
            for item in iter.flatten() {
                vars.insert(item.0, item.1);
            }
            debug!("Loaded config overrides from {:?}", config_path);
        } else {
            debug!("No config file at {:?}, using defaults", config_path);
        }

        // Process environment takes precedence over the file.
        for key in [
            KEY_TRANSCRIPT_DIR,
            KEY_ALT_TRANSCRIPT_DIR,
            KEY_IMPORT_DIR,
            KEY_PROCESS_COMMAND,
        ] {
            if let Ok(value) = std::env::var(key) {
                vars.insert(key.to_string(), value);
            }
        }

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::resolve_from(&vars, &home))
    }

    /// Pure resolution core — all lookups go through `vars` so tests never
    /// touch the process environment. Unknown keys are ignored.
    pub fn resolve_from(vars: &HashMap<String, String>, home: &Path) -> Self {
        let transcript_dir = expand_home(
            vars.get(KEY_TRANSCRIPT_DIR)
                .map(String::as_str)
                .unwrap_or(DEFAULT_TRANSCRIPT_DIR),
            home,
        );
        let alt_transcript_dir = vars
            .get(KEY_ALT_TRANSCRIPT_DIR)
            .filter(|v| !v.trim().is_empty())
            .map(|v| expand_home(v, home));
        let import_dir = expand_home(
            vars.get(KEY_IMPORT_DIR)
                .map(String::as_str)
                .unwrap_or(DEFAULT_IMPORT_DIR),
            home,
        );
        let process_command = ProcessorCommand::parse(
            vars.get(KEY_PROCESS_COMMAND)
                .map(String::as_str)
                .unwrap_or(DEFAULT_PROCESS_COMMAND),
        );

        Self {
            transcript_dir,
            alt_transcript_dir,
            import_dir,
            process_command,
        }
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let sources = Sources::resolve_from(&HashMap::new(), Path::new("/home/mat"));
        assert_eq!(
            sources.transcript_dir,
            PathBuf::from("/home/mat/Movies/meetily-recordings")
        );
        assert_eq!(
            sources.import_dir,
            PathBuf::from("/home/mat/Movies/meetily-recordings/imported")
        );
        assert!(sources.alt_transcript_dir.is_none());
        assert_eq!(sources.process_command.program(), "meeting-processor");
    }

    #[test]
    fn test_overrides_and_tilde_expansion() {
        let vars = vars(&[
            (KEY_TRANSCRIPT_DIR, "~/recordings"),
            (KEY_ALT_TRANSCRIPT_DIR, "/var/transcripts"),
            (KEY_IMPORT_DIR, "~"),
        ]);
        let sources = Sources::resolve_from(&vars, Path::new("/home/mat"));
        assert_eq!(sources.transcript_dir, PathBuf::from("/home/mat/recordings"));
        assert_eq!(
            sources.alt_transcript_dir,
            Some(PathBuf::from("/var/transcripts"))
        );
        assert_eq!(sources.import_dir, PathBuf::from("/home/mat"));
    }

    #[test]
    fn test_blank_alt_dir_means_unset() {
        let vars = vars(&[(KEY_ALT_TRANSCRIPT_DIR, "  ")]);
        let sources = Sources::resolve_from(&vars, Path::new("/home/mat"));
        assert!(sources.alt_transcript_dir.is_none());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let vars = vars(&[("SOME_OTHER_KEY", "value")]);
        let sources = Sources::resolve_from(&vars, Path::new("/home/mat"));
        assert_eq!(
            sources.transcript_dir,
            PathBuf::from("/home/mat/Movies/meetily-recordings")
        );
    }

    #[test]
    fn test_process_command_with_args() {
        let vars = vars(&[(KEY_PROCESS_COMMAND, "python3 process.py --quiet")]);
        let sources = Sources::resolve_from(&vars, Path::new("/home/mat"));
        assert_eq!(sources.process_command.program(), "python3");
        assert_eq!(
            sources.process_command.base_args(),
            &["process.py", "--quiet"]
        );
    }
}
