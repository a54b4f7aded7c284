use anyhow::{Context, Result};
use std::path::PathBuf;

const STATE_FILE_NAME: &str = ".meetsync_processed.json";

/// Location of the processed-set file.
///
/// `MEETSYNC_STATE_FILE` overrides the default home-directory dotfile,
/// for scripted setups that keep state elsewhere.
pub fn state_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("MEETSYNC_STATE_FILE") {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(STATE_FILE_NAME))
        .context("Unable to determine home directory")
}

/// `.env`-style config file, resolved against the working directory.
pub fn config_file() -> PathBuf {
    PathBuf::from(".env")
}
