//! Timestamped run folders.
//!
//! Each analysis run writes its artifacts into a fresh
//! `run_YYYY-MM-DD_HH-MM-SS` folder under the configured base directory.
//! Later stages locate the newest run by folder name, which sorts
//! lexicographically in timestamp order.

use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::error::{DubError, Result};

const RUN_PREFIX: &str = "run_";

/// Creates a new timestamped run folder under `base` and returns its path.
pub fn create_run_dir(base: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let dir = base.join(format!("{RUN_PREFIX}{stamp}"));
    std::fs::create_dir_all(&dir)?;
    info!("created run folder {}", dir.display());
    Ok(dir)
}

/// Returns the most recent run folder under `base`.
pub fn find_latest_run(base: &Path) -> Result<PathBuf> {
    if !base.is_dir() {
        return Err(DubError::MissingArtifact(base.to_path_buf()));
    }

    let mut latest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let is_run = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with(RUN_PREFIX))
            .unwrap_or(false);
        if is_run && latest.as_ref().map(|l| path > *l).unwrap_or(true) {
            latest = Some(path);
        }
    }

    latest.ok_or_else(|| DubError::MissingArtifact(base.join(format!("{RUN_PREFIX}*"))))
}
