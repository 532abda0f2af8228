//! Shared helpers for the on-disk cache trees.
//!
//! Cache partitions are keyed by calendar date and may be read by
//! concurrent processes, so every artifact is written to a temporary
//! file in the target directory and renamed into place.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::NamedTempFile;

use crate::error::{GarError, Result};

/// Today's date in local time; the cache partition key.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Write `bytes` to `path` via rename-on-write, creating parent
/// directories as needed.
pub(crate) fn persist_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| GarError::Configuration(format!("bad cache path {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| GarError::Io(e.error))?;
    Ok(())
}
