//! Institution directory with a daily-partitioned on-disk cache.
//!
//! Freshness policy, in order: the in-process value lives for the
//! process lifetime; the disk artifact lives for the calendar day; only
//! then is the network consulted. A failed fetch yields an empty
//! directory for this process and persists nothing, so the next process
//! (or day) retries. Stale partitions are never evicted here.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::GarConfig;
use crate::diskcache::{persist_atomic, today};
use crate::error::Result;
use crate::transport::{Method, Transport};
use crate::types::InstitutionDirectory;
use crate::xml::translate::parse_institution_list;

const INSTITUTION_LIST_PATH: &str = "/etablissements/etablissements.xml";

pub struct InstitutionCache {
    transport: Arc<dyn Transport>,
    config: Arc<GarConfig>,
    cached_directory: Mutex<Option<Arc<InstitutionDirectory>>>,
    cached_codes: Mutex<Option<Arc<Vec<String>>>>,
}

impl InstitutionCache {
    pub(crate) fn new(transport: Arc<dyn Transport>, config: Arc<GarConfig>) -> Self {
        Self {
            transport,
            config,
            cached_directory: Mutex::new(None),
            cached_codes: Mutex::new(None),
        }
    }

    /// Drop the in-process values; the next call re-reads disk (or the
    /// network) under the current day's partition.
    pub fn reset(&self) {
        *self.cached_directory.lock().unwrap() = None;
        *self.cached_codes.lock().unwrap() = None;
    }

    /// Full directory keyed by UAI.
    pub async fn get_all(&self) -> Result<Arc<InstitutionDirectory>> {
        if let Some(cached) = self.cached_directory.lock().unwrap().clone() {
            return Ok(cached);
        }

        let artifact_path = self.partition_path("json", false);
        if let Some(directory) = load_artifact::<InstitutionDirectory>(&artifact_path) {
            let directory = Arc::new(directory);
            *self.cached_directory.lock().unwrap() = Some(directory.clone());
            return Ok(directory);
        }

        let directory = Arc::new(match self.fetch_directory().await? {
            Some(directory) => {
                persist_atomic(&artifact_path, &serde_json::to_vec(&directory)?)?;
                directory
            }
            None => InstitutionDirectory::new(),
        });

        *self.cached_directory.lock().unwrap() = Some(directory.clone());
        Ok(directory)
    }

    /// Institution codes only; a separate, lighter disk artifact.
    pub async fn get_all_codes(&self) -> Result<Arc<Vec<String>>> {
        if let Some(cached) = self.cached_codes.lock().unwrap().clone() {
            return Ok(cached);
        }

        let artifact_path = self.partition_path("json", true);
        if let Some(codes) = load_artifact::<Vec<String>>(&artifact_path) {
            let codes = Arc::new(codes);
            *self.cached_codes.lock().unwrap() = Some(codes.clone());
            return Ok(codes);
        }

        let codes = Arc::new(match self.fetch_directory().await? {
            Some(directory) => {
                let codes: Vec<String> = directory.keys().cloned().collect();
                persist_atomic(&artifact_path, &serde_json::to_vec(&codes)?)?;
                codes
            }
            None => Vec::new(),
        });

        *self.cached_codes.lock().unwrap() = Some(codes.clone());
        Ok(codes)
    }

    /// Whether the directory knows the given institution code.
    pub async fn has(&self, uai: &str) -> Result<bool> {
        Ok(self.get_all_codes().await?.iter().any(|code| code == uai))
    }

    /// One network fetch of the full directory. `Ok(None)` means the
    /// server answered with a non-200 status; per the cache policy that
    /// is an empty directory for this process, never persisted.
    async fn fetch_directory(&self) -> Result<Option<InstitutionDirectory>> {
        let url = self.config.endpoint(INSTITUTION_LIST_PATH);
        let response = self.transport.request(Method::Get, &url, None).await?;

        if !response.is_status(200) {
            tracing::warn!(
                status = response.status,
                "institution list fetch failed, treating directory as empty"
            );
            return Ok(None);
        }

        let directory = parse_institution_list(&response.body)?;
        persist_atomic(&self.partition_path("xml", false), &response.body)?;
        tracing::debug!(entries = directory.len(), "institution directory fetched");
        Ok(Some(directory))
    }

    /// `<cacheDir>/<YYYY>/<MM>/<DD>.<extension>`, with a `uai-only`
    /// infix for the codes artifact.
    fn partition_path(&self, extension: &str, uai_only: bool) -> PathBuf {
        let date = today();
        let infix = if uai_only { "uai-only." } else { "" };
        self.config
            .cache_directory
            .join(date.format("%Y").to_string())
            .join(date.format("%m").to_string())
            .join(format!("{}.{infix}{extension}", date.format("%d")))
    }
}

/// Read and decode a disk artifact. A missing file is a cache miss; an
/// unreadable or undecodable one is logged and also treated as a miss,
/// so a torn write from another process falls back to the network.
fn load_artifact<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Option<T> {
    if !path.is_file() {
        return None;
    }
    match fs::read(path).map_err(read_reason).and_then(|bytes| {
        serde_json::from_slice(&bytes).map_err(|e| format!("decode failed: {e}"))
    }) {
        Ok(value) => {
            tracing::debug!(path = %path.display(), "loaded cache artifact");
            Some(value)
        }
        Err(reason) => {
            tracing::warn!(path = %path.display(), reason, "discarding unreadable cache artifact");
            None
        }
    }
}

fn read_reason(e: std::io::Error) -> String {
    format!("read failed: {e}")
}
