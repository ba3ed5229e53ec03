//! Content-addressed summary cache.
//!
//! Key: hex SHA-256 of the canonical JSON of
//! `{analysisConfigVersion, ir}`. The config version participates in
//! every key, so bumping it invalidates the whole cache. Entries are
//! immutable: writers skip existing targets and land new ones via a
//! `.tmp` sibling plus rename. Safe for single-process use; multi-process
//! runs should layer O_CREAT|O_EXCL on the tmp or a per-path lock.

use crate::schema::FuncSummary;
use flowfact_common::{canon, FlowfactError, Result};
use flowfact_ir::FuncIr;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// On-disk layout: `<root>/func_summaries/<hex[0:2]>/<hex[2:4]>/<hex>.json`.
const CACHE_SUBDIR: &str = "func_summaries";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheKeyInput<'a> {
    analysis_config_version: u32,
    ir: &'a FuncIr,
}

/// Compute the cache key for a function's normalized IR under a config
/// version.
pub fn cache_key(config_version: u32, ir: &FuncIr) -> Result<String> {
    canon::canonical_hash(&CacheKeyInput {
        analysis_config_version: config_version,
        ir,
    })
}

/// The content-addressed summary store.
#[derive(Debug, Clone)]
pub struct SummaryCache {
    root: PathBuf,
}

impl SummaryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(CACHE_SUBDIR)
            .join(&key[0..2])
            .join(&key[2..4])
            .join(format!("{key}.json"))
    }

    /// Read a cached summary. `NotFound` is absence; every other I/O or
    /// parse failure surfaces.
    pub fn read(&self, key: &str) -> Result<Option<FuncSummary>> {
        let path = self.path_for(key);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!("cache miss for {key}");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let summary: FuncSummary = serde_json::from_str(&text).map_err(|e| {
            FlowfactError::Schema(format!("corrupt cache entry {}: {e}", path.display()))
        })?;
        trace!("cache hit for {key}");
        Ok(Some(summary))
    }

    /// Write a summary under its key. Returns `false` (and leaves the
    /// file untouched) when the target already exists.
    pub fn write(&self, key: &str, summary: &FuncSummary) -> Result<bool> {
        let path = self.path_for(key);
        if path.exists() {
            trace!("cache entry {key} already present, skipping write");
            return Ok(false);
        }
        let parent = path.parent().expect("cache paths always have parents");
        fs::create_dir_all(parent)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, canon::canonical_string(summary)?)?;
        fs::rename(&tmp, &path)?;
        debug!("cached summary {key}");
        Ok(true)
    }
}
