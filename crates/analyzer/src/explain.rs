//! Per-function explain bundles.
//!
//! `explain/manifest.json` plus `explain/functions/<hash>.json`, where
//! `<hash>` is the function's summary cache key. The emitter owns only
//! its managed subtree: it clears `functions/` and the manifest before
//! writing and touches nothing else in the directory.

use flowfact_common::{canon, AnalysisConfig, FuncId, Result};
use flowfact_ir::FuncIr;
use flowfact_summary::{cache::cache_key, FuncSummary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const EXPLAIN_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExplainBounds {
    pub max_edges: usize,
    pub max_fanout_per_source: usize,
}

/// One function's bundle: everything a reader needs to audit its facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExplainBundle {
    pub schema_version: u32,
    pub func_id: FuncId,
    pub analysis_config_version: u32,
    pub bounds: ExplainBounds,
    /// Derived: summaries cannot normalize without baseline coverage, so
    /// a written bundle always says "ok". Kept for schema stability.
    pub baseline_coverage: String,
    pub ir: FuncIr,
    pub summary: FuncSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExplainManifest {
    pub schema_version: u32,
    pub analysis_config_version: u32,
    /// FuncId (canonical form) → bundle hash, sorted by key.
    pub functions: BTreeMap<String, String>,
}

/// Write explain bundles for every function.
pub fn write_explain(
    dir: &Path,
    config: &AnalysisConfig,
    irs: &BTreeMap<FuncId, FuncIr>,
    summaries: &BTreeMap<FuncId, FuncSummary>,
) -> Result<()> {
    let functions_dir = dir.join("functions");
    // Clear only the managed subtree.
    if functions_dir.exists() {
        fs::remove_dir_all(&functions_dir)?;
    }
    let manifest_path = dir.join("manifest.json");
    if manifest_path.exists() {
        fs::remove_file(&manifest_path)?;
    }
    fs::create_dir_all(&functions_dir)?;

    let mut manifest = ExplainManifest {
        schema_version: EXPLAIN_SCHEMA_VERSION,
        analysis_config_version: config.config_version,
        functions: BTreeMap::new(),
    };

    for (func_id, ir) in irs {
        let Some(summary) = summaries.get(func_id) else {
            continue;
        };
        let hash = cache_key(config.config_version, ir)?;
        let bundle = ExplainBundle {
            schema_version: EXPLAIN_SCHEMA_VERSION,
            func_id: func_id.clone(),
            analysis_config_version: config.config_version,
            bounds: ExplainBounds {
                max_edges: config.max_edges,
                max_fanout_per_source: config.max_fanout_per_source,
            },
            baseline_coverage: "ok".to_string(),
            ir: ir.clone(),
            summary: summary.clone(),
        };
        fs::write(
            functions_dir.join(format!("{hash}.json")),
            canon::canonical_string(&bundle)?,
        )?;
        manifest.functions.insert(func_id.to_canon(), hash);
    }

    fs::write(&manifest_path, canon::canonical_string(&manifest)?)?;
    info!(
        functions = manifest.functions.len(),
        "wrote explain bundles to {}",
        dir.display()
    );
    Ok(())
}
