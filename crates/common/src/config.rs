//! Analysis configuration.
//!
//! The config version is the only pipeline-wide constant; it participates
//! in every summary cache key, so bumping it invalidates the cache.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version of the analysis semantics. Bump when IR lowering, the cheap
/// pass, or summary normalization change in a way that affects outputs.
pub const ANALYSIS_CONFIG_VERSION: u32 = 1;

/// How external call-graph paths are matched against indexed source paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathResolution {
    /// Exact match against an indexed path; any failure is fatal.
    Strict,
    /// Normalize separators, then case-insensitive, then suffix matching;
    /// fallbacks demote failures to warnings where a unique match exists.
    Lenient,
}

/// Pipeline-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Semantics version; part of every cache key.
    pub config_version: u32,

    /// Hard cap on edges in a single normalized summary.
    pub max_edges: usize,

    /// Hard cap on out-edges from a single summary source node.
    pub max_fanout_per_source: usize,

    /// Safety rail for the interprocedural worklist.
    pub max_fixpoint_steps: u64,

    /// Path matching mode for the call-graph mapper.
    pub path_resolution: PathResolution,

    /// Root of the content-addressed summary cache.
    pub cache_root: PathBuf,

    /// Worker threads for IR construction and the cheap pass.
    /// `None` lets rayon pick.
    pub jobs: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            config_version: ANALYSIS_CONFIG_VERSION,
            max_edges: 25_000,
            max_fanout_per_source: 5_000,
            max_fixpoint_steps: 1_000_000,
            path_resolution: PathResolution::Strict,
            cache_root: PathBuf::from(".flowfact/cache"),
            jobs: None,
        }
    }
}
