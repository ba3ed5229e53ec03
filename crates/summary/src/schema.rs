//! The function summary wire schema.

use flowfact_common::FuncId;
use flowfact_ir::Edge;
use serde::{Deserialize, Serialize};

/// Schema version of summaries (wire and cache forms).
pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

/// A normalized function summary: the canonical edge set referencing one
/// specific FuncIr. Immutable once written to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FuncSummary {
    pub schema_version: u32,
    pub func_id: FuncId,
    pub edges: Vec<Edge>,
}

impl FuncSummary {
    /// Sorted composite keys of every edge; cheap equality probe.
    pub fn edge_keys(&self) -> Vec<String> {
        self.edges.iter().map(Edge::key).collect()
    }
}
