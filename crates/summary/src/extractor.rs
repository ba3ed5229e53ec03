//! The extractor boundary.
//!
//! The core never talks to a model; it defines the strict request and
//! response schema an external extractor must speak, plus the shipped
//! baseline implementation that simply returns the cheap-pass edges.
//! Whatever an extractor returns goes through summary normalization,
//! which re-validates every edge and enforces baseline coverage, so a
//! misbehaving extractor can fail a summary but never corrupt one.

use crate::schema::SUMMARY_SCHEMA_VERSION;
use flowfact_common::{FuncId, Result};
use flowfact_ir::{Edge, FuncIr};
use serde::{Deserialize, Serialize};

/// What an extractor receives for one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SummaryRequest {
    pub schema_version: u32,
    pub func_id: FuncId,
    /// The normalized IR the summary must reference.
    pub ir: FuncIr,
    /// Cheap-pass edges; the response must include every one of them.
    pub baseline_edges: Vec<Edge>,
}

impl SummaryRequest {
    pub fn new(func_id: FuncId, ir: FuncIr, baseline_edges: Vec<Edge>) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            func_id,
            ir,
            baseline_edges,
        }
    }
}

/// What an extractor returns: a (possibly enriched) edge set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SummaryResponse {
    pub schema_version: u32,
    pub edges: Vec<Edge>,
}

/// A summary extractor. Implementations must be deterministic for a given
/// request; retries on validation failure are the caller's concern.
pub trait SummaryExtractor {
    fn name(&self) -> &'static str;

    fn extract(&self, request: &SummaryRequest) -> Result<SummaryResponse>;
}

/// The shipped extractor: the baseline edges, nothing more.
#[derive(Debug, Default, Clone, Copy)]
pub struct BaselineExtractor;

impl SummaryExtractor for BaselineExtractor {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn extract(&self, request: &SummaryRequest) -> Result<SummaryResponse> {
        Ok(SummaryResponse {
            schema_version: SUMMARY_SCHEMA_VERSION,
            edges: request.baseline_edges.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfact_common::VarId;
    use flowfact_ir::model::IR_SCHEMA_VERSION;
    use flowfact_ir::FlowNode;

    fn request() -> SummaryRequest {
        let func_id = FuncId::new("src/a.ts", 0, 10).unwrap();
        SummaryRequest::new(
            func_id.clone(),
            FuncIr {
                schema_version: IR_SCHEMA_VERSION,
                func_id,
                params: vec![VarId::Param(0)],
                locals: vec![],
                stmts: vec![],
            },
            vec![Edge::new(FlowNode::var(VarId::Param(0)), FlowNode::Return)],
        )
    }

    #[test]
    fn test_baseline_extractor_echoes_baseline() {
        let request = request();
        let response = BaselineExtractor.extract(&request).unwrap();
        assert_eq!(response.edges, request.baseline_edges);
        assert_eq!(response.schema_version, SUMMARY_SCHEMA_VERSION);
    }

    #[test]
    fn test_request_schema_is_strict() {
        let mut json = serde_json::to_value(request()).unwrap();
        json["unexpected"] = serde_json::json!(1);
        let back: std::result::Result<SummaryRequest, _> = serde_json::from_value(json);
        assert!(back.is_err());
    }
}
