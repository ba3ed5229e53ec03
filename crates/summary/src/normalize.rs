//! Summary normalization: validation against the IR, canonical ordering,
//! bounds, and the baseline coverage invariant.

use crate::schema::{FuncSummary, SUMMARY_SCHEMA_VERSION};
use flowfact_common::{AnalysisConfig, FlowfactError};
use flowfact_ir::{CheapPassResult, Edge, FlowNode, FuncIr, IrStmt};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Why a summary was rejected. All variants are fatal for the summary; a
/// hybrid caller may retry its extractor with this as feedback.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("undeclared identifier: {0}")]
    UndeclaredId(String),

    #[error("index out of range: {0}")]
    OutOfRangeIndex(String),

    #[error("misplaced node: {0}")]
    MisplacedNode(String),

    #[error("bounds exceeded: {0}")]
    BoundsExceeded(String),

    #[error("baseline coverage missing: {0}")]
    BaselineCoverageMissing(String),
}

impl From<SummaryError> for FlowfactError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::InvalidSchema(m) => FlowfactError::Schema(m),
            SummaryError::UndeclaredId(m)
            | SummaryError::OutOfRangeIndex(m)
            | SummaryError::MisplacedNode(m) => FlowfactError::Invariant(m),
            SummaryError::BoundsExceeded(m) => FlowfactError::BoundsExceeded(m),
            SummaryError::BaselineCoverageMissing(m) => {
                FlowfactError::BaselineCoverageMissing(m)
            }
        }
    }
}

/// Validate, de-duplicate, sort and bound an edge set into a normalized
/// summary for `ir`.
pub fn normalize_summary(
    schema_version: u32,
    edges: Vec<Edge>,
    ir: &FuncIr,
    baseline: &CheapPassResult,
    config: &AnalysisConfig,
) -> Result<FuncSummary, SummaryError> {
    if schema_version != SUMMARY_SCHEMA_VERSION {
        return Err(SummaryError::InvalidSchema(format!(
            "summary schema version {} (expected {})",
            schema_version, SUMMARY_SCHEMA_VERSION
        )));
    }

    for edge in &edges {
        validate_node(&edge.from, ir, baseline)?;
        validate_node(&edge.to, ir, baseline)?;
        if !edge.from.is_valid_source() {
            return Err(SummaryError::MisplacedNode(format!(
                "{} cannot be an edge source",
                edge.from.key()
            )));
        }
        if !edge.to.is_valid_target() {
            return Err(SummaryError::MisplacedNode(format!(
                "{} cannot be an edge target",
                edge.to.key()
            )));
        }
    }

    let mut edges: Vec<Edge> = edges;
    edges.sort();
    edges.dedup();

    if edges.len() > config.max_edges {
        return Err(SummaryError::BoundsExceeded(format!(
            "{} edges in {} (max {})",
            edges.len(),
            ir.func_id.to_canon(),
            config.max_edges
        )));
    }
    let mut fanout: BTreeMap<String, usize> = BTreeMap::new();
    for edge in &edges {
        let count = fanout.entry(edge.from.key()).or_insert(0);
        *count += 1;
        if *count > config.max_fanout_per_source {
            return Err(SummaryError::BoundsExceeded(format!(
                "fanout from {} exceeds {} in {}",
                edge.from.key(),
                config.max_fanout_per_source,
                ir.func_id.to_canon()
            )));
        }
    }

    // Baseline coverage: an extractor may add edges but never drop the
    // cheap pass's.
    let edge_set: BTreeSet<&Edge> = edges.iter().collect();
    for baseline_edge in &baseline.edges {
        if !edge_set.contains(baseline_edge) {
            return Err(SummaryError::BaselineCoverageMissing(format!(
                "baseline edge {} absent from summary of {}",
                baseline_edge.key(),
                ir.func_id.to_canon()
            )));
        }
    }

    Ok(FuncSummary {
        schema_version: SUMMARY_SCHEMA_VERSION,
        func_id: ir.func_id.clone(),
        edges,
    })
}

fn validate_node(
    node: &FlowNode,
    ir: &FuncIr,
    baseline: &CheapPassResult,
) -> Result<(), SummaryError> {
    match node {
        FlowNode::Var { id } => {
            if !ir.declares(*id) {
                return Err(SummaryError::UndeclaredId(format!(
                    "{} is not declared in {}",
                    id.to_canon(),
                    ir.func_id.to_canon()
                )));
            }
        }
        FlowNode::CallArg { callsite_id, index } => {
            let Some(IrStmt::Call { args, .. }) = ir.call_at(callsite_id) else {
                return Err(SummaryError::UndeclaredId(format!(
                    "{} is not a call statement in {}",
                    callsite_id.to_canon(),
                    ir.func_id.to_canon()
                )));
            };
            if *index as usize >= args.len() {
                return Err(SummaryError::OutOfRangeIndex(format!(
                    "argument {} at {} (arity {})",
                    index,
                    callsite_id.to_canon(),
                    args.len()
                )));
            }
        }
        FlowNode::HeapRead { heap_id } | FlowNode::HeapWrite { heap_id } => {
            if heap_id.anchor().func() != &ir.func_id {
                return Err(SummaryError::UndeclaredId(format!(
                    "heap bucket {} lies outside {}",
                    heap_id.to_canon(),
                    ir.func_id.to_canon()
                )));
            }
            if !baseline.heap_ids.contains(heap_id) {
                return Err(SummaryError::UndeclaredId(format!(
                    "heap bucket {} does not appear in the baseline edges of {}",
                    heap_id.to_canon(),
                    ir.func_id.to_canon()
                )));
            }
        }
        FlowNode::Return => {}
    }
    Ok(())
}
