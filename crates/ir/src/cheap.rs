//! The cheap static pass: baseline dependency edges plus coarse heap
//! anchors.
//!
//! Anchors assign every value a stable allocation-site identity without
//! alias or points-to analysis:
//! - parameter `i` starts on the synthetic anchor `synth(func, i)`,
//!   local `i` on `synth(func, LOCAL_BASE + i)`
//! - a variable-to-variable assignment propagates the source's anchor
//! - any other write resets the destination to the statement's own anchor
//!   (calls reset to the callsite)
//!
//! Baseline edges are emitted only for the documented forms: assignments,
//! returns of variables, variable call arguments, and member reads/writes
//! through variable objects. `select`/`short_circuit`/`await` reset
//! anchors but contribute no edges; a richer extractor may add them.

use crate::edge::{Edge, FlowNode};
use crate::model::{FuncIr, IrStmt, Rvalue};
use flowfact_common::{CallsiteId, HeapId, StmtId, VarId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A variable argument at a callsite, with the anchor it carried when the
/// call was reached. The fixpoint lifts callee heap effects through these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgAnchor {
    pub var: VarId,
    pub anchor: StmtId,
}

/// Per-callsite facts the lifting step needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallsiteInfo {
    /// The caller variable receiving the call result, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<VarId>,
    /// One entry per argument position; `None` for non-variable args.
    pub args: Vec<Option<ArgAnchor>>,
}

/// Output of the cheap pass for one function.
#[derive(Debug, Clone, Default)]
pub struct CheapPassResult {
    /// Baseline edges, de-duplicated, sorted by (kind, source, target).
    pub edges: Vec<Edge>,
    /// Lifting inputs per callsite, in callsite order.
    pub callsites: BTreeMap<CallsiteId, CallsiteInfo>,
    /// Every HeapId the baseline edges mention; summaries may not invent
    /// others.
    pub heap_ids: BTreeSet<HeapId>,
}

/// Run the cheap pass over normalized IR (statements in anchor order).
pub fn cheap_pass(ir: &FuncIr) -> CheapPassResult {
    let mut anchors: BTreeMap<VarId, StmtId> = BTreeMap::new();
    for (i, param) in ir.params.iter().enumerate() {
        anchors.insert(*param, StmtId::param_anchor(ir.func_id.clone(), i as u32));
    }
    for (i, local) in ir.locals.iter().enumerate() {
        anchors.insert(*local, StmtId::local_anchor(ir.func_id.clone(), i as u32));
    }

    let mut edges: Vec<Edge> = Vec::new();
    let mut callsites = BTreeMap::new();
    let mut heap_ids = BTreeSet::new();

    for stmt in &ir.stmts {
        match stmt {
            IrStmt::Assign { stmt, dst, src } => match src.as_var() {
                Some(src_var) => {
                    edges.push(Edge::new(FlowNode::var(src_var), FlowNode::var(*dst)));
                    if let Some(anchor) = anchors.get(&src_var).cloned() {
                        anchors.insert(*dst, anchor);
                    }
                }
                None => {
                    anchors.insert(*dst, stmt.clone());
                }
            },
            IrStmt::Return { value, .. } => {
                if let Some(src_var) = value.as_ref().and_then(Rvalue::as_var) {
                    edges.push(Edge::new(FlowNode::var(src_var), FlowNode::Return));
                }
            }
            IrStmt::Call {
                callsite, dst, args, ..
            } => {
                let mut arg_anchors = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    match arg.as_var() {
                        Some(var) => {
                            edges.push(Edge::new(
                                FlowNode::var(var),
                                FlowNode::call_arg(callsite.clone(), i as u32),
                            ));
                            arg_anchors.push(anchors.get(&var).cloned().map(|anchor| ArgAnchor {
                                var,
                                anchor,
                            }));
                        }
                        None => arg_anchors.push(None),
                    }
                }
                callsites.insert(
                    callsite.clone(),
                    CallsiteInfo {
                        dst: *dst,
                        args: arg_anchors,
                    },
                );
                if let Some(dst) = dst {
                    anchors.insert(*dst, callsite.clone());
                }
            }
            IrStmt::Await { stmt, dst, .. } => {
                anchors.insert(*dst, stmt.clone());
            }
            IrStmt::Alloc { stmt, dst, .. } => {
                anchors.insert(*dst, stmt.clone());
            }
            IrStmt::MemberRead {
                stmt,
                dst,
                object,
                property,
                ..
            } => {
                if let Some(object_var) = object.as_var() {
                    if let Some(anchor) = anchors.get(&object_var).cloned() {
                        let heap = HeapId::new(anchor, property.to_prop_name());
                        heap_ids.insert(heap.clone());
                        edges.push(Edge::new(FlowNode::heap_read(heap), FlowNode::var(*dst)));
                    }
                }
                anchors.insert(*dst, stmt.clone());
            }
            IrStmt::MemberWrite {
                object,
                property,
                value,
                ..
            } => {
                if let (Some(object_var), Some(value_var)) = (object.as_var(), value.as_var()) {
                    if let Some(anchor) = anchors.get(&object_var).cloned() {
                        let heap = HeapId::new(anchor, property.to_prop_name());
                        heap_ids.insert(heap.clone());
                        edges.push(Edge::new(
                            FlowNode::var(value_var),
                            FlowNode::heap_write(heap),
                        ));
                    }
                }
            }
            IrStmt::Select { stmt, dst, .. } | IrStmt::ShortCircuit { stmt, dst, .. } => {
                anchors.insert(*dst, stmt.clone());
            }
        }
    }

    edges.sort();
    edges.dedup();

    CheapPassResult {
        edges,
        callsites,
        heap_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_ir;
    use crate::index::{FunctionIndex, StatementIndex};
    use crate::normalize::normalize_ir;
    use flowfact_ast::Program;
    use flowfact_common::PropName;
    use flowfact_frontend::languages::Language;
    use flowfact_frontend::FrontendEngine;

    fn analyze(source: &str) -> (FuncIr, CheapPassResult) {
        let engine = FrontendEngine::new();
        let (file, _) = engine
            .parse_source("src/a.ts", Language::TypeScript, source)
            .unwrap();
        let program = Program {
            schema_version: flowfact_ast::PROGRAM_SCHEMA_VERSION,
            files: vec![file],
        };
        let functions = FunctionIndex::build(&program).unwrap();
        let statements = StatementIndex::build(&program, &functions).unwrap();
        let id = functions.records()[0].id.clone();
        let function = functions.ast_function(&program, &id).unwrap();
        let ir =
            normalize_ir(build_ir(&id, function, statements.table(&id).unwrap()).unwrap()).unwrap();
        let result = cheap_pass(&ir);
        (ir, result)
    }

    #[test]
    fn test_identity_produces_param_to_return() {
        let (_, result) = analyze("function id(x) { return x; }");
        assert_eq!(result.edges.len(), 1);
        assert_eq!(
            result.edges[0],
            Edge::new(FlowNode::var(VarId::Param(0)), FlowNode::Return)
        );
    }

    #[test]
    fn test_assignment_propagates_anchor() {
        // dst = src keeps the source's allocation identity: writing
        // through the copy hits the parameter's bucket.
        let (_, result) = analyze("function f(o, v) { const alias = o; alias.p = v; }");
        let write_edge = result
            .edges
            .iter()
            .find(|e| matches!(e.to, FlowNode::HeapWrite { .. }))
            .expect("expected a heap write edge");
        let FlowNode::HeapWrite { heap_id } = &write_edge.to else {
            unreachable!()
        };
        assert_eq!(heap_id.anchor().as_param_anchor(), Some(0));
        assert_eq!(heap_id.prop(), &PropName::Named("p".into()));
    }

    #[test]
    fn test_call_resets_anchor_to_callsite() {
        let (ir, result) = analyze("function f(v) { const o = g(); o.p = v; }");
        let callsite = ir
            .stmts
            .iter()
            .find_map(|s| match s {
                IrStmt::Call { callsite, .. } => Some(callsite.clone()),
                _ => None,
            })
            .unwrap();
        let FlowNode::HeapWrite { heap_id } = &result
            .edges
            .iter()
            .find(|e| matches!(e.to, FlowNode::HeapWrite { .. }))
            .unwrap()
            .to
        else {
            unreachable!()
        };
        assert_eq!(heap_id.anchor(), &callsite);
    }

    #[test]
    fn test_dynamic_key_uses_star_bucket() {
        let (_, result) = analyze("function f(o, k, v) { o[k] = v; }");
        assert_eq!(result.edges.len(), 1);
        let Edge { from, to } = &result.edges[0];
        assert_eq!(*from, FlowNode::var(VarId::Param(2)));
        let FlowNode::HeapWrite { heap_id } = to else {
            panic!("expected heap write");
        };
        assert_eq!(heap_id.prop(), &PropName::Dynamic);
        assert_eq!(heap_id.anchor().as_param_anchor(), Some(0));
    }

    #[test]
    fn test_member_read_from_param_bucket() {
        let (_, result) = analyze("function g(obj) { const v = obj?.value ?? \"d\"; return v; }");
        let read = result
            .edges
            .iter()
            .find(|e| matches!(e.from, FlowNode::HeapRead { .. }))
            .expect("expected heap read edge");
        let FlowNode::HeapRead { heap_id } = &read.from else {
            unreachable!()
        };
        assert_eq!(heap_id.anchor().as_param_anchor(), Some(0));
        assert_eq!(heap_id.prop(), &PropName::Named("value".into()));
        assert_eq!(read.to, FlowNode::var(VarId::Local(0)));
        // And the local flows onward to return.
        assert!(result
            .edges
            .iter()
            .any(|e| e.from == FlowNode::var(VarId::Local(0)) && e.to == FlowNode::Return));
    }

    #[test]
    fn test_call_args_recorded_with_anchors() {
        let (ir, result) = analyze("function a(x, y) { setX(x, y); }");
        let callsite = ir
            .stmts
            .iter()
            .find_map(|s| match s {
                IrStmt::Call { callsite, .. } => Some(callsite.clone()),
                _ => None,
            })
            .unwrap();
        let info = &result.callsites[&callsite];
        assert_eq!(info.dst, None);
        assert_eq!(info.args.len(), 2);
        let arg0 = info.args[0].as_ref().unwrap();
        assert_eq!(arg0.var, VarId::Param(0));
        assert_eq!(arg0.anchor.as_param_anchor(), Some(0));
        // Both args also produced call_arg edges.
        assert_eq!(
            result
                .edges
                .iter()
                .filter(|e| matches!(e.to, FlowNode::CallArg { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_select_produces_no_edges_but_resets_anchor() {
        let (_, result) = analyze("function f(c, a, b, v) { const x = c ? a : b; x.p = v; }");
        // No var→var edge from the select.
        assert!(!result
            .edges
            .iter()
            .any(|e| matches!((&e.from, &e.to), (FlowNode::Var { .. }, FlowNode::Var { .. }))));
        // The write goes to the select statement's own bucket, not a
        // parameter bucket.
        let FlowNode::HeapWrite { heap_id } = &result
            .edges
            .iter()
            .find(|e| matches!(e.to, FlowNode::HeapWrite { .. }))
            .unwrap()
            .to
        else {
            unreachable!()
        };
        assert!(!heap_id.anchor().is_synthetic());
    }

    #[test]
    fn test_edges_sorted_and_deduped() {
        let (_, result) = analyze(
            "function f(x) { let a = x; a = x; return a; }",
        );
        let mut sorted = result.edges.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(result.edges, sorted);
        // a = x appears twice in source but once as an edge.
        assert_eq!(
            result
                .edges
                .iter()
                .filter(|e| e.from == FlowNode::var(VarId::Param(0))
                    && e.to == FlowNode::var(VarId::Local(0)))
                .count(),
            1
        );
    }
}
