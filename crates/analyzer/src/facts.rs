//! Flow facts and the canonical JSONL emitters.

use crate::callgraph::MappedCallGraph;
use crate::fixpoint::FuncState;
use flowfact_common::{canon, CallsiteId, FuncId, HeapId, Result, VarId};
use flowfact_ir::FlowNode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Schema version of emitted flow facts and witnesses.
pub const FACTS_SCHEMA_VERSION: u32 = 1;

/// A node of a flow fact. Unlike the per-function [`FlowNode`], variable
/// and return nodes carry their owning function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FactNode {
    Var { func_id: FuncId, id: VarId },
    CallArg { callsite_id: CallsiteId, index: u32 },
    HeapRead { heap_id: HeapId },
    HeapWrite { heap_id: HeapId },
    Return { func_id: FuncId },
}

impl FactNode {
    /// Attach the owning function to a per-function node.
    pub fn from_flow_node(func: &FuncId, node: &FlowNode) -> Self {
        match node {
            FlowNode::Var { id } => Self::Var {
                func_id: func.clone(),
                id: *id,
            },
            FlowNode::CallArg { callsite_id, index } => Self::CallArg {
                callsite_id: callsite_id.clone(),
                index: *index,
            },
            FlowNode::HeapRead { heap_id } => Self::HeapRead {
                heap_id: heap_id.clone(),
            },
            FlowNode::HeapWrite { heap_id } => Self::HeapWrite {
                heap_id: heap_id.clone(),
            },
            FlowNode::Return => Self::Return {
                func_id: func.clone(),
            },
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Var { .. } => 0,
            Self::CallArg { .. } => 1,
            Self::HeapRead { .. } => 2,
            Self::HeapWrite { .. } => 3,
            Self::Return { .. } => 4,
        }
    }

    /// Canonical composite key.
    pub fn key(&self) -> String {
        match self {
            Self::Var { func_id, id } => format!("var:{}:{}", func_id.to_canon(), id.to_canon()),
            Self::CallArg { callsite_id, index } => {
                format!("call_arg:{}:{}", callsite_id.to_canon(), index)
            }
            Self::HeapRead { heap_id } => format!("heap_read:{}", heap_id.to_canon()),
            Self::HeapWrite { heap_id } => format!("heap_write:{}", heap_id.to_canon()),
            Self::Return { func_id } => format!("return:{}", func_id.to_canon()),
        }
    }
}

impl Ord for FactNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind_rank()
            .cmp(&other.kind_rank())
            .then_with(|| match (self, other) {
                (Self::Var { func_id: fa, id: ia }, Self::Var { func_id: fb, id: ib }) => {
                    fa.cmp(fb).then_with(|| ia.cmp(ib))
                }
                (
                    Self::CallArg { callsite_id: ca, index: ia },
                    Self::CallArg { callsite_id: cb, index: ib },
                ) => ca.cmp(cb).then_with(|| ia.cmp(ib)),
                (Self::HeapRead { heap_id: a }, Self::HeapRead { heap_id: b }) => a.cmp(b),
                (Self::HeapWrite { heap_id: a }, Self::HeapWrite { heap_id: b }) => a.cmp(b),
                (Self::Return { func_id: a }, Self::Return { func_id: b }) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

impl PartialOrd for FactNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One "possible flow" fact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FlowFact {
    pub schema_version: u32,
    pub from: FactNode,
    pub to: FactNode,
}

impl FlowFact {
    pub fn new(from: FactNode, to: FactNode) -> Self {
        Self {
            schema_version: FACTS_SCHEMA_VERSION,
            from,
            to,
        }
    }

    /// De-duplication key over the canonical node forms.
    pub fn key(&self) -> String {
        format!("{}->{}", self.from.key(), self.to.key())
    }
}

/// Collect the final fact set from converged per-function states.
pub fn collect_facts(states: &BTreeMap<FuncId, FuncState>) -> Vec<FlowFact> {
    let mut facts: Vec<FlowFact> = Vec::new();
    for (func, state) in states {
        for (from, to) in &state.facts {
            facts.push(FlowFact::new(
                FactNode::from_flow_node(func, from),
                FactNode::from_flow_node(func, to),
            ));
        }
    }
    dedup_sort(&mut facts);
    facts
}

fn dedup_sort(facts: &mut Vec<FlowFact>) {
    facts.sort();
    facts.dedup_by_key(|f| f.key());
}

/// Write facts as canonical JSONL: one object per line, `\n` terminated;
/// an empty set produces a zero-byte file.
pub fn write_facts(path: &Path, facts: &[FlowFact]) -> Result<()> {
    let mut out = Vec::new();
    for fact in facts {
        out.extend_from_slice(canon::canonical_string(fact)?.as_bytes());
        out.push(b'\n');
    }
    write_file(path, &out)?;
    info!(facts = facts.len(), "wrote {}", path.display());
    Ok(())
}

/// One function-level call-chain witness per mapped call edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Witness {
    pub schema_version: u32,
    pub kind: String,
    pub steps: Vec<WitnessStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WitnessStep {
    pub caller_func_id: FuncId,
    pub callsite_id: CallsiteId,
    pub callee_func_id: FuncId,
}

/// Write witnesses in canonical (caller, callsite, callee) order.
pub fn write_witnesses(path: &Path, callgraph: &MappedCallGraph) -> Result<()> {
    let mut out = Vec::new();
    // Mapped edges are already sorted and de-duplicated.
    for edge in &callgraph.edges {
        let witness = Witness {
            schema_version: FACTS_SCHEMA_VERSION,
            kind: "call_chain".to_string(),
            steps: vec![WitnessStep {
                caller_func_id: edge.caller.clone(),
                callsite_id: edge.callsite.clone(),
                callee_func_id: edge.callee.clone(),
            }],
        };
        out.extend_from_slice(canon::canonical_string(&witness)?.as_bytes());
        out.push(b'\n');
    }
    write_file(path, &out)?;
    info!(witnesses = callgraph.edges.len(), "wrote {}", path.display());
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}
