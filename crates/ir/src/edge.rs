//! Dependency-graph nodes and edges, shared by the cheap pass, function
//! summaries and the interprocedural fixpoint.

use flowfact_common::{CallsiteId, HeapId, VarId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A vertex of a per-function dependency graph.
///
/// Positional rules: edge sources are `Var` or `HeapRead`; edge targets
/// are `Var`, `CallArg`, `HeapWrite` or `Return`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FlowNode {
    Var { id: VarId },
    CallArg { callsite_id: CallsiteId, index: u32 },
    HeapRead { heap_id: HeapId },
    HeapWrite { heap_id: HeapId },
    Return,
}

impl FlowNode {
    pub fn var(id: VarId) -> Self {
        Self::Var { id }
    }

    pub fn call_arg(callsite_id: CallsiteId, index: u32) -> Self {
        Self::CallArg { callsite_id, index }
    }

    pub fn heap_read(heap_id: HeapId) -> Self {
        Self::HeapRead { heap_id }
    }

    pub fn heap_write(heap_id: HeapId) -> Self {
        Self::HeapWrite { heap_id }
    }

    /// Integer rank of the node kind; keeps the comparator total and
    /// constant-time on the kind dimension.
    pub fn kind_rank(&self) -> u8 {
        match self {
            Self::Var { .. } => 0,
            Self::CallArg { .. } => 1,
            Self::HeapRead { .. } => 2,
            Self::HeapWrite { .. } => 3,
            Self::Return => 4,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Var { .. } => "var",
            Self::CallArg { .. } => "call_arg",
            Self::HeapRead { .. } => "heap_read",
            Self::HeapWrite { .. } => "heap_write",
            Self::Return => "return",
        }
    }

    /// May this node appear as an edge source?
    pub fn is_valid_source(&self) -> bool {
        matches!(self, Self::Var { .. } | Self::HeapRead { .. })
    }

    /// May this node appear as an edge target?
    pub fn is_valid_target(&self) -> bool {
        matches!(
            self,
            Self::Var { .. } | Self::CallArg { .. } | Self::HeapWrite { .. } | Self::Return
        )
    }

    /// Canonical composite key, also used for fact de-duplication.
    pub fn key(&self) -> String {
        match self {
            Self::Var { id } => format!("var:{}", id.to_canon()),
            Self::CallArg { callsite_id, index } => {
                format!("call_arg:{}:{}", callsite_id.to_canon(), index)
            }
            Self::HeapRead { heap_id } => format!("heap_read:{}", heap_id.to_canon()),
            Self::HeapWrite { heap_id } => format!("heap_write:{}", heap_id.to_canon()),
            Self::Return => "return".to_string(),
        }
    }
}

impl Ord for FlowNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind_rank()
            .cmp(&other.kind_rank())
            .then_with(|| match (self, other) {
                (Self::Var { id: a }, Self::Var { id: b }) => a.cmp(b),
                (
                    Self::CallArg { callsite_id: ca, index: ia },
                    Self::CallArg { callsite_id: cb, index: ib },
                ) => ca.cmp(cb).then_with(|| ia.cmp(ib)),
                (Self::HeapRead { heap_id: a }, Self::HeapRead { heap_id: b }) => a.cmp(b),
                (Self::HeapWrite { heap_id: a }, Self::HeapWrite { heap_id: b }) => a.cmp(b),
                (Self::Return, Self::Return) => Ordering::Equal,
                // Distinct kinds are fully ordered by rank above.
                _ => Ordering::Equal,
            })
    }
}

impl PartialOrd for FlowNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A directed dependency edge inside one function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edge {
    pub from: FlowNode,
    pub to: FlowNode,
}

impl Edge {
    pub fn new(from: FlowNode, to: FlowNode) -> Self {
        Self { from, to }
    }

    /// Canonical composite key for de-duplication.
    pub fn key(&self) -> String {
        format!("{}->{}", self.from.key(), self.to.key())
    }
}
