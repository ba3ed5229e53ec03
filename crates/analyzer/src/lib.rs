//! Interprocedural analysis: call-graph mapping, the worklist fixpoint
//! and canonical fact emission.

pub mod callgraph;
pub mod explain;
pub mod facts;
pub mod fixpoint;
pub mod pipeline;

pub use callgraph::{
    load_call_graph, parse_call_graph, CallGraphMapper, ExternalCallGraph, MappedCallEdge,
    MappedCallGraph, CALLGRAPH_SCHEMA_VERSION,
};
pub use facts::{collect_facts, write_facts, write_witnesses, FactNode, FlowFact, FACTS_SCHEMA_VERSION};
pub use fixpoint::{run_fixpoint, FixpointInput, FixpointOutcome, FuncState};
pub use pipeline::{analyze_program, AnalysisOutcome, AnalysisSummary, AnalyzeOptions};
