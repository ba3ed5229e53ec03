//! The deterministic interprocedural fixpoint.
//!
//! Per function, a local dependency graph is seeded from its summary and
//! extended with lifted edges derived from callee effects:
//! 1. param→return:            `call_arg(c,i) → var(dst(c))`
//! 2. param→heap-write:        `call_arg(c,j) → heap_write(anchor(a_k), prop)`
//! 3. heap-read→return:        `heap_read(anchor(a_k), prop) → var(dst(c))`
//! 4. heap-read→heap-write:    lifted through both argument anchors
//!
//! Effects come from a callee's current fact set, filtered to endpoints
//! on its parameter anchors. Local reachability is a visited-set BFS from
//! every parameter and every heap-read source; visits to `return`,
//! `call_arg` or `heap_write` emit facts. The worklist is a FIFO seeded
//! in canonical FuncId order; a function whose sorted fact-key list
//! changed re-enqueues its callers (never duplicating queue entries).
//! Monotone fact growth over a finite lattice guarantees termination;
//! `max_steps` is a safety rail, not a tuning knob.

use crate::callgraph::MappedCallGraph;
use flowfact_common::{FlowfactError, FuncId, HeapId, PropName, Result, VarId};
use flowfact_ir::{CheapPassResult, Edge, FlowNode, FuncIr};
use flowfact_summary::FuncSummary;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, instrument};

/// Everything the fixpoint consumes, keyed by function.
pub struct FixpointInput<'a> {
    pub irs: &'a BTreeMap<FuncId, FuncIr>,
    pub summaries: &'a BTreeMap<FuncId, FuncSummary>,
    pub cheap: &'a BTreeMap<FuncId, CheapPassResult>,
    pub callgraph: &'a MappedCallGraph,
}

/// Per-function state: the fact set plus its sorted key list (the cheap
/// comparison the worklist uses).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuncState {
    pub facts: BTreeSet<(FlowNode, FlowNode)>,
    pub fact_keys: Vec<String>,
}

impl FuncState {
    fn from_facts(facts: BTreeSet<(FlowNode, FlowNode)>) -> Self {
        let fact_keys = facts
            .iter()
            .map(|(from, to)| format!("{}->{}", from.key(), to.key()))
            .collect();
        Self { facts, fact_keys }
    }
}

/// Result of a converged fixpoint run.
#[derive(Debug)]
pub struct FixpointOutcome {
    pub states: BTreeMap<FuncId, FuncState>,
    pub steps: u64,
}

/// Structural effects of a callee, extracted from its current facts by
/// filtering endpoints on parameter anchors.
#[derive(Debug, Default, Clone)]
struct Effects {
    /// Parameter indices that reach return.
    param_to_return: BTreeSet<u32>,
    /// (source param j, anchor param k, property).
    param_to_heap_write: BTreeSet<(u32, u32, PropName)>,
    /// (anchor param k, property).
    heap_read_to_return: BTreeSet<(u32, PropName)>,
    /// (read anchor param, read prop, write anchor param, write prop).
    heap_read_to_heap_write: BTreeSet<(u32, PropName, u32, PropName)>,
}

fn param_anchor_of(heap_id: &HeapId) -> Option<(u32, PropName)> {
    heap_id
        .anchor()
        .as_param_anchor()
        .map(|i| (i, heap_id.prop().clone()))
}

fn effects_of(state: &FuncState) -> Effects {
    let mut effects = Effects::default();
    for (from, to) in &state.facts {
        match (from, to) {
            (FlowNode::Var { id: VarId::Param(i) }, FlowNode::Return) => {
                effects.param_to_return.insert(*i);
            }
            (FlowNode::Var { id: VarId::Param(j) }, FlowNode::HeapWrite { heap_id }) => {
                if let Some((k, prop)) = param_anchor_of(heap_id) {
                    effects.param_to_heap_write.insert((*j, k, prop));
                }
            }
            (FlowNode::HeapRead { heap_id }, FlowNode::Return) => {
                if let Some((k, prop)) = param_anchor_of(heap_id) {
                    effects.heap_read_to_return.insert((k, prop));
                }
            }
            (FlowNode::HeapRead { heap_id: read }, FlowNode::HeapWrite { heap_id: write }) => {
                if let (Some((i, read_prop)), Some((j, write_prop))) =
                    (param_anchor_of(read), param_anchor_of(write))
                {
                    effects
                        .heap_read_to_heap_write
                        .insert((i, read_prop, j, write_prop));
                }
            }
            _ => {}
        }
    }
    effects
}

/// Run the worklist to a fixpoint.
#[instrument(skip_all, fields(functions = input.irs.len()))]
pub fn run_fixpoint(input: &FixpointInput<'_>, max_steps: u64) -> Result<FixpointOutcome> {
    // Every node of the mapped graph needs IR and a summary; anything
    // else is a pipeline bug, not a diagnostic.
    for func in input.callgraph.functions() {
        if !input.irs.contains_key(&func) || !input.cheap.contains_key(&func) {
            return Err(FlowfactError::Invariant(format!(
                "mapped function {} has no IR",
                func.to_canon()
            )));
        }
        if !input.summaries.contains_key(&func) {
            return Err(FlowfactError::Invariant(format!(
                "mapped function {} has no summary",
                func.to_canon()
            )));
        }
    }

    let mut states: BTreeMap<FuncId, FuncState> = BTreeMap::new();
    // Canonical (FuncId-sorted) initial worklist over every function.
    let mut queue: VecDeque<FuncId> = input.irs.keys().cloned().collect();
    let mut queued: BTreeSet<FuncId> = queue.iter().cloned().collect();
    let mut steps: u64 = 0;

    while let Some(func) = queue.pop_front() {
        queued.remove(&func);
        steps += 1;
        if steps > max_steps {
            return Err(FlowfactError::FixpointOverflow(max_steps));
        }

        let new_state = recompute(&func, input, &states)?;
        let changed = states
            .get(&func)
            .map(|old| old.fact_keys != new_state.fact_keys)
            .unwrap_or(true);
        states.insert(func.clone(), new_state);

        if changed {
            // Callers come back canonically ordered and are never
            // enqueued twice.
            for caller in input.callgraph.callers_of(&func) {
                if queued.insert(caller.clone()) {
                    queue.push_back(caller.clone());
                }
            }
        }
    }

    info!(steps, "fixpoint converged");
    Ok(FixpointOutcome { states, steps })
}

/// Rebuild one function's local graph (summary + lifted edges) and rerun
/// local reachability.
fn recompute(
    func: &FuncId,
    input: &FixpointInput<'_>,
    states: &BTreeMap<FuncId, FuncState>,
) -> Result<FuncState> {
    let summary = input.summaries.get(func).ok_or_else(|| {
        FlowfactError::Invariant(format!("no summary for {}", func.to_canon()))
    })?;
    let cheap = input.cheap.get(func).ok_or_else(|| {
        FlowfactError::Invariant(format!("no cheap pass result for {}", func.to_canon()))
    })?;
    let ir = input.irs.get(func).ok_or_else(|| {
        FlowfactError::Invariant(format!("no IR for {}", func.to_canon()))
    })?;

    let mut graph: BTreeMap<FlowNode, BTreeSet<FlowNode>> = BTreeMap::new();
    let mut add = |edge: Edge, graph: &mut BTreeMap<FlowNode, BTreeSet<FlowNode>>| {
        graph.entry(edge.from).or_default().insert(edge.to);
    };

    for edge in &summary.edges {
        add(edge.clone(), &mut graph);
    }

    // Lifted edges: every callee's current effects, unioned.
    for (callsite, info) in &cheap.callsites {
        for callee in input.callgraph.callees_at(callsite) {
            let Some(callee_state) = states.get(callee) else {
                // Callee not computed yet this round; the worklist will
                // bring us back once it is.
                continue;
            };
            let effects = effects_of(callee_state);

            if let Some(dst) = info.dst {
                for i in &effects.param_to_return {
                    add(
                        Edge::new(
                            FlowNode::call_arg(callsite.clone(), *i),
                            FlowNode::var(dst),
                        ),
                        &mut graph,
                    );
                }
            }

            for (j, k, prop) in &effects.param_to_heap_write {
                if let Some(Some(arg)) = info.args.get(*k as usize) {
                    add(
                        Edge::new(
                            FlowNode::call_arg(callsite.clone(), *j),
                            FlowNode::heap_write(HeapId::new(arg.anchor.clone(), prop.clone())),
                        ),
                        &mut graph,
                    );
                }
            }

            if let Some(dst) = info.dst {
                for (k, prop) in &effects.heap_read_to_return {
                    if let Some(Some(arg)) = info.args.get(*k as usize) {
                        add(
                            Edge::new(
                                FlowNode::heap_read(HeapId::new(
                                    arg.anchor.clone(),
                                    prop.clone(),
                                )),
                                FlowNode::var(dst),
                            ),
                            &mut graph,
                        );
                    }
                }
            }

            for (i, read_prop, j, write_prop) in &effects.heap_read_to_heap_write {
                if let (Some(Some(read_arg)), Some(Some(write_arg))) =
                    (info.args.get(*i as usize), info.args.get(*j as usize))
                {
                    add(
                        Edge::new(
                            FlowNode::heap_read(HeapId::new(
                                read_arg.anchor.clone(),
                                read_prop.clone(),
                            )),
                            FlowNode::heap_write(HeapId::new(
                                write_arg.anchor.clone(),
                                write_prop.clone(),
                            )),
                        ),
                        &mut graph,
                    );
                }
            }
        }
    }

    // Local reachability: BFS from every parameter and heap-read source.
    let mut sources: Vec<FlowNode> = ir
        .params
        .iter()
        .map(|p| FlowNode::var(*p))
        .collect();
    sources.extend(
        graph
            .keys()
            .filter(|n| matches!(n, FlowNode::HeapRead { .. }))
            .cloned(),
    );

    let mut facts = BTreeSet::new();
    for source in sources {
        let mut visited: BTreeSet<FlowNode> = BTreeSet::new();
        let mut frontier: VecDeque<FlowNode> = VecDeque::new();
        visited.insert(source.clone());
        frontier.push_back(source.clone());
        while let Some(node) = frontier.pop_front() {
            let Some(next) = graph.get(&node) else {
                continue;
            };
            for target in next {
                if !visited.insert(target.clone()) {
                    continue;
                }
                if matches!(
                    target,
                    FlowNode::Return | FlowNode::CallArg { .. } | FlowNode::HeapWrite { .. }
                ) {
                    facts.insert((source.clone(), target.clone()));
                }
                frontier.push_back(target.clone());
            }
        }
    }

    debug!(func = %func.to_canon(), facts = facts.len(), "recomputed local state");
    Ok(FuncState::from_facts(facts))
}
