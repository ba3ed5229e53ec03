//! The analysis pipeline driver.
//!
//! Orchestrates the whole run over a frontend-produced program:
//! 1. Index functions, statement sites and callsites
//! 2. Build + normalize IR and run the cheap pass (rayon, merged in
//!    canonical order)
//! 3. Produce summaries through the content-addressed cache
//! 4. Map the external call graph
//! 5. Run the interprocedural fixpoint
//! 6. Emit facts (plus optional witnesses and explain bundles)

use crate::callgraph::{load_call_graph, CallGraphMapper, MappedCallGraph};
use crate::explain::write_explain;
use crate::facts::{collect_facts, write_facts, write_witnesses, FlowFact};
use crate::fixpoint::{run_fixpoint, FixpointInput};
use anyhow::{anyhow, Context, Result};
use flowfact_ast::Program;
use flowfact_common::{AnalysisConfig, Diagnostic, DiagnosticSink, FuncId};
use flowfact_ir::{
    build_ir, cheap_pass, normalize_ir, CallsiteIndex, CheapPassResult, FuncIr, FunctionIndex,
    StatementIndex,
};
use flowfact_summary::{
    cache::cache_key, normalize_summary, BaselineExtractor, FuncSummary, SummaryCache,
    SummaryExtractor, SummaryRequest,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Everything an analyze run needs besides the program itself.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    pub config: AnalysisConfig,
    pub callgraph: PathBuf,
    pub out: PathBuf,
    pub witness: Option<PathBuf>,
    pub explain: Option<PathBuf>,
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub files: usize,
    pub functions: usize,
    pub mapped_edges: usize,
    pub facts: usize,
    pub cache_hits: usize,
    pub cache_writes: usize,
    pub fixpoint_steps: u64,
}

/// Outcome: counters plus the diagnostics accumulated along the way
/// (already deduplicated; callers print them in canonical order).
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub summary: AnalysisSummary,
    pub diagnostics: Vec<Diagnostic>,
}

/// Analyze a program against an external call graph.
#[instrument(skip_all, fields(files = program.files.len()))]
pub fn analyze_program(program: &Program, options: &AnalyzeOptions) -> Result<AnalysisOutcome> {
    let mut sink = DiagnosticSink::new();

    flowfact_ast::load::validate_program(program).context("validating program")?;

    // 1. Indexes.
    let functions = FunctionIndex::build(program).context("indexing functions")?;
    let statements = StatementIndex::build(program, &functions).context("indexing statements")?;
    let callsites = CallsiteIndex::build(&statements);
    info!(functions = functions.len(), "indexed program");

    // 2. IR + cheap pass, sharded; indexes are read-only from here on and
    // the per-function outputs merge into FuncId-sorted maps.
    let ids: Vec<FuncId> = functions.ids().cloned().collect();
    let built: Vec<(FuncId, flowfact_common::Result<(FuncIr, CheapPassResult)>)> = ids
        .par_iter()
        .map(|id| {
            let outcome = (|| {
                let function = functions.ast_function(program, id).ok_or_else(|| {
                    flowfact_common::FlowfactError::Invariant(format!(
                        "function {} has no syntax tree",
                        id.to_canon()
                    ))
                })?;
                let table = statements.table(id).ok_or_else(|| {
                    flowfact_common::FlowfactError::Invariant(format!(
                        "function {} has no site table",
                        id.to_canon()
                    ))
                })?;
                let ir = normalize_ir(build_ir(id, function, table)?)?;
                let cheap = cheap_pass(&ir);
                Ok((ir, cheap))
            })();
            (id.clone(), outcome)
        })
        .collect();

    let mut irs: BTreeMap<FuncId, FuncIr> = BTreeMap::new();
    let mut cheap: BTreeMap<FuncId, CheapPassResult> = BTreeMap::new();
    for (id, outcome) in built {
        let (ir, result) = outcome.with_context(|| format!("lowering {}", id.to_canon()))?;
        irs.insert(id.clone(), ir);
        cheap.insert(id, result);
    }

    // 3. Summaries through the cache.
    let cache = SummaryCache::new(&options.config.cache_root);
    let extractor = BaselineExtractor;
    let mut summaries: BTreeMap<FuncId, FuncSummary> = BTreeMap::new();
    let mut summary_stats = (0usize, 0usize); // (hits, writes)
    for (id, ir) in &irs {
        let baseline = &cheap[id];
        let key = cache_key(options.config.config_version, ir)?;
        let summary = match cache.read(&key)? {
            Some(cached) => {
                summary_stats.0 += 1;
                cached
            }
            None => {
                let request =
                    SummaryRequest::new(id.clone(), ir.clone(), baseline.edges.clone());
                let response = extractor
                    .extract(&request)
                    .with_context(|| format!("extracting summary for {}", id.to_canon()))?;
                let summary = normalize_summary(
                    response.schema_version,
                    response.edges,
                    ir,
                    baseline,
                    &options.config,
                )
                .map_err(|e| anyhow!("summary of {}: {e}", id.to_canon()))?;
                if cache.write(&key, &summary)? {
                    summary_stats.1 += 1;
                }
                summary
            }
        };
        summaries.insert(id.clone(), summary);
    }
    info!(
        hits = summary_stats.0,
        writes = summary_stats.1,
        "summaries ready"
    );

    // 4. Call graph.
    let external = load_call_graph(&options.callgraph)
        .with_context(|| format!("loading {}", options.callgraph.display()))?;
    let mapper = CallGraphMapper::new(&functions, &callsites, options.config.path_resolution);
    let mapped: MappedCallGraph = match mapper.map(&external, &mut sink) {
        Ok(mapped) => mapped,
        Err(e) => {
            return Err(consolidated_failure(e, sink));
        }
    };

    // 5. Fixpoint.
    let input = FixpointInput {
        irs: &irs,
        summaries: &summaries,
        cheap: &cheap,
        callgraph: &mapped,
    };
    let outcome = run_fixpoint(&input, options.config.max_fixpoint_steps)?;
    let facts: Vec<FlowFact> = collect_facts(&outcome.states);

    // 6. Outputs.
    write_facts(&options.out, &facts)?;
    if let Some(witness) = &options.witness {
        write_witnesses(witness, &mapped)?;
    }
    if let Some(explain) = &options.explain {
        write_explain(explain, &options.config, &irs, &summaries)?;
    }

    Ok(AnalysisOutcome {
        summary: AnalysisSummary {
            files: program.files.len(),
            functions: functions.len(),
            mapped_edges: mapped.edges.len(),
            facts: facts.len(),
            cache_hits: summary_stats.0,
            cache_writes: summary_stats.1,
            fixpoint_steps: outcome.steps,
        },
        diagnostics: sink.into_sorted(),
    })
}

/// Strict-mode resolution failures fold every collected diagnostic into
/// one consolidated error, in canonical order.
fn consolidated_failure(cause: flowfact_common::FlowfactError, sink: DiagnosticSink) -> anyhow::Error {
    let mut lines = vec![cause.to_string()];
    lines.extend(sink.into_sorted().iter().map(ToString::to_string));
    anyhow!(lines.join("\n"))
}
