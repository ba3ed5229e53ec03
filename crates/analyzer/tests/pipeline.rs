//! End-to-end pipeline scenarios: literal sources through the bundled
//! frontend, an external call graph, and byte-level output checks.

use flowfact_analyzer::facts::{FactNode, FlowFact};
use flowfact_analyzer::{
    analyze_program, AnalysisOutcome, AnalyzeOptions, ExternalCallGraph, CALLGRAPH_SCHEMA_VERSION,
};
use flowfact_analyzer::callgraph::{EdgeKind, ExternalEdge, ExternalNode, ExternalSpan};
use flowfact_ast::Program;
use flowfact_common::{canon, AnalysisConfig, FuncId, HeapId, PropName, StmtId, VarId};
use flowfact_frontend::FrontendEngine;
use flowfact_ir::{CallsiteIndex, FunctionIndex, StatementIndex};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Scenario {
    #[allow(dead_code)]
    dir: TempDir,
    program: Program,
    functions: FunctionIndex,
    callsites: CallsiteIndex,
    out: PathBuf,
    cache: PathBuf,
    callgraph_path: PathBuf,
}

impl Scenario {
    /// Write sources into a temp repo, parse them, and prepare output
    /// locations.
    fn new(sources: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (rel, text) in sources {
            let path = dir.path().join("repo").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        let engine = FrontendEngine::new();
        let (program, stats, diags) = engine.parse_repo(&dir.path().join("repo")).unwrap();
        assert_eq!(stats.files_failed, 0);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");

        let functions = FunctionIndex::build(&program).unwrap();
        let statements = StatementIndex::build(&program, &functions).unwrap();
        let callsites = CallsiteIndex::build(&statements);
        Self {
            out: dir.path().join("facts.jsonl"),
            cache: dir.path().join("cache"),
            callgraph_path: dir.path().join("callgraph.json"),
            dir,
            program,
            functions,
            callsites,
        }
    }

    fn func(&self, name: &str) -> FuncId {
        self.functions
            .records()
            .iter()
            .find(|r| r.name.as_deref() == Some(name))
            .unwrap_or_else(|| panic!("no function named {name}"))
            .id
            .clone()
    }

    /// The sole callsite of `caller` in these fixtures.
    fn callsite(&self, caller: &str) -> StmtId {
        let id = self.func(caller);
        self.callsites.of_func(&id)[0].clone()
    }

    /// Serialize a call graph whose nodes are the named functions and
    /// whose edges run through each caller's only callsite.
    fn write_callgraph(&self, names: &[&str], edges: &[(&str, &str)]) {
        let nodes = names
            .iter()
            .map(|name| {
                let id = self.func(name);
                ExternalNode {
                    id: format!("n_{name}"),
                    name: Some(name.to_string()),
                    file_path: id.path().to_string(),
                    start_offset: id.start(),
                    end_offset: id.end(),
                }
            })
            .collect();
        let edges = edges
            .iter()
            .map(|(caller, callee)| {
                let callsite = self.callsite(caller);
                let span = self.callsites.span_of(&callsite).unwrap();
                ExternalEdge {
                    caller_id: format!("n_{caller}"),
                    callee_id: format!("n_{callee}"),
                    callsite: ExternalSpan {
                        file_path: callsite.func().path().to_string(),
                        start_offset: span.start,
                        end_offset: span.end,
                    },
                    kind: Some(EdgeKind::Call),
                }
            })
            .collect();
        let graph = ExternalCallGraph {
            schema_version: CALLGRAPH_SCHEMA_VERSION,
            nodes,
            edges,
        };
        fs::write(
            &self.callgraph_path,
            serde_json::to_string_pretty(&graph).unwrap(),
        )
        .unwrap();
    }

    fn options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            config: AnalysisConfig {
                cache_root: self.cache.clone(),
                ..AnalysisConfig::default()
            },
            callgraph: self.callgraph_path.clone(),
            out: self.out.clone(),
            witness: None,
            explain: None,
        }
    }

    fn analyze(&self) -> AnalysisOutcome {
        analyze_program(&self.program, &self.options()).unwrap()
    }

    fn fact_lines(&self) -> BTreeSet<String> {
        read_lines(&self.out)
    }
}

fn read_lines(path: &Path) -> BTreeSet<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn fact_line(from: FactNode, to: FactNode) -> String {
    canon::canonical_string(&FlowFact::new(from, to)).unwrap()
}

fn var(func: &FuncId, id: VarId) -> FactNode {
    FactNode::Var {
        func_id: func.clone(),
        id,
    }
}

fn ret(func: &FuncId) -> FactNode {
    FactNode::Return {
        func_id: func.clone(),
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn identity_pipeline_emits_exactly_one_fact() {
    let scenario = Scenario::new(&[("src/a.ts", "function id(x){ return x; }")]);
    scenario.write_callgraph(&["id"], &[]);
    let outcome = scenario.analyze();
    assert_eq!(outcome.summary.facts, 1);

    let id = scenario.func("id");
    let expected = fact_line(var(&id, VarId::Param(0)), ret(&id));
    assert_eq!(scenario.fact_lines(), BTreeSet::from([expected]));
}

#[test]
fn two_hop_param_propagation() {
    let scenario = Scenario::new(&[
        ("src/a.ts", "function a(x){ const v = b(x); return v; }"),
        ("src/b.ts", "function b(y){ return y; }"),
    ]);
    scenario.write_callgraph(&["a", "b"], &[("a", "b")]);
    let outcome = scenario.analyze();

    let a = scenario.func("a");
    let b = scenario.func("b");
    let callsite = scenario.callsite("a");

    let expected = BTreeSet::from([
        fact_line(
            var(&a, VarId::Param(0)),
            FactNode::CallArg {
                callsite_id: callsite,
                index: 0,
            },
        ),
        fact_line(var(&a, VarId::Param(0)), ret(&a)),
        fact_line(var(&b, VarId::Param(0)), ret(&b)),
    ]);
    assert_eq!(scenario.fact_lines(), expected);
    assert_eq!(outcome.summary.facts, 3);
    assert_eq!(outcome.summary.mapped_edges, 1);
}

#[test]
fn dynamic_key_heap_write() {
    let scenario = Scenario::new(&[("src/f.ts", "function f(o, k, v){ o[k] = v; }")]);
    scenario.write_callgraph(&["f"], &[]);
    scenario.analyze();

    let f = scenario.func("f");
    let bucket = HeapId::new(StmtId::param_anchor(f.clone(), 0), PropName::Dynamic);
    let expected = fact_line(
        var(&f, VarId::Param(2)),
        FactNode::HeapWrite { heap_id: bucket },
    );
    assert_eq!(scenario.fact_lines(), BTreeSet::from([expected]));
}

#[test]
fn optional_chain_with_nullish_default_reads_param_bucket() {
    let scenario = Scenario::new(&[(
        "src/g.ts",
        "function g(obj){ const v = obj?.value ?? \"d\"; return v; }",
    )]);
    scenario.write_callgraph(&["g"], &[]);
    scenario.analyze();

    let g = scenario.func("g");
    let bucket = HeapId::new(
        StmtId::param_anchor(g.clone(), 0),
        PropName::Named("value".into()),
    );
    let expected = fact_line(FactNode::HeapRead { heap_id: bucket }, ret(&g));
    assert_eq!(scenario.fact_lines(), BTreeSet::from([expected]));
}

#[test]
fn heap_lifting_across_a_callsite() {
    let scenario = Scenario::new(&[
        ("src/a.ts", "function a(x, y){ setX(x, y); }"),
        ("src/set.ts", "function setX(obj, val){ obj.x = val; }"),
    ]);
    scenario.write_callgraph(&["a", "setX"], &[("a", "setX")]);
    scenario.analyze();

    let a = scenario.func("a");
    let lifted_bucket = HeapId::new(
        StmtId::param_anchor(a.clone(), 0),
        PropName::Named("x".into()),
    );
    let lifted = fact_line(
        var(&a, VarId::Param(1)),
        FactNode::HeapWrite {
            heap_id: lifted_bucket,
        },
    );
    assert!(
        scenario.fact_lines().contains(&lifted),
        "missing lifted heap write fact:\n{lifted}\nhave:\n{:#?}",
        scenario.fact_lines()
    );
}

#[test]
fn warm_cache_rerun_is_byte_identical_and_writes_nothing() {
    let scenario = Scenario::new(&[
        ("src/a.ts", "function a(x){ const v = b(x); return v; }"),
        ("src/b.ts", "function b(y){ return y; }"),
    ]);
    scenario.write_callgraph(&["a", "b"], &[("a", "b")]);

    let first = scenario.analyze();
    assert_eq!(first.summary.cache_hits, 0);
    assert_eq!(first.summary.cache_writes, 2);
    let first_bytes = fs::read(&scenario.out).unwrap();

    let second = scenario.analyze();
    assert_eq!(second.summary.cache_hits, 2);
    assert_eq!(second.summary.cache_writes, 0);
    let second_bytes = fs::read(&scenario.out).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn witnesses_and_explain_bundles_are_emitted() {
    let scenario = Scenario::new(&[
        ("src/a.ts", "function a(x){ const v = b(x); return v; }"),
        ("src/b.ts", "function b(y){ return y; }"),
    ]);
    scenario.write_callgraph(&["a", "b"], &[("a", "b")]);

    let witness_path = scenario.dir.path().join("witness.jsonl");
    let explain_dir = scenario.dir.path().join("explain");
    let mut options = scenario.options();
    options.witness = Some(witness_path.clone());
    options.explain = Some(explain_dir.clone());
    analyze_program(&scenario.program, &options).unwrap();

    let witnesses = read_lines(&witness_path);
    assert_eq!(witnesses.len(), 1);
    let record: serde_json::Value =
        serde_json::from_str(witnesses.iter().next().unwrap()).unwrap();
    assert_eq!(record["kind"], "call_chain");
    assert_eq!(record["steps"][0]["callerFuncId"], scenario.func("a").to_canon());

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(explain_dir.join("manifest.json")).unwrap())
            .unwrap();
    assert_eq!(manifest["functions"].as_object().unwrap().len(), 2);
    for (_, hash) in manifest["functions"].as_object().unwrap() {
        let bundle_path = explain_dir
            .join("functions")
            .join(format!("{}.json", hash.as_str().unwrap()));
        let bundle: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(bundle_path).unwrap()).unwrap();
        assert_eq!(bundle["baselineCoverage"], "ok");
    }
}

#[test]
fn emitted_facts_are_strictly_increasing() {
    let scenario = Scenario::new(&[
        ("src/a.ts", "function a(x, y){ setX(x, y); }"),
        ("src/set.ts", "function setX(obj, val){ obj.x = val; }"),
    ]);
    scenario.write_callgraph(&["a", "setX"], &[("a", "setX")]);
    scenario.analyze();

    let text = fs::read_to_string(&scenario.out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines.len() > 1);
    for pair in lines.windows(2) {
        assert!(pair[0] < pair[1], "output not strictly increasing");
    }
}

#[test]
fn strict_mode_rejects_mismatched_paths_with_candidates() {
    let scenario = Scenario::new(&[("src/a.ts", "function id(x){ return x; }")]);
    let id = scenario.func("id");
    let graph = ExternalCallGraph {
        schema_version: CALLGRAPH_SCHEMA_VERSION,
        nodes: vec![ExternalNode {
            id: "n".into(),
            name: None,
            file_path: "SRC/a.ts".into(),
            start_offset: id.start(),
            end_offset: id.end(),
        }],
        edges: vec![],
    };
    fs::write(
        &scenario.callgraph_path,
        serde_json::to_string(&graph).unwrap(),
    )
    .unwrap();

    let err = analyze_program(&scenario.program, &scenario.options()).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("strict mode"), "got: {message}");
    assert!(message.contains("src/a.ts"), "candidates missing: {message}");
    assert!(!scenario.out.exists(), "no output on failure");
}
