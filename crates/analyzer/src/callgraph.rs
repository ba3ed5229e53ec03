//! External call-graph input and mapping onto internal identifiers.
//!
//! The producer hands us opaque node ids with file+span plus edges with
//! callsite spans. Mapping resolves those to FuncIds and CallsiteIds:
//! - **strict**: file paths must match an indexed path exactly; any
//!   failure elevates to a consolidated fatal listing the three nearest
//!   indexed candidates per failure
//! - **lenient**: separator normalization, then case-insensitive, then
//!   unique basename+suffix matching, each fallback a warning diagnostic;
//!   unresolvable nodes and edges accumulate error diagnostics and the
//!   rest of the graph still maps

use flowfact_common::{
    CallsiteId, DiagnosticSink, Diagnostic, FlowfactError, FuncId, PathResolution, Result, Span,
};
use flowfact_ir::{CallsiteIndex, FunctionIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// Schema version of the call-graph input.
pub const CALLGRAPH_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalCallGraph {
    pub schema_version: u32,
    pub nodes: Vec<ExternalNode>,
    pub edges: Vec<ExternalEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub file_path: String,
    pub start_offset: u32,
    pub end_offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalEdge {
    pub caller_id: String,
    pub callee_id: String,
    pub callsite: ExternalSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EdgeKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExternalSpan {
    pub file_path: String,
    pub start_offset: u32,
    pub end_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Call,
    Construct,
}

/// Parse and structurally validate call-graph JSON.
pub fn load_call_graph(path: &Path) -> Result<ExternalCallGraph> {
    let text = std::fs::read_to_string(path)?;
    parse_call_graph(&text)
}

pub fn parse_call_graph(text: &str) -> Result<ExternalCallGraph> {
    let graph: ExternalCallGraph = serde_json::from_str(text)
        .map_err(|e| FlowfactError::Schema(format!("call graph json: {e}")))?;
    if graph.schema_version != CALLGRAPH_SCHEMA_VERSION {
        return Err(FlowfactError::Schema(format!(
            "unsupported call graph schema version {} (expected {})",
            graph.schema_version, CALLGRAPH_SCHEMA_VERSION
        )));
    }
    let mut ids = BTreeSet::new();
    for node in &graph.nodes {
        if node.end_offset < node.start_offset {
            return Err(FlowfactError::Schema(format!(
                "node '{}' span ends before it starts",
                node.id
            )));
        }
        if !ids.insert(node.id.as_str()) {
            return Err(FlowfactError::Schema(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }
    }
    for edge in &graph.edges {
        if !ids.contains(edge.caller_id.as_str()) {
            return Err(FlowfactError::Schema(format!(
                "edge references unknown caller '{}'",
                edge.caller_id
            )));
        }
        if !ids.contains(edge.callee_id.as_str()) {
            return Err(FlowfactError::Schema(format!(
                "edge references unknown callee '{}'",
                edge.callee_id
            )));
        }
        if edge.callsite.end_offset < edge.callsite.start_offset {
            return Err(FlowfactError::Schema(format!(
                "callsite span of edge {} -> {} ends before it starts",
                edge.caller_id, edge.callee_id
            )));
        }
    }
    Ok(graph)
}

// ---------------------------------------------------------------------------
// Mapped graph
// ---------------------------------------------------------------------------

/// One resolved call edge; the callsite belongs to the caller's span.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedCallEdge {
    pub caller: FuncId,
    pub callsite: CallsiteId,
    pub callee: FuncId,
}

/// The resolved graph with the adjacency the fixpoint needs.
#[derive(Debug, Default)]
pub struct MappedCallGraph {
    /// All edges, sorted by (caller, callsite, callee), de-duplicated.
    pub edges: Vec<MappedCallEdge>,
    callees_by_callsite: BTreeMap<CallsiteId, Vec<FuncId>>,
    callers_by_callee: BTreeMap<FuncId, Vec<FuncId>>,
}

impl MappedCallGraph {
    fn from_edges(mut edges: Vec<MappedCallEdge>) -> Self {
        edges.sort();
        edges.dedup();
        let mut callees_by_callsite: BTreeMap<CallsiteId, Vec<FuncId>> = BTreeMap::new();
        let mut callers_by_callee: BTreeMap<FuncId, Vec<FuncId>> = BTreeMap::new();
        for edge in &edges {
            callees_by_callsite
                .entry(edge.callsite.clone())
                .or_default()
                .push(edge.callee.clone());
            callers_by_callee
                .entry(edge.callee.clone())
                .or_default()
                .push(edge.caller.clone());
        }
        for callees in callees_by_callsite.values_mut() {
            callees.sort();
            callees.dedup();
        }
        for callers in callers_by_callee.values_mut() {
            callers.sort();
            callers.dedup();
        }
        Self {
            edges,
            callees_by_callsite,
            callers_by_callee,
        }
    }

    /// Callees linked to one callsite (imprecise graphs may have several;
    /// their effects union).
    pub fn callees_at(&self, callsite: &CallsiteId) -> &[FuncId] {
        self.callees_by_callsite
            .get(callsite)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Callers of a function, canonical order.
    pub fn callers_of(&self, callee: &FuncId) -> &[FuncId] {
        self.callers_by_callee
            .get(callee)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every function that appears in the mapped graph.
    pub fn functions(&self) -> BTreeSet<FuncId> {
        let mut set = BTreeSet::new();
        for edge in &self.edges {
            set.insert(edge.caller.clone());
            set.insert(edge.callee.clone());
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

pub struct CallGraphMapper<'a> {
    functions: &'a FunctionIndex,
    callsites: &'a CallsiteIndex,
    mode: PathResolution,
    /// Indexed source paths, for resolution and candidate listing.
    indexed_paths: Vec<String>,
}

impl<'a> CallGraphMapper<'a> {
    pub fn new(
        functions: &'a FunctionIndex,
        callsites: &'a CallsiteIndex,
        mode: PathResolution,
    ) -> Self {
        let indexed_paths = functions
            .paths()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            functions,
            callsites,
            mode,
            indexed_paths,
        }
    }

    /// Map an external graph. Lenient mode accumulates error diagnostics
    /// and returns what resolved; strict mode elevates any error to a
    /// consolidated failure.
    pub fn map(
        &self,
        graph: &ExternalCallGraph,
        sink: &mut DiagnosticSink,
    ) -> Result<MappedCallGraph> {
        let mut nodes: BTreeMap<&str, FuncId> = BTreeMap::new();
        let mut failures = 0usize;

        for node in &graph.nodes {
            match self.resolve_node(node, sink) {
                Some(func_id) => {
                    nodes.insert(node.id.as_str(), func_id);
                }
                None => failures += 1,
            }
        }

        let mut edges = Vec::new();
        for edge in &graph.edges {
            // Only `call` edges carry a mappable callsite.
            if edge.kind == Some(EdgeKind::Construct) {
                continue;
            }
            let (Some(caller), Some(callee)) = (
                nodes.get(edge.caller_id.as_str()),
                nodes.get(edge.callee_id.as_str()),
            ) else {
                // The unresolved node already produced a diagnostic.
                continue;
            };
            match self.resolve_callsite(edge, caller, sink) {
                Some(callsite) => edges.push(MappedCallEdge {
                    caller: caller.clone(),
                    callsite,
                    callee: callee.clone(),
                }),
                None => failures += 1,
            }
        }

        if self.mode == PathResolution::Strict && sink.has_errors() {
            return Err(FlowfactError::Resolution(format!(
                "{} call-graph resolution failure(s) in strict mode",
                sink.error_count()
            )));
        }

        debug!(
            mapped = edges.len(),
            failures, "mapped external call graph"
        );
        let mapped = MappedCallGraph::from_edges(edges);
        info!(
            edges = mapped.edges.len(),
            functions = mapped.functions().len(),
            "call graph ready"
        );
        Ok(mapped)
    }

    fn resolve_node(&self, node: &ExternalNode, sink: &mut DiagnosticSink) -> Option<FuncId> {
        let path = self.resolve_path(&node.file_path, &node.id, sink)?;
        match self
            .functions
            .by_span(&path, node.start_offset, node.end_offset)
        {
            Some(record) => Some(record.id.clone()),
            None => {
                let candidates = self.nearest_functions(&path, node.start_offset);
                sink.push(
                    Diagnostic::error(format!(
                        "no indexed function at {}:{}..{}; nearest: {}",
                        path,
                        node.start_offset,
                        node.end_offset,
                        format_candidates(&candidates)
                    ))
                    .with_file(node.file_path.clone())
                    .with_span(Span::new(node.start_offset, node.end_offset))
                    .with_subject(node.id.clone()),
                );
                None
            }
        }
    }

    fn resolve_callsite(
        &self,
        edge: &ExternalEdge,
        caller: &FuncId,
        sink: &mut DiagnosticSink,
    ) -> Option<CallsiteId> {
        let subject = format!("{}->{}", edge.caller_id, edge.callee_id);
        let path = self.resolve_path(&edge.callsite.file_path, &subject, sink)?;
        let span = Span::new(edge.callsite.start_offset, edge.callsite.end_offset);
        match self.callsites.by_span(&path, span) {
            Some(callsite) if callsite.func() == caller => Some(callsite.clone()),
            Some(callsite) => {
                sink.push(
                    Diagnostic::error(format!(
                        "callsite {} belongs to {}, not caller {}",
                        callsite.to_canon(),
                        callsite.func().to_canon(),
                        caller.to_canon()
                    ))
                    .with_file(edge.callsite.file_path.clone())
                    .with_span(span)
                    .with_subject(subject),
                );
                None
            }
            None => {
                let candidates: Vec<String> = self
                    .callsites
                    .nearest_in_func(caller, span, 3)
                    .into_iter()
                    .map(|c| c.to_canon())
                    .collect();
                sink.push(
                    Diagnostic::error(format!(
                        "no callsite matches span {}..{} in {}; nearest: {}",
                        span.start,
                        span.end,
                        caller.to_canon(),
                        format_candidates(&candidates)
                    ))
                    .with_file(edge.callsite.file_path.clone())
                    .with_span(span)
                    .with_subject(subject),
                );
                None
            }
        }
    }

    /// Resolve an external file path to an indexed path according to the
    /// configured mode.
    fn resolve_path(
        &self,
        raw: &str,
        subject: &str,
        sink: &mut DiagnosticSink,
    ) -> Option<String> {
        if self.indexed_paths.iter().any(|p| p == raw) {
            return Some(raw.to_string());
        }
        if self.mode == PathResolution::Strict {
            sink.push(
                Diagnostic::error(format!(
                    "path '{raw}' is not an indexed source path; nearest: {}",
                    format_candidates(&self.nearest_paths(raw))
                ))
                .with_file(raw.to_string())
                .with_subject(subject.to_string()),
            );
            return None;
        }

        // Lenient fallback chain, each step a warning.
        let normalized = normalize_path(raw);
        if self.indexed_paths.iter().any(|p| *p == normalized) {
            sink.push(
                Diagnostic::warning(format!(
                    "path '{raw}' matched '{normalized}' after normalization"
                ))
                .with_file(raw.to_string())
                .with_subject(subject.to_string()),
            );
            return Some(normalized);
        }

        let lowered = normalized.to_lowercase();
        let case_matches: Vec<&String> = self
            .indexed_paths
            .iter()
            .filter(|p| p.to_lowercase() == lowered)
            .collect();
        if case_matches.len() == 1 {
            let matched = case_matches[0].clone();
            sink.push(
                Diagnostic::warning(format!(
                    "path '{raw}' matched '{matched}' case-insensitively"
                ))
                .with_file(raw.to_string())
                .with_subject(subject.to_string()),
            );
            return Some(matched);
        }

        if let Some(matched) = self.suffix_match(&normalized) {
            sink.push(
                Diagnostic::warning(format!(
                    "path '{raw}' matched '{matched}' by segment suffix"
                ))
                .with_file(raw.to_string())
                .with_subject(subject.to_string()),
            );
            return Some(matched);
        }

        sink.push(
            Diagnostic::error(format!(
                "path '{raw}' does not resolve to any indexed source path; nearest: {}",
                format_candidates(&self.nearest_paths(raw))
            ))
            .with_file(raw.to_string())
            .with_subject(subject.to_string()),
        );
        None
    }

    /// Basename plus most-specific unique segment-suffix match.
    fn suffix_match(&self, normalized: &str) -> Option<String> {
        let segments: Vec<&str> = normalized.split('/').collect();
        let basename = segments.last()?;
        let with_basename: Vec<&String> = self
            .indexed_paths
            .iter()
            .filter(|p| p.rsplit('/').next() == Some(*basename))
            .collect();
        if with_basename.is_empty() {
            return None;
        }
        // Longest suffix of the input that a unique indexed path ends in.
        for take in (1..=segments.len()).rev() {
            let suffix = segments[segments.len() - take..].join("/");
            let matches: Vec<&&String> = with_basename
                .iter()
                .filter(|p| p.as_str() == suffix || p.ends_with(&format!("/{suffix}")))
                .collect();
            if matches.len() == 1 {
                return Some((*matches[0]).clone());
            }
        }
        None
    }

    fn nearest_paths(&self, raw: &str) -> Vec<String> {
        let basename = normalize_path(raw);
        let basename = basename.rsplit('/').next().unwrap_or("").to_string();
        let mut scored: Vec<(&String, u8)> = self
            .indexed_paths
            .iter()
            .map(|p| {
                let shares = p.rsplit('/').next() == Some(basename.as_str());
                (p, if shares { 0 } else { 1 })
            })
            .collect();
        scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        scored.into_iter().take(3).map(|(p, _)| p.clone()).collect()
    }

    fn nearest_functions(&self, path: &str, start: u32) -> Vec<String> {
        let mut in_file: Vec<&FuncId> = self
            .functions
            .ids()
            .filter(|id| id.path() == path)
            .collect();
        in_file.sort_by_key(|id| id.start().abs_diff(start));
        in_file.truncate(3);
        in_file.iter().map(|id| id.to_canon()).collect()
    }
}

fn format_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "(none)".to_string()
    } else {
        candidates.join(", ")
    }
}

/// Lenient path normalization: forward slashes, collapse `//`, strip
/// leading `./` and `/`.
fn normalize_path(raw: &str) -> String {
    let mut path = raw.replace('\\', "/");
    while path.contains("//") {
        path = path.replace("//", "/");
    }
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    path.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfact_ast::Program;
    use flowfact_frontend::languages::Language;
    use flowfact_frontend::FrontendEngine;
    use flowfact_ir::StatementIndex;

    fn indexes(sources: &[(&str, &str)]) -> (Program, FunctionIndex, StatementIndex, CallsiteIndex) {
        let engine = FrontendEngine::new();
        let mut files = Vec::new();
        for (path, source) in sources {
            let language = Language::from_extension(
                std::path::Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap(),
            )
            .unwrap();
            let (file, _) = engine.parse_source(path, language, source).unwrap();
            files.push(file);
        }
        let program = Program {
            schema_version: flowfact_ast::PROGRAM_SCHEMA_VERSION,
            files,
        };
        let functions = FunctionIndex::build(&program).unwrap();
        let statements = StatementIndex::build(&program, &functions).unwrap();
        let callsites = CallsiteIndex::build(&statements);
        (program, functions, statements, callsites)
    }

    /// Two files: b.ts defines `b`, a.ts's `a` calls it.
    fn two_file_fixture() -> (Program, FunctionIndex, StatementIndex, CallsiteIndex) {
        indexes(&[
            ("src/a.ts", "function a(x) { const v = b(x); return v; }"),
            ("src/b.ts", "function b(y) { return y; }"),
        ])
    }

    fn external_graph(functions: &FunctionIndex, callsites: &CallsiteIndex) -> ExternalCallGraph {
        let a = functions
            .records()
            .iter()
            .find(|r| r.name.as_deref() == Some("a"))
            .unwrap();
        let b = functions
            .records()
            .iter()
            .find(|r| r.name.as_deref() == Some("b"))
            .unwrap();
        // `b(x)` occupies bytes 26..30 of a.ts.
        ExternalCallGraph {
            schema_version: CALLGRAPH_SCHEMA_VERSION,
            nodes: vec![
                ExternalNode {
                    id: "n_a".into(),
                    name: Some("a".into()),
                    file_path: a.id.path().to_string(),
                    start_offset: a.id.start(),
                    end_offset: a.id.end(),
                },
                ExternalNode {
                    id: "n_b".into(),
                    name: Some("b".into()),
                    file_path: b.id.path().to_string(),
                    start_offset: b.id.start(),
                    end_offset: b.id.end(),
                },
            ],
            edges: vec![ExternalEdge {
                caller_id: "n_a".into(),
                callee_id: "n_b".into(),
                callsite: ExternalSpan {
                    file_path: "src/a.ts".into(),
                    start_offset: 26,
                    end_offset: 30,
                },
                kind: Some(EdgeKind::Call),
            }],
        }
    }

    #[test]
    fn test_strict_mapping_resolves_exact_paths() {
        let (_, functions, _, callsites) = two_file_fixture();
        let graph = external_graph(&functions, &callsites);
        let mapper = CallGraphMapper::new(&functions, &callsites, PathResolution::Strict);
        let mut sink = DiagnosticSink::new();
        let mapped = mapper.map(&graph, &mut sink).unwrap();
        assert_eq!(mapped.edges.len(), 1);
        assert!(!sink.has_errors());
        let edge = &mapped.edges[0];
        assert_eq!(edge.caller.path(), "src/a.ts");
        assert_eq!(edge.callee.path(), "src/b.ts");
        assert_eq!(edge.callsite.func(), &edge.caller);
    }

    #[test]
    fn test_strict_mode_fails_on_unknown_path() {
        let (_, functions, _, callsites) = two_file_fixture();
        let mut graph = external_graph(&functions, &callsites);
        graph.nodes[1].file_path = "SRC/b.ts".into();
        let mapper = CallGraphMapper::new(&functions, &callsites, PathResolution::Strict);
        let mut sink = DiagnosticSink::new();
        let err = mapper.map(&graph, &mut sink).unwrap_err();
        assert!(matches!(err, FlowfactError::Resolution(_)));
        assert!(sink.has_errors());
        // Candidates are part of the diagnostic text.
        let diag = sink.iter().next().unwrap();
        assert!(diag.message.contains("src/b.ts"));
    }

    #[test]
    fn test_lenient_mode_recovers_with_warnings() {
        let (_, functions, _, callsites) = two_file_fixture();
        let mut graph = external_graph(&functions, &callsites);
        graph.nodes[0].file_path = "./src//a.ts".into();
        graph.nodes[1].file_path = "SRC/b.ts".into();
        graph.edges[0].callsite.file_path = "./src/a.ts".into();
        let mapper = CallGraphMapper::new(&functions, &callsites, PathResolution::Lenient);
        let mut sink = DiagnosticSink::new();
        let mapped = mapper.map(&graph, &mut sink).unwrap();
        assert_eq!(mapped.edges.len(), 1);
        assert!(!sink.has_errors());
        assert!(sink.warning_count() >= 2);
    }

    #[test]
    fn test_suffix_match_picks_unique_path() {
        let (_, functions, _, callsites) = two_file_fixture();
        let mut graph = external_graph(&functions, &callsites);
        graph.nodes[1].file_path = "repo/src/b.ts".into();
        let mapper = CallGraphMapper::new(&functions, &callsites, PathResolution::Lenient);
        let mut sink = DiagnosticSink::new();
        let mapped = mapper.map(&graph, &mut sink).unwrap();
        assert_eq!(mapped.edges.len(), 1);
        assert!(sink
            .iter()
            .any(|d| d.message.contains("segment suffix")));
    }

    #[test]
    fn test_construct_edges_are_skipped() {
        let (_, functions, _, callsites) = two_file_fixture();
        let mut graph = external_graph(&functions, &callsites);
        graph.edges[0].kind = Some(EdgeKind::Construct);
        let mapper = CallGraphMapper::new(&functions, &callsites, PathResolution::Strict);
        let mut sink = DiagnosticSink::new();
        let mapped = mapper.map(&graph, &mut sink).unwrap();
        assert!(mapped.edges.is_empty());
        assert!(!sink.has_errors());
    }

    #[test]
    fn test_callsite_outside_caller_is_an_error() {
        let (_, functions, _, callsites) = two_file_fixture();
        let mut graph = external_graph(&functions, &callsites);
        // Swap caller and callee: the callsite now lies outside `b`.
        graph.edges[0].caller_id = "n_b".into();
        graph.edges[0].callee_id = "n_a".into();
        let mapper = CallGraphMapper::new(&functions, &callsites, PathResolution::Lenient);
        let mut sink = DiagnosticSink::new();
        let mapped = mapper.map(&graph, &mut sink).unwrap();
        assert!(mapped.edges.is_empty());
        assert!(sink.has_errors());
    }

    #[test]
    fn test_schema_validation() {
        assert!(parse_call_graph("{}").is_err());
        assert!(parse_call_graph(
            r#"{"schemaVersion":2,"nodes":[],"edges":[]}"#
        )
        .is_err());
        assert!(parse_call_graph(
            r#"{"schemaVersion":1,"nodes":[],"edges":[],"extra":1}"#
        )
        .is_err());
        let ok = parse_call_graph(r#"{"schemaVersion":1,"nodes":[],"edges":[]}"#).unwrap();
        assert!(ok.nodes.is_empty());
        // Edge referencing a missing node.
        assert!(parse_call_graph(
            r#"{"schemaVersion":1,"nodes":[],"edges":[{"callerId":"x","calleeId":"y","callsite":{"filePath":"a.ts","startOffset":0,"endOffset":1}}]}"#
        )
        .is_err());
    }

    #[test]
    fn test_multiple_callees_union_at_one_callsite() {
        let (_, functions, _, callsites) = indexes(&[
            ("src/a.ts", "function a(x) { const v = b(x); return v; }"),
            ("src/b.ts", "function b(y) { return y; }"),
            ("src/c.ts", "function c(z) { return z; }"),
        ]);
        let a = functions
            .records()
            .iter()
            .find(|r| r.name.as_deref() == Some("a"))
            .unwrap();
        let mut graph = external_graph(&functions, &callsites);
        let c = functions
            .records()
            .iter()
            .find(|r| r.name.as_deref() == Some("c"))
            .unwrap();
        graph.nodes.push(ExternalNode {
            id: "n_c".into(),
            name: Some("c".into()),
            file_path: c.id.path().to_string(),
            start_offset: c.id.start(),
            end_offset: c.id.end(),
        });
        let mut second = graph.edges[0].clone();
        second.callee_id = "n_c".into();
        graph.edges.push(second);

        let mapper = CallGraphMapper::new(&functions, &callsites, PathResolution::Strict);
        let mut sink = DiagnosticSink::new();
        let mapped = mapper.map(&graph, &mut sink).unwrap();
        assert_eq!(mapped.edges.len(), 2);
        let callsite = callsites.of_func(&a.id)[0].clone();
        assert_eq!(mapped.callees_at(&callsite).len(), 2);
    }
}
