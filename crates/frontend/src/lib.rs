//! Tree-sitter based JavaScript/TypeScript frontend for flowfact.
//!
//! Produces the `flowfact-ast` interface model the core pipeline consumes:
//! - walks a repo for source files (skipping dependency and build output)
//! - parses files in parallel with tree-sitter grammars
//! - lowers each CST into function/statement syntax trees with byte spans
//!
//! Parse failures degrade to diagnostics; a file that fails to read or
//! parse is skipped, not fatal.

pub mod languages;
pub mod lower;
pub mod walker;

use anyhow::{Context, Result};
use flowfact_ast::{Program, SourceFile, PROGRAM_SCHEMA_VERSION};
use flowfact_common::{DiagLevel, Diagnostic};
use languages::{get_language, Language};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use tree_sitter::Parser;

/// Statistics from one frontend run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseStats {
    pub files_parsed: usize,
    pub files_failed: usize,
    pub files_with_errors: usize,
    pub functions: usize,
}

/// The bundled frontend.
pub struct FrontendEngine {
    max_file_size: usize,
}

impl Default for FrontendEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontendEngine {
    pub fn new() -> Self {
        Self {
            max_file_size: 2 * 1024 * 1024,
        }
    }

    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Parse a single source string into its interface form.
    pub fn parse_source(
        &self,
        rel_path: &str,
        language: Language,
        source: &str,
    ) -> Result<(SourceFile, bool)> {
        let mut parser = Parser::new();
        parser
            .set_language(&get_language(language))
            .context("loading grammar")?;
        let tree = parser
            .parse(source, None)
            .with_context(|| format!("parsing {rel_path}"))?;
        let had_errors = tree.root_node().has_error();
        if had_errors {
            debug!("parse errors in {rel_path}");
        }
        Ok((
            lower::lower_file(rel_path, source.as_bytes(), tree.root_node()),
            had_errors,
        ))
    }

    /// Parse every supported file under `root` in parallel, producing a
    /// program with files in canonical path order.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub fn parse_repo(&self, root: &Path) -> Result<(Program, ParseStats, Vec<Diagnostic>)> {
        let files = walker::collect_files(root)?;
        info!("parsing {} source files", files.len());

        let results: Vec<(String, std::result::Result<(SourceFile, bool), String>)> = files
            .par_iter()
            .map(|(abs, rel)| {
                let outcome = self.parse_one(abs, rel);
                (rel.clone(), outcome)
            })
            .collect();

        let mut program = Program {
            schema_version: PROGRAM_SCHEMA_VERSION,
            files: Vec::new(),
        };
        let mut stats = ParseStats::default();
        let mut diagnostics = Vec::new();

        // `files` was sorted before the parallel map, so this merge keeps
        // canonical path order.
        for (rel, outcome) in results {
            match outcome {
                Ok((file, had_errors)) => {
                    stats.files_parsed += 1;
                    stats.functions += file.functions.len();
                    if had_errors {
                        stats.files_with_errors += 1;
                        diagnostics.push(
                            Diagnostic::warning("source file has syntax errors; analysis covers the recovered tree")
                                .with_file(rel),
                        );
                    }
                    program.files.push(file);
                }
                Err(message) => {
                    stats.files_failed += 1;
                    warn!("skipping {rel}: {message}");
                    diagnostics.push(Diagnostic {
                        level: DiagLevel::Warning,
                        file: Some(rel),
                        span: None,
                        subject: None,
                        message,
                    });
                }
            }
        }

        Ok((program, stats, diagnostics))
    }

    fn parse_one(
        &self,
        abs: &Path,
        rel: &str,
    ) -> std::result::Result<(SourceFile, bool), String> {
        let ext = abs.extension().and_then(|e| e.to_str()).unwrap_or("");
        let language =
            Language::from_extension(ext).ok_or_else(|| format!("unsupported extension '{ext}'"))?;
        let source = std::fs::read_to_string(abs).map_err(|e| format!("read failed: {e}"))?;
        if source.len() > self.max_file_size {
            return Err(format!(
                "file exceeds size limit ({} > {} bytes)",
                source.len(),
                self.max_file_size
            ));
        }
        self.parse_source(rel, language, &source)
            .map_err(|e| format!("parse failed: {e}"))
    }
}

/// Resolve the repo root from CLI arguments: an explicit repo directory,
/// or the directory containing a tsconfig file.
pub fn resolve_repo_root(repo: Option<&Path>, tsconfig: Option<&Path>) -> Result<PathBuf> {
    if let Some(repo) = repo {
        return Ok(repo.to_path_buf());
    }
    let tsconfig = tsconfig.context("either --repo or --tsconfig is required")?;
    let parent = tsconfig
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_repo_produces_sorted_program() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/b.ts"),
            "export function g(x: number) { return x; }",
        )
        .unwrap();
        fs::write(dir.path().join("src/a.js"), "function f(y) { return y; }").unwrap();

        let engine = FrontendEngine::new();
        let (program, stats, diags) = engine.parse_repo(dir.path()).unwrap();
        assert_eq!(stats.files_parsed, 2);
        assert_eq!(stats.files_failed, 0);
        assert!(diags.is_empty());
        let paths: Vec<&str> = program.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.js", "src/b.ts"]);
        assert_eq!(stats.functions, 2);
    }

    #[test]
    fn test_syntax_errors_become_warnings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.js"), "function ( { ").unwrap();
        let engine = FrontendEngine::new();
        let (_, stats, diags) = engine.parse_repo(dir.path()).unwrap();
        assert_eq!(stats.files_parsed, 1);
        assert_eq!(stats.files_with_errors, 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].level, DiagLevel::Warning);
    }

    #[test]
    fn test_repo_root_resolution() {
        let root = resolve_repo_root(Some(Path::new("/tmp/proj")), None).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/proj"));
        let root =
            resolve_repo_root(None, Some(Path::new("/tmp/proj/tsconfig.json"))).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/proj"));
        assert!(resolve_repo_root(None, None).is_err());
    }
}
