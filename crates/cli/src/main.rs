//! The `flowfact` binary.
//!
//! Wires the bundled frontend (or an external program dump) into the
//! analysis pipeline and prints diagnostics in canonical order. Exit
//! codes: 0 on success, 1 on argument or analysis failure.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use flowfact_analyzer::{analyze_program, AnalyzeOptions};
use flowfact_common::{AnalysisConfig, DiagLevel, Diagnostic, PathResolution};
use flowfact_frontend::{resolve_repo_root, FrontendEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Deterministic dataflow fact generation for JavaScript/TypeScript.
///
/// Ingests a parsed program and an externally supplied call graph, then
/// emits a canonical set of possible-flow facts as JSONL.
#[derive(Debug, Parser)]
#[command(name = "flowfact", version, about, max_term_width = 100)]
struct Args {
    /// Project root; its JS/TS sources form the analysis input.
    #[arg(long, value_name = "DIR")]
    repo: Option<PathBuf>,

    /// tsconfig.json whose directory is the project root.
    #[arg(long, value_name = "FILE")]
    tsconfig: Option<PathBuf>,

    /// External call graph (schema v1 JSON). Required.
    #[arg(long, value_name = "FILE")]
    callgraph: PathBuf,

    /// Output path for flow-facts JSONL. Required.
    #[arg(long, value_name = "FILE")]
    out: PathBuf,

    /// Optional output path for call-chain witnesses JSONL.
    #[arg(long, value_name = "FILE")]
    witness: Option<PathBuf>,

    /// Optional directory for per-function explain bundles.
    #[arg(long, value_name = "DIR")]
    explain: Option<PathBuf>,

    /// Load a frontend-produced program JSON instead of parsing sources.
    #[arg(long, value_name = "FILE")]
    program: Option<PathBuf>,

    /// Summary cache root.
    #[arg(long, value_name = "DIR", default_value = ".flowfact/cache")]
    cache_dir: PathBuf,

    /// Resolve call-graph paths leniently (default is strict).
    #[arg(long)]
    lenient_paths: bool,

    /// Safety rail for the interprocedural fixpoint.
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Worker threads for IR construction and the cheap pass.
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// More logging (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    // clap's default exit code for argument errors is 2; the contract is
    // 0 for success (help/version included) and 1 for any failure.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(args.verbose, args.quiet);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    if args.repo.is_none() && args.tsconfig.is_none() && args.program.is_none() {
        bail!("one of --repo, --tsconfig or --program is required");
    }

    let mut config = AnalysisConfig {
        cache_root: args.cache_dir.clone(),
        path_resolution: if args.lenient_paths {
            PathResolution::Lenient
        } else {
            PathResolution::Strict
        },
        jobs: args.jobs,
        ..AnalysisConfig::default()
    };
    if let Some(max_steps) = args.max_steps {
        config.max_fixpoint_steps = max_steps;
    }
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("configuring worker threads")?;
    }

    let mut frontend_diags = Vec::new();
    let program = match &args.program {
        Some(path) => flowfact_ast::load_program(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let root = resolve_repo_root(args.repo.as_deref(), args.tsconfig.as_deref())?;
            let engine = FrontendEngine::new();
            let (program, stats, diags) = engine
                .parse_repo(&root)
                .with_context(|| format!("parsing {}", root.display()))?;
            info!(
                parsed = stats.files_parsed,
                failed = stats.files_failed,
                functions = stats.functions,
                "frontend finished"
            );
            frontend_diags = diags;
            program
        }
    };

    let options = AnalyzeOptions {
        config,
        callgraph: args.callgraph.clone(),
        out: args.out.clone(),
        witness: args.witness.clone(),
        explain: args.explain.clone(),
    };
    let outcome = analyze_program(&program, &options)?;

    for diag in frontend_diags.iter().chain(outcome.diagnostics.iter()) {
        print_diagnostic(diag);
    }

    let s = &outcome.summary;
    eprintln!(
        "{} {} file(s), {} function(s), {} mapped edge(s), {} fact(s) -> {}",
        "done:".green().bold(),
        s.files,
        s.functions,
        s.mapped_edges,
        s.facts,
        args.out.display()
    );
    Ok(())
}

fn print_diagnostic(diag: &Diagnostic) {
    let level = match diag.level {
        DiagLevel::Warning => "warning:".yellow().bold(),
        DiagLevel::Error => "error:".red().bold(),
    };
    // Diagnostic's Display already carries location and subject.
    let text = diag.to_string();
    let text = text
        .strip_prefix("warning: ")
        .or_else(|| text.strip_prefix("error: "))
        .unwrap_or(&text);
    eprintln!("{level} {text}");
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
