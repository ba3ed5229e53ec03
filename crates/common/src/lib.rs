//! Shared foundation for the flowfact pipeline.
//!
//! This crate holds everything more than one pipeline stage needs:
//! - the error taxonomy and diagnostics accumulation
//! - the analysis configuration
//! - byte-offset spans
//! - the identifier algebra (function, statement, callsite, variable and
//!   heap-bucket identifiers with strict parse/stringify round-trips)
//! - the determinism kernel (canonical JSON, stable sort, content hashing)

pub mod canon;
pub mod config;
pub mod diag;
pub mod error;
pub mod ids;
pub mod span;

pub use config::{AnalysisConfig, PathResolution, ANALYSIS_CONFIG_VERSION};
pub use diag::{DiagLevel, Diagnostic, DiagnosticSink};
pub use error::{FlowfactError, Result};
pub use ids::{CallsiteId, FuncId, HeapId, PropName, StmtId, VarId};
pub use span::Span;
