//! Error taxonomy shared by every pipeline stage.
//!
//! Categories follow the propagation policy: schema-level failures abort
//! the current unit (one function summary, one mapped edge) and either
//! fail fast (strict modes) or accumulate as diagnostics (lenient modes).
//! Nothing in the core retries.

use thiserror::Error;

/// Top-level error for the flowfact pipeline.
#[derive(Debug, Error)]
pub enum FlowfactError {
    /// Malformed or non-canonical identifier string.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Unknown key, missing key, or wrong value type in an external schema.
    #[error("schema violation: {0}")]
    Schema(String),

    /// A structural invariant did not hold (duplicate span, anchor outside
    /// its function, undeclared variable, ...).
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Call-graph node or callsite could not be resolved to the index.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// A configured hard bound (maxEdges, maxFanoutPerSource) was hit.
    #[error("bounds exceeded: {0}")]
    BoundsExceeded(String),

    /// A summary is missing edges the cheap static pass produced.
    #[error("baseline coverage missing: {0}")]
    BaselineCoverageMissing(String),

    /// The interprocedural worklist ran past its safety rail.
    #[error("fixpoint overflow: exceeded {0} steps")]
    FixpointOverflow(u64),

    /// Cache or output I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlowfactError>;

impl FlowfactError {
    /// Stable category name, used in diagnostics and tests.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidId(_) => "invalid_id",
            Self::Schema(_) => "schema_violation",
            Self::Invariant(_) => "invariant_violation",
            Self::Resolution(_) => "resolution",
            Self::BoundsExceeded(_) => "bounds_exceeded",
            Self::BaselineCoverageMissing(_) => "baseline_coverage_missing",
            Self::FixpointOverflow(_) => "fixpoint_overflow",
            Self::Io(_) => "io",
        }
    }
}
