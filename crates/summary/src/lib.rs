//! Function summaries: schema, normalization, the extractor boundary and
//! the content-addressed on-disk cache.
//!
//! A summary is the per-function edge set the interprocedural fixpoint
//! consumes. The cheap static pass produces the baseline; an extractor
//! (the shipped baseline one, or an external LLM-backed one speaking the
//! request/response schema) may add edges on top. Normalization validates
//! every edge against the function's IR and enforces the baseline
//! coverage invariant, so nothing an extractor does can drop baseline
//! semantics.

pub mod cache;
pub mod extractor;
pub mod normalize;
pub mod schema;

pub use cache::SummaryCache;
pub use extractor::{BaselineExtractor, SummaryExtractor, SummaryRequest, SummaryResponse};
pub use normalize::{normalize_summary, SummaryError};
pub use schema::{FuncSummary, SUMMARY_SCHEMA_VERSION};
