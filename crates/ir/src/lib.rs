//! Indexing, IR construction and the cheap static pass.
//!
//! This crate turns frontend syntax trees into the pipeline's working
//! representation:
//! 1. Index every function, statement site and callsite (by id and span)
//! 2. Lower each function body into a normalized, bounded IR
//! 3. Run the cheap static pass: baseline dependency edges plus a coarse
//!    per-variable heap anchor map

pub mod builder;
pub mod cheap;
pub mod edge;
pub mod index;
pub mod model;
pub mod normalize;

pub use builder::build_ir;
pub use cheap::{cheap_pass, ArgAnchor, CallsiteInfo, CheapPassResult};
pub use edge::{Edge, FlowNode};
pub use index::{CallsiteIndex, FunctionIndex, SiteKind, SiteTable, StatementIndex};
pub use model::{AllocKind, FuncIr, IrStmt, LitValue, PropertyKey, Rvalue, ShortCircuitOp};
pub use normalize::normalize_ir;
