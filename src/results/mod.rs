//! Result types for per-source outcomes
//!
//! Records returned by external sources, the per-source [`SourceResult`], and a
//! container that merges records across sources before synthesis.

mod container;
mod types;

pub use container::RecordSet;
pub use types::*;
