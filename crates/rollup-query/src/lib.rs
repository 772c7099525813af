//! # rollup-query
//!
//! The RUN-phase query surface: a JSON query document model, a router that
//! picks a rollup cube or falls back to the generic analytical engine, and
//! the two executors themselves.

pub mod fallback_executor;
pub mod query;
pub mod result;
pub mod rollup_executor;
pub mod router;
pub mod sort;

pub use query::{Query, QueryDocument};
pub use result::{Cell, QueryResult};
pub use router::{route, Route};
