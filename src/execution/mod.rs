//! The interactive execution context: scoped runs, result history, and the
//! cursor analysis behind completion and inspection.

pub mod coding;
pub mod context;
pub mod results;
pub mod run;

pub use context::ExecutionContext;
pub use results::{ExecutionError, ExecutionResult};
