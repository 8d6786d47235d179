//! Tool invocation subsystem: a name-keyed registry plus dispatch, retry, and
//! observation formatting for individual calls.

mod execution;
mod registry;

pub use execution::{execute_tool, merge_args, Observation};
pub use registry::ToolRegistry;
