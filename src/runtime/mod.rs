//! Base executor: the capability contract and its reference implementation.

pub mod executor;
pub mod graph_runtime;

pub use executor::{GraphExecutor, OpExec};
pub use graph_runtime::GraphRuntime;
