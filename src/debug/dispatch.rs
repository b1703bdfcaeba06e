//! Named-function table of the debug runtime
//!
//! | Name | Arguments | Return |
//! |------|-----------|--------|
//! | `debug_run` | `(int index)` | float seconds |
//! | `run_individual` | `(int number, int repeat, int min_repeat_ms)` | null |
//! | `get_output_by_layer` | `(int index, int slot)` | tensor |
//! | `debug_get_output` | `(int\|str node, tensor out)` | null |
//!
//! Anything else goes to the wrapped executor.

use crate::check_ge;
use crate::debug::GraphRuntimeDebug;
use crate::error::{DebugResult, DebugRuntimeError};
use crate::packed::{ArgValue, CallArgs, PackedDispatch};
use crate::runtime::GraphExecutor;

const FUNCTIONS: &[&str] = &[
    "debug_run",
    "run_individual",
    "get_output_by_layer",
    "debug_get_output",
];

fn non_negative(args: &CallArgs, index: usize) -> DebugResult<usize> {
    let value = args.int(index)?;
    check_ge!(value, 0);
    Ok(value as usize)
}

impl<E: GraphExecutor> GraphRuntimeDebug<E> {
    /// Node index from an `int` or `str` argument slot
    fn node_selector(&self, args: &CallArgs, index: usize) -> DebugResult<usize> {
        match args.get(index)? {
            ArgValue::Str(name) => self.node_index(name),
            ArgValue::Int(_) => non_negative(args, index),
            other => Err(DebugRuntimeError::ArgTypeMismatch {
                index,
                expected: "int or str",
                actual: other.type_name(),
            }),
        }
    }
}

impl<E: GraphExecutor> PackedDispatch for GraphRuntimeDebug<E> {
    fn type_key(&self) -> &'static str {
        "GraphRuntimeDebug"
    }

    fn has_function(&self, name: &str) -> bool {
        FUNCTIONS.contains(&name) || self.executor().has_function(name)
    }

    fn invoke(&mut self, name: &str, args: &CallArgs) -> DebugResult<ArgValue> {
        match name {
            "debug_run" => {
                let index = non_negative(args, 0)?;
                Ok(ArgValue::Float(self.debug_run(index)?))
            }
            "run_individual" => {
                let number = args.int(0)?;
                let repeat = args.int(1)?;
                let min_repeat_ms = args.int(2)?;
                self.run_individual(number, repeat, min_repeat_ms)?;
                Ok(ArgValue::Null)
            }
            "get_output_by_layer" => {
                let index = non_negative(args, 0)?;
                let slot = non_negative(args, 1)?;
                Ok(ArgValue::Tensor(self.get_output_by_layer(index, slot)?))
            }
            "debug_get_output" => {
                let index = self.node_selector(args, 0)?;
                let out = args.tensor(1)?;
                self.debug_get_output(index, out)?;
                Ok(ArgValue::Null)
            }
            other => self.executor_mut().invoke(other, args),
        }
    }
}
