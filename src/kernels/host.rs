//! Host (CPU) element-wise f32 kernels exposed as a packed-function module
//!
//! Calling convention: `[inputs..., outputs...]`, all float32 tensors with
//! identical element counts.
//! - Binary: `add`, `subtract`, `multiply`
//! - Unary: `relu`, `negative`, `copy`

use crate::error::DebugResult;
use crate::kernel_error;
use crate::packed::{ArgValue, CallArgs, Module, PackedDispatch};

const BINARY: &[&str] = &["add", "subtract", "multiply"];
const UNARY: &[&str] = &["relu", "negative", "copy"];

#[derive(Debug, Default)]
pub struct HostKernelModule;

impl HostKernelModule {
    pub fn module() -> Module {
        Module::new(HostKernelModule)
    }

    pub fn kernel_names() -> impl Iterator<Item = &'static str> {
        BINARY.iter().chain(UNARY.iter()).copied()
    }
}

impl PackedDispatch for HostKernelModule {
    fn type_key(&self) -> &'static str {
        "HostKernelModule"
    }

    fn has_function(&self, name: &str) -> bool {
        BINARY.contains(&name) || UNARY.contains(&name)
    }

    fn invoke(&mut self, name: &str, args: &CallArgs) -> DebugResult<ArgValue> {
        if BINARY.contains(&name) {
            binary(name, args)?;
        } else if UNARY.contains(&name) {
            unary(name, args)?;
        } else {
            return Err(kernel_error!(name, "no such host kernel"));
        }
        Ok(ArgValue::Null)
    }
}

fn expect_arity(name: &str, args: &CallArgs, arity: usize) -> DebugResult<()> {
    if args.num_args() != arity {
        return Err(kernel_error!(
            name,
            "expected {} tensor arguments, got {}",
            arity,
            args.num_args()
        ));
    }
    Ok(())
}

fn binary(name: &str, args: &CallArgs) -> DebugResult<()> {
    expect_arity(name, args, 3)?;
    let lhs = args.tensor(0)?.to_f32_vec()?;
    let rhs = args.tensor(1)?.to_f32_vec()?;
    let out = args.tensor(2)?;
    if lhs.len() != rhs.len() || lhs.len() != out.element_count() {
        return Err(kernel_error!(
            name,
            "element count mismatch: {} vs. {} -> {}",
            lhs.len(),
            rhs.len(),
            out.element_count()
        ));
    }
    let f: fn(f32, f32) -> f32 = match name {
        "add" => |a, b| a + b,
        "subtract" => |a, b| a - b,
        _ => |a, b| a * b,
    };
    let result: Vec<f32> = lhs.iter().zip(&rhs).map(|(&a, &b)| f(a, b)).collect();
    out.write_f32(&result)
}

fn unary(name: &str, args: &CallArgs) -> DebugResult<()> {
    expect_arity(name, args, 2)?;
    let input = args.tensor(0)?.to_f32_vec()?;
    let out = args.tensor(1)?;
    if input.len() != out.element_count() {
        return Err(kernel_error!(
            name,
            "element count mismatch: {} -> {}",
            input.len(),
            out.element_count()
        ));
    }
    let f: fn(f32) -> f32 = match name {
        "relu" => |x| x.max(0.0),
        "negative" => |x| -x,
        _ => |x| x,
    };
    let result: Vec<f32> = input.into_iter().map(f).collect();
    out.write_f32(&result)
}
