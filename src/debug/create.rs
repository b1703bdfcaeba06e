//! Global create entry points for the debug runtime
//!
//! `cvm.graph_runtime_debug.create(graph_json, module, type0, id0, ...)`
//! `cvm.graph_runtime_debug.remote_create(graph_json, handle, type0, id0, ...)`
//!
//! Each device context takes two trailing integer fields, so a valid call
//! has at least four arguments. `remote_create` receives the kernel
//! module behind an opaque handle instead of a module slot.

use tracing::info;

use crate::debug::DebugRuntimeBuilder;
use crate::device::{Device, DeviceKind};
use crate::error::{DebugResult, DebugRuntimeError};
use crate::packed::{ArgValue, CallArgs, Module, PackedFunc};
use crate::{check_eq, check_ge};

pub const CREATE_NAME: &str = "cvm.graph_runtime_debug.create";
pub const REMOTE_CREATE_NAME: &str = "cvm.graph_runtime_debug.remote_create";

/// Entry points installed into the global registry on first use
pub fn builtin_functions() -> Vec<(&'static str, PackedFunc)> {
    vec![
        (CREATE_NAME, PackedFunc::new(create)),
        (REMOTE_CREATE_NAME, PackedFunc::new(remote_create)),
    ]
}

fn create(args: &CallArgs) -> DebugResult<ArgValue> {
    check_ge!(
        args.num_args(),
        4,
        "The expected number of arguments for graph_runtime.create is at least 4, but it has {}",
        args.num_args()
    );
    let graph_json = args.str(0)?;
    let module = args.module(1)?;
    let devices = context_args(args)?;
    create_module(graph_json, module, &devices)
}

fn remote_create(args: &CallArgs) -> DebugResult<ArgValue> {
    check_ge!(
        args.num_args(),
        4,
        "The expected number of arguments for graph_runtime.remote_create is at least 4, but it has {}",
        args.num_args()
    );
    let graph_json = args.str(0)?;
    let module = args
        .handle(1)?
        .downcast_ref::<Module>()
        .ok_or(DebugRuntimeError::ArgTypeMismatch {
            index: 1,
            expected: "module handle",
            actual: "handle",
        })?;
    let devices = context_args(args)?;
    create_module(graph_json, module, &devices)
}

/// Decode the trailing `(device_type, device_id)` pairs
pub fn context_args(args: &CallArgs) -> DebugResult<Vec<Device>> {
    let num_fields = args.num_args().saturating_sub(2);
    check_eq!(
        num_fields % 2,
        0,
        "device contexts are (device_type, device_id) pairs"
    );
    let mut devices = Vec::with_capacity(num_fields / 2);
    for i in (2..args.num_args()).step_by(2) {
        let kind = DeviceKind::try_from(args.int(i)?)?;
        let ordinal = args.int(i + 1)?;
        check_ge!(ordinal, 0);
        let ordinal = u32::try_from(ordinal).map_err(|_| {
            DebugRuntimeError::CheckFailed(format!("device id {} out of range", ordinal))
        })?;
        devices.push(Device::new(kind, ordinal));
    }
    Ok(devices)
}

fn create_module(graph_json: &str, module: &Module, devices: &[Device]) -> DebugResult<ArgValue> {
    let debug_rt = DebugRuntimeBuilder::new().build(graph_json, module, devices)?;
    info!(
        "created GraphRuntimeDebug with {} nodes on {} device(s)",
        debug_rt.num_nodes(),
        devices.len()
    );
    Ok(ArgValue::Module(Module::new(debug_rt)))
}
