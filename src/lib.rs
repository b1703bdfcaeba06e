//! graph-runtime-debug - Debug instrumentation for a graph executor
//!
//! Wraps a base graph executor with per-operator timing, an adaptive
//! benchmark loop and intermediate output inspection, all reachable
//! through a string-keyed packed-function ABI.

#![allow(clippy::needless_range_loop)] // Node-index loops read clearer than iterator chains
#![allow(clippy::type_complexity)] // Boxed closures and shared trait objects

pub mod debug;
pub mod device;
pub mod error;
pub mod graph;
pub mod kernels;
pub mod logging;
pub mod packed;
pub mod profiling;
pub mod registry;
pub mod runtime;
pub mod tensor;

pub use debug::{DebugRuntimeBuilder, GraphRuntimeDebug, CREATE_NAME, REMOTE_CREATE_NAME};
pub use device::{Device, DeviceApiTable, DeviceKind, DeviceSync};
pub use error::{DebugResult, DebugRuntimeError, ErrorCategory};
pub use graph::GraphJson;
pub use kernels::HostKernelModule;
pub use packed::{ArgValue, CallArgs, Module, OpaqueHandle, PackedDispatch, PackedFunc};
pub use profiling::{BenchmarkConfig, BenchmarkReport, Clock, MonotonicClock, OpTimer, ScopedTimer};
pub use runtime::{GraphExecutor, GraphRuntime};
pub use tensor::{DType, NdArray};
