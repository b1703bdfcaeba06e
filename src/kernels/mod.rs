//! Kernel modules bound by the base executor
//!
//! - `host`: element-wise f32 kernels running on the calling thread

pub mod host;

pub use host::HostKernelModule;
