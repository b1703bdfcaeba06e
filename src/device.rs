//! Device descriptors and the device-synchronization primitive.
//!
//! Every timed region in the debug runtime is closed by a sync on the
//! device that executed it, so measured latencies include device-side
//! completion and not only host-side submission.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::error::{DebugResult, DebugRuntimeError};

/// Device type, numbered like the DLPack device codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
    OpenCl,
    Vulkan,
    Metal,
}

impl DeviceKind {
    pub fn code(self) -> i64 {
        match self {
            DeviceKind::Cpu => 1,
            DeviceKind::Gpu => 2,
            DeviceKind::OpenCl => 4,
            DeviceKind::Vulkan => 7,
            DeviceKind::Metal => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Gpu => "gpu",
            DeviceKind::OpenCl => "opencl",
            DeviceKind::Vulkan => "vulkan",
            DeviceKind::Metal => "metal",
        }
    }
}

impl TryFrom<i64> for DeviceKind {
    type Error = DebugRuntimeError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(DeviceKind::Cpu),
            2 => Ok(DeviceKind::Gpu),
            4 => Ok(DeviceKind::OpenCl),
            7 => Ok(DeviceKind::Vulkan),
            8 => Ok(DeviceKind::Metal),
            other => Err(DebugRuntimeError::UnknownDeviceType(other)),
        }
    }
}

/// Device descriptor `(device_kind, device_ordinal)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    pub kind: DeviceKind,
    pub ordinal: u32,
}

impl Device {
    pub const fn new(kind: DeviceKind, ordinal: u32) -> Self {
        Device { kind, ordinal }
    }

    pub const fn cpu() -> Self {
        Device::new(DeviceKind::Cpu, 0)
    }

    pub fn is_cpu(&self) -> bool {
        self.kind == DeviceKind::Cpu
    }
}

impl Default for Device {
    fn default() -> Self {
        Device::cpu()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.name(), self.ordinal)
    }
}

/// Barrier that blocks until all work enqueued on a device is complete
pub trait DeviceSync: Send + Sync {
    fn synchronize(&self, device: Device) -> DebugResult<()>;
}

/// Host execution is synchronous: nothing to wait for
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuSync;

impl DeviceSync for CpuSync {
    fn synchronize(&self, _device: Device) -> DebugResult<()> {
        Ok(())
    }
}

/// Per-kind table of sync primitives
///
/// CPU is always registered as a no-op. Accelerator backends register
/// their own primitive; syncing a kind with no entry is an error rather
/// than a silent no-op, since it would make timings meaningless.
#[derive(Clone)]
pub struct DeviceApiTable {
    apis: HashMap<DeviceKind, Arc<dyn DeviceSync>>,
}

impl DeviceApiTable {
    pub fn new() -> Self {
        let mut apis: HashMap<DeviceKind, Arc<dyn DeviceSync>> = HashMap::new();
        apis.insert(DeviceKind::Cpu, Arc::new(CpuSync));
        DeviceApiTable { apis }
    }

    /// Register (or replace) the sync primitive for a device kind
    pub fn register(&mut self, kind: DeviceKind, api: Arc<dyn DeviceSync>) {
        self.apis.insert(kind, api);
    }

    pub fn with_api(mut self, kind: DeviceKind, api: Arc<dyn DeviceSync>) -> Self {
        self.register(kind, api);
        self
    }

    pub fn supports(&self, kind: DeviceKind) -> bool {
        self.apis.contains_key(&kind)
    }

    pub fn synchronize(&self, device: Device) -> DebugResult<()> {
        let api = self.apis.get(&device.kind).ok_or_else(|| {
            DebugRuntimeError::DeviceUnavailable(format!(
                "no device API registered for {}",
                device
            ))
        })?;
        api.synchronize(device)
    }
}

impl Default for DeviceApiTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceApiTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.apis.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("DeviceApiTable").field("kinds", &kinds).finish()
    }
}

/// Process-wide table consulted by the registry's create entry points
static GLOBAL_DEVICE_API: Lazy<RwLock<DeviceApiTable>> =
    Lazy::new(|| RwLock::new(DeviceApiTable::new()));

/// Register a sync primitive in the process-wide table
///
/// Executors created afterwards through the global registry pick it up;
/// already created executors keep the snapshot they were built with.
pub fn register_device_api(kind: DeviceKind, api: Arc<dyn DeviceSync>) -> DebugResult<()> {
    GLOBAL_DEVICE_API.write()?.register(kind, api);
    Ok(())
}

/// Snapshot of the process-wide table
pub fn global_device_api() -> DebugResult<DeviceApiTable> {
    Ok(GLOBAL_DEVICE_API.read()?.clone())
}
