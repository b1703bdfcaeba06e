//! Timer for a single operator invocation
//!
//! A region is timed as `t0 = now(); op(); sync(device); t1 = now()`.
//! The sync is what makes the number mean anything on an asynchronous
//! device: without it `t1 - t0` only measures how long it took the host to
//! enqueue the work.
//!
//! # Example
//!
//! ```rust
//! use graph_runtime_debug::device::{Device, DeviceApiTable};
//! use graph_runtime_debug::profiling::{MonotonicClock, OpTimer};
//!
//! let clock = MonotonicClock::new();
//! let devices = DeviceApiTable::new();
//! let timer = OpTimer::new(&clock, &devices);
//!
//! let elapsed = timer.time(Device::cpu(), || Ok(())).unwrap();
//! println!("op took {:.3} ms", elapsed.as_secs_f64() * 1000.0);
//! ```

use std::time::Duration;

use crate::device::{Device, DeviceApiTable};
use crate::error::DebugResult;
use crate::profiling::clock::{as_millis_f64, Clock, MonotonicClock};

/// Times closures against a clock, closing each region with a device sync
#[derive(Clone, Copy)]
pub struct OpTimer<'a> {
    clock: &'a dyn Clock,
    devices: &'a DeviceApiTable,
}

impl<'a> OpTimer<'a> {
    pub fn new(clock: &'a dyn Clock, devices: &'a DeviceApiTable) -> Self {
        OpTimer { clock, devices }
    }

    /// Run `op`, wait for `device` to drain, and return the elapsed time
    ///
    /// # Errors
    ///
    /// Errors from `op` propagate unchanged; the sync is skipped in that
    /// case. Sync failures are returned as-is.
    pub fn time<F>(&self, device: Device, op: F) -> DebugResult<Duration>
    where
        F: FnOnce() -> DebugResult<()>,
    {
        let t0 = self.clock.now();
        op()?;
        self.devices.synchronize(device)?;
        let t1 = self.clock.now();
        Ok(t1.saturating_sub(t0))
    }

    pub fn time_ms<F>(&self, device: Device, op: F) -> DebugResult<f64>
    where
        F: FnOnce() -> DebugResult<()>,
    {
        self.time(device, op).map(as_millis_f64)
    }
}

/// Scoped timer that logs its lifetime at debug level when dropped
///
/// ```rust
/// use graph_runtime_debug::profiling::ScopedTimer;
///
/// {
///     let _timer = ScopedTimer::new("prefix_run");
///     // ... code to time ...
/// } // elapsed time is logged here
/// ```
#[derive(Debug)]
pub struct ScopedTimer {
    name: String,
    clock: MonotonicClock,
}

impl ScopedTimer {
    pub fn new(name: impl Into<String>) -> Self {
        ScopedTimer {
            name: name.into(),
            clock: MonotonicClock::new(),
        }
    }

    /// Elapsed time in milliseconds
    pub fn elapsed(&self) -> f64 {
        as_millis_f64(self.clock.now())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        tracing::debug!("ScopedTimer '{}': {:.3} ms", self.name, self.elapsed());
    }
}
