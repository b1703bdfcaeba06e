//! Profiling infrastructure for the debug runtime
//!
//! This module provides the timing primitives behind every debug entry
//! point.
//!
//! # Modules
//!
//! - [`clock`] - Monotonic clock abstraction (injectable for tests)
//! - [`op_timer`] - Single timed region closed by a device sync
//! - [`benchmark`] - Adaptive repeat/number benchmark loop and its reports
//!
//! # Example
//!
//! ```rust
//! use graph_runtime_debug::device::{Device, DeviceApiTable};
//! use graph_runtime_debug::profiling::{MonotonicClock, OpTimer};
//!
//! let clock = MonotonicClock::new();
//! let devices = DeviceApiTable::new();
//! let ms = OpTimer::new(&clock, &devices)
//!     .time_ms(Device::cpu(), || Ok(()))
//!     .unwrap();
//! println!("Elapsed: {:.3} ms", ms);
//! ```

pub mod benchmark;
pub mod clock;
pub mod op_timer;

// Public exports
pub use benchmark::{
    next_iteration_count, run_individual, BenchmarkConfig, BenchmarkReport, OpTiming,
    RepeatReport, DEFAULT_GROWTH_FACTOR,
};
pub use clock::{as_millis_f64, Clock, MonotonicClock};
pub use op_timer::{OpTimer, ScopedTimer};
