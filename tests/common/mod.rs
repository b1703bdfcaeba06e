//! Common test utilities for the integration tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::{FakeClock, ScriptedExecutor};
//!
//! #[test]
//! fn my_test() {
//!     let clock = FakeClock::new();
//!     let exec = ScriptedExecutor::new(clock.clone())
//!         .placeholder("x")
//!         .op("y", Duration::from_millis(1));
//!     // ... wrap in GraphRuntimeDebug and drive it ...
//! }
//! ```

#![allow(dead_code)]

// Submodules
mod fixtures;
mod tempfile_helpers;

pub use fixtures::*;
pub use serial_test::serial;
pub use tempfile_helpers::*;
