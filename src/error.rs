//! Unified error handling for the debug runtime
//!
//! This module provides a single error type for every layer of the crate:
//! - Precondition errors (violated checks on indices, counts, names)
//! - Kernel errors (raised by operator closures, propagated unchanged)
//! - Device errors (sync failures, unknown device kinds)
//! - Dispatch errors (packed-call argument decoding, unknown functions)
//! - Graph errors (malformed graph JSON, dangling references)

use std::fmt;

// Re-export thiserror for convenience
pub use thiserror;

/// Unified error type for the debug runtime
#[derive(Debug, thiserror::Error)]
pub enum DebugRuntimeError {
    // ========== Precondition Errors ==========
    /// A check assertion failed; the host call is aborted
    #[error("{0}")]
    CheckFailed(String),

    /// Node name lookup failed
    #[error("cannot find {0} among nodes")]
    NodeNotFound(String),

    /// Invalid benchmark or runtime configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Kernel Errors ==========
    /// Operator kernel failed while executing
    #[error("Kernel '{kernel}' failed: {message}")]
    KernelFailed { kernel: String, message: String },

    // ========== Tensor Copy Errors ==========
    /// Element types differ between source and destination
    #[error("DType mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: String, actual: String },

    /// Element counts differ between source and destination
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Byte sizes differ between source and destination
    #[error("Size mismatch: source has {src} bytes, destination has {dst} bytes")]
    SizeMismatch { src: usize, dst: usize },

    // ========== Device Errors ==========
    /// No sync primitive registered for the device kind
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Device synchronization failed
    #[error("Device sync failed: {0}")]
    DeviceSyncFailed(String),

    /// Unknown device type code
    #[error("Unknown device type code: {0}")]
    UnknownDeviceType(i64),

    // ========== Dispatch Errors ==========
    /// Function name not exposed by a module
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Packed argument has an unexpected type
    #[error("Argument {index} has type {actual}, expected {expected}")]
    ArgTypeMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// Packed argument missing
    #[error("Missing argument {index} (call has {num_args} arguments)")]
    MissingArg { index: usize, num_args: usize },

    // ========== Graph Errors ==========
    /// Graph JSON could not be parsed
    #[error("Graph parse error: {0}")]
    GraphParse(String),

    /// Graph structure is inconsistent
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    // ========== I/O Errors ==========
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // ========== Internal Errors ==========
    /// Internal error (indicates a bug)
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Lock poisoned (a previous host call panicked mid-flight)
    #[error("Internal lock poisoned: {0}")]
    LockPoisoned(String),
}

impl DebugRuntimeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            DebugRuntimeError::CheckFailed(_)
            | DebugRuntimeError::NodeNotFound(_)
            | DebugRuntimeError::InvalidConfiguration(_) => ErrorCategory::Precondition,

            DebugRuntimeError::KernelFailed { .. }
            | DebugRuntimeError::DTypeMismatch { .. }
            | DebugRuntimeError::ShapeMismatch(_)
            | DebugRuntimeError::SizeMismatch { .. } => ErrorCategory::Kernel,

            DebugRuntimeError::DeviceUnavailable(_)
            | DebugRuntimeError::DeviceSyncFailed(_)
            | DebugRuntimeError::UnknownDeviceType(_) => ErrorCategory::Device,

            DebugRuntimeError::FunctionNotFound(_)
            | DebugRuntimeError::ArgTypeMismatch { .. }
            | DebugRuntimeError::MissingArg { .. } => ErrorCategory::Dispatch,

            DebugRuntimeError::GraphParse(_)
            | DebugRuntimeError::InvalidGraph(_)
            | DebugRuntimeError::IoError(_) => ErrorCategory::Graph,

            DebugRuntimeError::InternalError(_) | DebugRuntimeError::LockPoisoned(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Check if this error comes from a violated precondition
    ///
    /// Precondition failures are the "fatal" class: the host call is
    /// aborted and callers are not expected to recover.
    pub fn is_precondition(&self) -> bool {
        matches!(self.category(), ErrorCategory::Precondition)
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Violated precondition - aborts the host call
    Precondition,
    /// Operator or tensor copy failure
    Kernel,
    /// Device failure
    Device,
    /// Packed-call decoding or lookup failure
    Dispatch,
    /// Graph description problem
    Graph,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Precondition => write!(f, "Precondition"),
            ErrorCategory::Kernel => write!(f, "Kernel"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Dispatch => write!(f, "Dispatch"),
            ErrorCategory::Graph => write!(f, "Graph"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DebugRuntimeError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        DebugRuntimeError::LockPoisoned(err.to_string())
    }
}

impl From<serde_json::Error> for DebugRuntimeError {
    fn from(err: serde_json::Error) -> Self {
        DebugRuntimeError::GraphParse(err.to_string())
    }
}

// Helper type alias for Results using DebugRuntimeError
pub type DebugResult<T> = std::result::Result<T, DebugRuntimeError>;

// ========== Check Macros ==========

/// Return a `CheckFailed` error unless the condition holds
///
/// # Examples
/// ```ignore
/// check!(index < num_nodes, "node index out of range");
/// ```
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if !($cond) {
            return Err($crate::error::DebugRuntimeError::CheckFailed(
                format!("Check failed: {}", stringify!($cond)),
            ));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::error::DebugRuntimeError::CheckFailed(format!(
                "Check failed: {} {}",
                stringify!($cond),
                format!($($arg)+)
            )));
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! check_binary_op {
    ($op:tt, $x:expr, $y:expr) => {{
        let (lhs, rhs) = (&$x, &$y);
        if !(*lhs $op *rhs) {
            return Err($crate::error::DebugRuntimeError::CheckFailed(format!(
                "Check failed: {} {} {} ({:?} vs. {:?})",
                stringify!($x),
                stringify!($op),
                stringify!($y),
                lhs,
                rhs
            )));
        }
    }};
    ($op:tt, $x:expr, $y:expr, $($arg:tt)+) => {{
        let (lhs, rhs) = (&$x, &$y);
        if !(*lhs $op *rhs) {
            return Err($crate::error::DebugRuntimeError::CheckFailed(format!(
                "Check failed: {} {} {} ({:?} vs. {:?}) {}",
                stringify!($x),
                stringify!($op),
                stringify!($y),
                lhs,
                rhs,
                format!($($arg)+)
            )));
        }
    }};
}

/// `check_lt!(a, b)` fails unless `a < b`
#[macro_export]
macro_rules! check_lt {
    ($($t:tt)+) => { $crate::check_binary_op!(<, $($t)+) };
}

/// `check_gt!(a, b)` fails unless `a > b`
#[macro_export]
macro_rules! check_gt {
    ($($t:tt)+) => { $crate::check_binary_op!(>, $($t)+) };
}

/// `check_ge!(a, b)` fails unless `a >= b`
#[macro_export]
macro_rules! check_ge {
    ($($t:tt)+) => { $crate::check_binary_op!(>=, $($t)+) };
}

/// `check_eq!(a, b)` fails unless `a == b`
#[macro_export]
macro_rules! check_eq {
    ($($t:tt)+) => { $crate::check_binary_op!(==, $($t)+) };
}

/// Create a kernel error with context
///
/// # Examples
/// ```ignore
/// return Err(kernel_error!("add", "shape mismatch {:?}", shape));
/// ```
#[macro_export]
macro_rules! kernel_error {
    ($kernel:expr, $msg:expr) => {
        $crate::error::DebugRuntimeError::KernelFailed {
            kernel: $kernel.to_string(),
            message: $msg.to_string(),
        }
    };
    ($kernel:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::DebugRuntimeError::KernelFailed {
            kernel: $kernel.to_string(),
            message: format!($fmt, $($arg)*),
        }
    };
}

/// Create a graph error with context
#[macro_export]
macro_rules! graph_error {
    ($msg:expr) => {
        $crate::error::DebugRuntimeError::InvalidGraph($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::DebugRuntimeError::InvalidGraph(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lt_checked(a: usize, b: usize) -> DebugResult<()> {
        check_lt!(a, b);
        Ok(())
    }

    fn gt_checked_with_message(number: i64) -> DebugResult<()> {
        check_gt!(number, 0, "number must be positive");
        Ok(())
    }

    fn plain_check(flag: bool) -> DebugResult<()> {
        check!(flag, "flag was {}", flag);
        Ok(())
    }

    #[test]
    fn test_check_lt_message_names_operands() {
        assert!(lt_checked(1, 2).is_ok());
        let err = lt_checked(5, 3).unwrap_err();
        assert_eq!(err.to_string(), "Check failed: a < b (5 vs. 3)");
        assert!(err.is_precondition());
    }

    #[test]
    fn test_check_gt_with_message() {
        let err = gt_checked_with_message(0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Check failed: number > 0 (0 vs. 0)"), "{msg}");
        assert!(msg.ends_with("number must be positive"), "{msg}");
    }

    #[test]
    fn test_plain_check() {
        assert!(plain_check(true).is_ok());
        let err = plain_check(false).unwrap_err();
        assert_eq!(err.to_string(), "Check failed: flag flag was false");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            DebugRuntimeError::NodeNotFound("x".into()).category(),
            ErrorCategory::Precondition
        );
        assert_eq!(
            kernel_error!("add", "bad").category(),
            ErrorCategory::Kernel
        );
        assert_eq!(
            DebugRuntimeError::DeviceUnavailable("gpu".into()).category(),
            ErrorCategory::Device
        );
        assert_eq!(
            DebugRuntimeError::FunctionNotFound("f".into()).category(),
            ErrorCategory::Dispatch
        );
        assert_eq!(graph_error!("dangling").category(), ErrorCategory::Graph);
        assert!(DebugRuntimeError::LockPoisoned("m".into()).is_internal_error());
    }

    #[test]
    fn test_node_not_found_names_symbol() {
        let err = DebugRuntimeError::NodeNotFound("conv1".into());
        assert!(err.to_string().contains("conv1"));
    }

    #[test]
    fn test_serde_error_converts_to_graph_parse() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: DebugRuntimeError = parse.unwrap_err().into();
        assert!(matches!(err, DebugRuntimeError::GraphParse(_)));
    }
}
