//! Uniform variadic call ABI
//!
//! Host callers reach the runtime through string-named functions taking a
//! positional vector of dynamically typed slots and producing one return
//! slot. Decoding is explicit per entry point: an `Int` slot is never read
//! as a `Float`, a `Str` is never parsed into a number.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{DebugResult, DebugRuntimeError};
use crate::tensor::NdArray;

/// One dynamically typed argument or return slot
#[derive(Debug, Clone, Default)]
pub enum ArgValue {
    /// Empty return slot
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Tensor(NdArray),
    Module(Module),
    Handle(OpaqueHandle),
}

impl ArgValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Int(_) => "int",
            ArgValue::Float(_) => "float",
            ArgValue::Str(_) => "str",
            ArgValue::Tensor(_) => "tensor",
            ArgValue::Module(_) => "module",
            ArgValue::Handle(_) => "handle",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&NdArray> {
        match self {
            ArgValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&Module> {
        match self {
            ArgValue::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&OpaqueHandle> {
        match self {
            ArgValue::Handle(h) => Some(h),
            _ => None,
        }
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<NdArray> for ArgValue {
    fn from(v: NdArray) -> Self {
        ArgValue::Tensor(v)
    }
}

impl From<Module> for ArgValue {
    fn from(v: Module) -> Self {
        ArgValue::Module(v)
    }
}

impl From<OpaqueHandle> for ArgValue {
    fn from(v: OpaqueHandle) -> Self {
        ArgValue::Handle(v)
    }
}

/// Positional argument vector with typed, index-aware accessors
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    values: Vec<ArgValue>,
}

impl CallArgs {
    pub fn new(values: Vec<ArgValue>) -> Self {
        CallArgs { values }
    }

    pub fn num_args(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[ArgValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> DebugResult<&ArgValue> {
        self.values.get(index).ok_or(DebugRuntimeError::MissingArg {
            index,
            num_args: self.values.len(),
        })
    }

    pub fn int(&self, index: usize) -> DebugResult<i64> {
        let value = self.get(index)?;
        value.as_i64().ok_or_else(|| mismatch(index, "int", value))
    }

    pub fn float(&self, index: usize) -> DebugResult<f64> {
        let value = self.get(index)?;
        value.as_f64().ok_or_else(|| mismatch(index, "float", value))
    }

    pub fn str(&self, index: usize) -> DebugResult<&str> {
        let value = self.get(index)?;
        value.as_str().ok_or_else(|| mismatch(index, "str", value))
    }

    pub fn tensor(&self, index: usize) -> DebugResult<&NdArray> {
        let value = self.get(index)?;
        value.as_tensor().ok_or_else(|| mismatch(index, "tensor", value))
    }

    pub fn module(&self, index: usize) -> DebugResult<&Module> {
        let value = self.get(index)?;
        value.as_module().ok_or_else(|| mismatch(index, "module", value))
    }

    pub fn handle(&self, index: usize) -> DebugResult<&OpaqueHandle> {
        let value = self.get(index)?;
        value.as_handle().ok_or_else(|| mismatch(index, "handle", value))
    }
}

impl From<Vec<ArgValue>> for CallArgs {
    fn from(values: Vec<ArgValue>) -> Self {
        CallArgs::new(values)
    }
}

fn mismatch(index: usize, expected: &'static str, actual: &ArgValue) -> DebugRuntimeError {
    DebugRuntimeError::ArgTypeMismatch {
        index,
        expected,
        actual: actual.type_name(),
    }
}

type PackedFn = dyn Fn(&CallArgs) -> DebugResult<ArgValue> + Send + Sync;

/// Type-erased callable with the variadic signature
#[derive(Clone)]
pub struct PackedFunc(Arc<PackedFn>);

impl PackedFunc {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CallArgs) -> DebugResult<ArgValue> + Send + Sync + 'static,
    {
        PackedFunc(Arc::new(f))
    }

    pub fn call(&self, args: &CallArgs) -> DebugResult<ArgValue> {
        (self.0)(args)
    }

    /// Convenience wrapper building the argument vector in place
    pub fn call_packed(&self, values: Vec<ArgValue>) -> DebugResult<ArgValue> {
        self.call(&CallArgs::new(values))
    }
}

impl fmt::Debug for PackedFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PackedFunc")
    }
}

/// Anything that answers named packed calls
pub trait PackedDispatch: Send {
    fn type_key(&self) -> &'static str;

    fn has_function(&self, name: &str) -> bool;

    fn invoke(&mut self, name: &str, args: &CallArgs) -> DebugResult<ArgValue>;
}

/// Shared module handle
///
/// Functions obtained through [`Module::get_function`] keep the module
/// alive; it is dropped with the last handle or function referencing it.
/// Calls are serialized through the module's mutex.
#[derive(Clone)]
pub struct Module {
    node: Arc<Mutex<dyn PackedDispatch>>,
}

impl Module {
    pub fn new<T: PackedDispatch + 'static>(node: T) -> Self {
        Module {
            node: Arc::new(Mutex::new(node)),
        }
    }

    pub fn type_key(&self) -> DebugResult<&'static str> {
        Ok(self.node.lock()?.type_key())
    }

    /// Look up `name`; `Ok(None)` when the module does not expose it
    pub fn get_function(&self, name: &str) -> DebugResult<Option<PackedFunc>> {
        if !self.node.lock()?.has_function(name) {
            return Ok(None);
        }
        let node = Arc::clone(&self.node);
        let name = name.to_string();
        Ok(Some(PackedFunc::new(move |args| {
            node.lock()?.invoke(&name, args)
        })))
    }

    /// Like [`Module::get_function`] but a missing name is an error
    pub fn require_function(&self, name: &str) -> DebugResult<PackedFunc> {
        self.get_function(name)?
            .ok_or_else(|| DebugRuntimeError::FunctionNotFound(name.to_string()))
    }

    /// Number of live handles (modules and functions) sharing this module
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.node)
    }

    pub fn same_module(&self, other: &Module) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self.node.try_lock() {
            Ok(node) => node.type_key(),
            Err(_) => "<busy>",
        };
        f.debug_struct("Module").field("type_key", &key).finish()
    }
}

/// Pointer-shaped argument: a type-erased shared value
#[derive(Clone)]
pub struct OpaqueHandle(Arc<dyn Any + Send + Sync>);

impl OpaqueHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        OpaqueHandle(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpaqueHandle")
    }
}
