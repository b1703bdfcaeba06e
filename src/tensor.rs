//! Host-backed tensor handles
//!
//! An [`NdArray`] is a handle: clones share the same storage. The executor
//! owns one handle per storage entry and lends clones to operator closures
//! and to debug callers.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceApiTable};
use crate::error::{DebugResult, DebugRuntimeError};

/// Element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
    UInt8,
}

impl DType {
    pub fn size_bytes(self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            DType::Float64 | DType::Int64 => 8,
            DType::UInt8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
        }
    }
}

impl FromStr for DType {
    type Err = DebugRuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float32" => Ok(DType::Float32),
            "float64" => Ok(DType::Float64),
            "int32" => Ok(DType::Int32),
            "int64" => Ok(DType::Int64),
            "uint8" => Ok(DType::UInt8),
            other => Err(DebugRuntimeError::InvalidGraph(format!(
                "unsupported dtype '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tensor handle: shape, dtype, device and shared byte storage
#[derive(Clone)]
pub struct NdArray {
    shape: Vec<usize>,
    dtype: DType,
    device: Device,
    data: Arc<RwLock<Vec<u8>>>,
}

impl NdArray {
    /// Zero-filled tensor
    pub fn empty(shape: &[usize], dtype: DType, device: Device) -> Self {
        let count: usize = shape.iter().product();
        NdArray {
            shape: shape.to_vec(),
            dtype,
            device,
            data: Arc::new(RwLock::new(vec![0u8; count * dtype.size_bytes()])),
        }
    }

    pub fn from_f32(shape: &[usize], values: &[f32], device: Device) -> DebugResult<Self> {
        let array = NdArray::empty(shape, DType::Float32, device);
        array.write_f32(values)?;
        Ok(array)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn byte_size(&self) -> usize {
        self.element_count() * self.dtype.size_bytes()
    }

    /// True when both handles point at the same storage
    pub fn shares_storage(&self, other: &NdArray) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn to_bytes(&self) -> DebugResult<Vec<u8>> {
        Ok(self.data.read()?.clone())
    }

    pub fn copy_from_bytes(&self, bytes: &[u8]) -> DebugResult<()> {
        let mut data = self.data.write()?;
        if data.len() != bytes.len() {
            return Err(DebugRuntimeError::SizeMismatch {
                src: bytes.len(),
                dst: data.len(),
            });
        }
        data.copy_from_slice(bytes);
        Ok(())
    }

    pub fn to_f32_vec(&self) -> DebugResult<Vec<f32>> {
        self.expect_dtype(DType::Float32)?;
        let data = self.data.read()?;
        let mut out = vec![0f32; self.element_count()];
        LittleEndian::read_f32_into(&data, &mut out);
        Ok(out)
    }

    pub fn write_f32(&self, values: &[f32]) -> DebugResult<()> {
        self.expect_dtype(DType::Float32)?;
        if values.len() != self.element_count() {
            return Err(DebugRuntimeError::ShapeMismatch(format!(
                "{} values for tensor of shape {:?}",
                values.len(),
                self.shape
            )));
        }
        let mut data = self.data.write()?;
        LittleEndian::write_f32_into(values, &mut data);
        Ok(())
    }

    pub fn fill_f32(&self, value: f32) -> DebugResult<()> {
        self.write_f32(&vec![value; self.element_count()])
    }

    /// Copy this tensor's contents into `dst`
    ///
    /// Element type and element count must match. The source device is
    /// synchronized before its bytes are read, which is what makes the copy
    /// observe work still in flight on an accelerator.
    pub fn copy_to(&self, dst: &NdArray, devices: &DeviceApiTable) -> DebugResult<()> {
        if self.dtype != dst.dtype {
            return Err(DebugRuntimeError::DTypeMismatch {
                expected: self.dtype.to_string(),
                actual: dst.dtype.to_string(),
            });
        }
        if self.element_count() != dst.element_count() {
            return Err(DebugRuntimeError::ShapeMismatch(format!(
                "source {:?} vs. destination {:?}",
                self.shape, dst.shape
            )));
        }
        if self.byte_size() != dst.byte_size() {
            return Err(DebugRuntimeError::SizeMismatch {
                src: self.byte_size(),
                dst: dst.byte_size(),
            });
        }

        devices.synchronize(self.device)?;
        if self.shares_storage(dst) {
            return Ok(());
        }
        if self.device != dst.device {
            tracing::trace!("cross-device copy {} -> {}", self.device, dst.device);
        }

        let src = self.data.read()?;
        dst.data.write()?.copy_from_slice(&src);
        Ok(())
    }

    /// Copy `src`'s contents into this tensor
    pub fn copy_from(&self, src: &NdArray, devices: &DeviceApiTable) -> DebugResult<()> {
        src.copy_to(self, devices)
    }

    fn expect_dtype(&self, dtype: DType) -> DebugResult<()> {
        if self.dtype != dtype {
            return Err(DebugRuntimeError::DTypeMismatch {
                expected: dtype.to_string(),
                actual: self.dtype.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for NdArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdArray")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
