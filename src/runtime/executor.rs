//! Capability set the debug layer needs from a base executor.

use crate::error::{DebugResult, DebugRuntimeError};
use crate::packed::PackedDispatch;
use crate::tensor::NdArray;
use crate::device::Device;

/// Operator closure: computes one node's outputs into its storage entries
///
/// Closures are idempotent with respect to their inputs, so re-running one
/// without re-staging upstream entries reproduces the same bytes.
pub type OpExec = Box<dyn FnMut() -> DebugResult<()> + Send>;

/// Base executor contract
///
/// Node indices run over `0..num_nodes()` in execution order. Storage
/// entries are addressed by `entry_id(node, slot)`. Unknown dispatch names
/// are answered through the [`PackedDispatch`] supertrait.
pub trait GraphExecutor: PackedDispatch {
    fn num_nodes(&self) -> usize;

    fn node_name(&self, nid: usize) -> &str;

    fn num_node_outputs(&self, nid: usize) -> usize;

    /// Whether node `nid` carries an operator closure
    fn has_op(&self, nid: usize) -> bool;

    /// Invoke the closure of node `nid`; `Ok(false)` for an empty slot
    fn exec_op(&mut self, nid: usize) -> DebugResult<bool>;

    fn entry_id(&self, nid: usize, slot: usize) -> usize;

    fn data_entry(&self, eid: usize) -> Option<&NdArray>;

    /// Full forward pass
    fn run(&mut self) -> DebugResult<()>;

    /// Tensor at `entry_id(nid, slot)`
    fn node_entry(&self, nid: usize, slot: usize) -> DebugResult<&NdArray> {
        let eid = self.entry_id(nid, slot);
        self.data_entry(eid).ok_or_else(|| {
            DebugRuntimeError::InternalError(format!(
                "storage entry {} for node {} slot {} is missing",
                eid, nid, slot
            ))
        })
    }

    /// Device of a node's primary output, where its closure runs
    fn node_device(&self, nid: usize) -> DebugResult<Device> {
        self.node_entry(nid, 0).map(NdArray::device)
    }
}
