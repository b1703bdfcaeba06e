//! Debug wrapper around a base graph executor
//!
//! [`GraphRuntimeDebug`] holds a base executor and adds:
//! - node lookup by name
//! - single-operator timing (`debug_run`)
//! - the adaptive per-operator benchmark (`run_individual`)
//! - intermediate output inspection (`get_output_by_layer`, `debug_get_output`)
//!
//! Every entry point runs inline on the calling thread. The same four
//! operations are reachable by name through the [`PackedDispatch`]
//! implementation in [`dispatch`]; any other name is answered by the
//! wrapped executor.
//!
//! [`PackedDispatch`]: crate::packed::PackedDispatch

pub mod create;
pub mod dispatch;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::device::{global_device_api, Device, DeviceApiTable};
use crate::error::{DebugResult, DebugRuntimeError};
use crate::packed::Module;
use crate::profiling::benchmark::{self, BenchmarkConfig, BenchmarkReport};
use crate::profiling::{Clock, MonotonicClock, OpTimer, ScopedTimer};
use crate::runtime::{GraphExecutor, GraphRuntime};
use crate::tensor::NdArray;
use crate::{check_ge, check_gt, check_lt};

pub use create::{builtin_functions, CREATE_NAME, REMOTE_CREATE_NAME};

pub struct GraphRuntimeDebug<E: GraphExecutor = GraphRuntime> {
    exec: E,
    devices: DeviceApiTable,
    clock: Arc<dyn Clock>,
    config: BenchmarkConfig,
}

impl GraphRuntimeDebug<GraphRuntime> {
    /// Bind `graph_json` against `module` on `devices`
    ///
    /// Uses the process-wide device table and the monotonic clock; see
    /// [`DebugRuntimeBuilder`] to inject either.
    pub fn create(graph_json: &str, module: &Module, devices: &[Device]) -> DebugResult<Self> {
        DebugRuntimeBuilder::new().build(graph_json, module, devices)
    }
}

impl<E: GraphExecutor> GraphRuntimeDebug<E> {
    /// Wrap an already initialised executor
    pub fn new(exec: E, devices: DeviceApiTable) -> Self {
        GraphRuntimeDebug {
            exec,
            devices,
            clock: Arc::new(MonotonicClock::new()),
            config: BenchmarkConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: BenchmarkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor(&self) -> &E {
        &self.exec
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.exec
    }

    pub fn into_executor(self) -> E {
        self.exec
    }

    pub fn devices(&self) -> &DeviceApiTable {
        &self.devices
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn num_nodes(&self) -> usize {
        self.exec.num_nodes()
    }

    /// Smallest node index whose name equals `name`
    ///
    /// A later node carrying the same name is reported at warn level and
    /// otherwise ignored.
    pub fn node_index(&self, name: &str) -> DebugResult<usize> {
        let num_nodes = self.exec.num_nodes();
        let nid = (0..num_nodes)
            .find(|&nid| self.exec.node_name(nid) == name)
            .ok_or_else(|| DebugRuntimeError::NodeNotFound(name.to_string()))?;
        if let Some(dup) = (nid + 1..num_nodes).find(|&i| self.exec.node_name(i) == name) {
            warn!(
                node = name,
                first = nid,
                duplicate = dup,
                "node name '{}' is not unique, using index {}",
                name,
                nid
            );
        }
        Ok(nid)
    }

    /// Run the operator of node `index` once and return its wall time in seconds
    ///
    /// The timed region ends after the node's device has been synchronized.
    /// A node without an operator returns `0.0` and is not timed.
    pub fn debug_run(&mut self, index: usize) -> DebugResult<f64> {
        check_lt!(index, self.exec.num_nodes());
        if !self.exec.has_op(index) {
            return Ok(0.0);
        }
        let device = self.exec.node_device(index)?;
        let GraphRuntimeDebug {
            exec,
            devices,
            clock,
            ..
        } = self;
        let elapsed = OpTimer::new(&**clock, devices)
            .time(device, || exec.exec_op(index).map(|_| ()))?;
        Ok(elapsed.as_secs_f64())
    }

    /// Warm-up run followed by `repeat` adaptive samples of every operator
    ///
    /// Arguments are validated before anything executes: `number > 0`,
    /// `repeat > 0`, `min_repeat_ms >= 0`.
    pub fn run_individual(
        &mut self,
        number: i64,
        repeat: i64,
        min_repeat_ms: i64,
    ) -> DebugResult<BenchmarkReport> {
        check_gt!(number, 0);
        check_gt!(repeat, 0);
        check_ge!(min_repeat_ms, 0);
        debug!(number, repeat, min_repeat_ms, "run_individual");
        benchmark::run_individual(
            &mut self.exec,
            &self.devices,
            self.clock.as_ref(),
            &self.config,
            number as u64,
            repeat as u64,
            min_repeat_ms as u64,
        )
    }

    /// Storage entry of `(index, slot)` as last written; nothing is executed
    ///
    /// The returned handle shares storage with the executor.
    pub fn get_output_by_layer(&self, index: usize, slot: usize) -> DebugResult<NdArray> {
        check_lt!(index, self.exec.num_nodes());
        check_lt!(slot, self.exec.num_node_outputs(index));
        Ok(self.exec.node_entry(index, slot)?.clone())
    }

    /// Execute nodes `0..=index`, then copy the primary output of `index` into `out`
    ///
    /// Later nodes are not executed. The prefix is re-executed on every
    /// call.
    pub fn debug_get_output(&mut self, index: usize, out: &NdArray) -> DebugResult<()> {
        check_lt!(index, self.exec.num_nodes());
        let _timer = ScopedTimer::new(format!("debug_get_output({})", index));
        for nid in 0..=index {
            self.exec.exec_op(nid)?;
        }
        let src = self.exec.node_entry(index, 0)?;
        src.copy_to(out, &self.devices)
    }

    /// [`Self::debug_get_output`] with the node resolved by name
    pub fn debug_get_output_by_name(&mut self, name: &str, out: &NdArray) -> DebugResult<()> {
        let index = self.node_index(name)?;
        self.debug_get_output(index, out)
    }
}

impl<E: GraphExecutor + fmt::Debug> fmt::Debug for GraphRuntimeDebug<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRuntimeDebug")
            .field("exec", &self.exec)
            .field("devices", &self.devices)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for a debug runtime over the reference [`GraphRuntime`]
#[derive(Default)]
pub struct DebugRuntimeBuilder {
    device_api: Option<DeviceApiTable>,
    clock: Option<Arc<dyn Clock>>,
    config: BenchmarkConfig,
}

impl DebugRuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `table` instead of a snapshot of the process-wide device table
    pub fn with_device_api(mut self, table: DeviceApiTable) -> Self {
        self.device_api = Some(table);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_config(mut self, config: BenchmarkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(
        self,
        graph_json: &str,
        module: &Module,
        devices: &[Device],
    ) -> DebugResult<GraphRuntimeDebug<GraphRuntime>> {
        self.config.validate()?;
        let table = match self.device_api {
            Some(table) => table,
            None => global_device_api()?,
        };
        let exec = GraphRuntime::init(graph_json, module, devices, table.clone())?;
        let mut debug_rt = GraphRuntimeDebug::new(exec, table).with_config(self.config);
        if let Some(clock) = self.clock {
            debug_rt = debug_rt.with_clock(clock);
        }
        Ok(debug_rt)
    }
}
