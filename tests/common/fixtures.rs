//! Fakes and graph builders shared by the integration tests
//!
//! - [`FakeClock`]: virtual time that only moves when an operator runs
//! - [`ScriptedExecutor`]: base executor whose operators cost a fixed
//!   virtual duration and record every invocation
//! - [`DelayedSync`] / [`RecordingSync`]: device primitives for sync tests

use graph_runtime_debug::device::{Device, DeviceSync};
use graph_runtime_debug::error::{DebugResult, DebugRuntimeError};
use graph_runtime_debug::graph::GraphJson;
use graph_runtime_debug::packed::{ArgValue, CallArgs, PackedDispatch};
use graph_runtime_debug::profiling::{Clock, MonotonicClock};
use graph_runtime_debug::runtime::GraphExecutor;
use graph_runtime_debug::tensor::{DType, NdArray};
use graph_runtime_debug::kernel_error;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered record of clock reads, operator calls and syncs
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

// ============================================================================
// Clocks
// ============================================================================

/// Virtual clock advanced explicitly by the scripted operators
#[derive(Debug, Default)]
pub struct FakeClock {
    nanos: AtomicU64,
    reads: AtomicUsize,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeClock::default())
    }

    pub fn advance(&self, d: Duration) {
        self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Number of `now()` calls so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Real clock that logs every read as `"now"`
pub struct RecordingClock {
    inner: MonotonicClock,
    events: EventLog,
}

impl RecordingClock {
    pub fn new(events: EventLog) -> Arc<Self> {
        Arc::new(RecordingClock {
            inner: MonotonicClock::new(),
            events,
        })
    }
}

impl Clock for RecordingClock {
    fn now(&self) -> Duration {
        self.events.lock().unwrap().push("now".to_string());
        self.inner.now()
    }
}

// ============================================================================
// Device sync primitives
// ============================================================================

/// Accelerator whose queued work finishes `delay` after submission
pub struct DelayedSync {
    pub delay: Duration,
    pub syncs: AtomicUsize,
}

impl DelayedSync {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(DelayedSync {
            delay,
            syncs: AtomicUsize::new(0),
        })
    }
}

impl DeviceSync for DelayedSync {
    fn synchronize(&self, _device: Device) -> DebugResult<()> {
        std::thread::sleep(self.delay);
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sync that logs `"sync:<device>"`
pub struct RecordingSync {
    events: EventLog,
}

impl RecordingSync {
    pub fn new(events: EventLog) -> Arc<Self> {
        Arc::new(RecordingSync { events })
    }
}

impl DeviceSync for RecordingSync {
    fn synchronize(&self, device: Device) -> DebugResult<()> {
        self.events.lock().unwrap().push(format!("sync:{}", device));
        Ok(())
    }
}

// ============================================================================
// Scripted executor
// ============================================================================

enum Behaviour {
    Placeholder,
    Op(Duration),
    Fail,
}

struct ScriptedNode {
    name: String,
    behaviour: Behaviour,
}

/// Base executor with one float32 `[1]` output per node
///
/// Each operator advances the [`FakeClock`] by its cost, appends its node
/// index to the call trace and writes its invocation count into its
/// output entry.
pub struct ScriptedExecutor {
    nodes: Vec<ScriptedNode>,
    entries: Vec<NdArray>,
    clock: Arc<FakeClock>,
    calls: Arc<Mutex<Vec<usize>>>,
    events: Option<EventLog>,
    device: Device,
    runs: usize,
}

impl ScriptedExecutor {
    pub fn new(clock: Arc<FakeClock>) -> Self {
        ScriptedExecutor {
            nodes: Vec::new(),
            entries: Vec::new(),
            clock,
            calls: Arc::new(Mutex::new(Vec::new())),
            events: None,
            device: Device::cpu(),
            runs: 0,
        }
    }

    /// Place every node's output on `device`
    pub fn on_device(mut self, device: Device) -> Self {
        self.device = device;
        for entry in &mut self.entries {
            *entry = NdArray::empty(&[1], DType::Float32, device);
        }
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn placeholder(self, name: &str) -> Self {
        self.push(name, Behaviour::Placeholder)
    }

    pub fn op(self, name: &str, cost: Duration) -> Self {
        self.push(name, Behaviour::Op(cost))
    }

    pub fn failing_op(self, name: &str) -> Self {
        self.push(name, Behaviour::Fail)
    }

    fn push(mut self, name: &str, behaviour: Behaviour) -> Self {
        self.nodes.push(ScriptedNode {
            name: name.to_string(),
            behaviour,
        });
        self.entries
            .push(NdArray::empty(&[1], DType::Float32, self.device));
        self
    }

    /// Node indices in invocation order
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, nid: usize) -> usize {
        self.calls().iter().filter(|&&n| n == nid).count()
    }

    /// Number of full forward passes through `run`
    pub fn runs(&self) -> usize {
        self.runs
    }
}

impl GraphExecutor for ScriptedExecutor {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn node_name(&self, nid: usize) -> &str {
        &self.nodes[nid].name
    }

    fn num_node_outputs(&self, _nid: usize) -> usize {
        1
    }

    fn has_op(&self, nid: usize) -> bool {
        !matches!(self.nodes[nid].behaviour, Behaviour::Placeholder)
    }

    fn exec_op(&mut self, nid: usize) -> DebugResult<bool> {
        let cost = match self.nodes[nid].behaviour {
            Behaviour::Placeholder => return Ok(false),
            Behaviour::Fail => return Err(kernel_error!(self.nodes[nid].name, "scripted failure")),
            Behaviour::Op(cost) => cost,
        };
        self.clock.advance(cost);
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(nid);
            calls.iter().filter(|&&n| n == nid).count()
        };
        if let Some(events) = &self.events {
            events.lock().unwrap().push(format!("op:{}", nid));
        }
        self.entries[nid].write_f32(&[count as f32])?;
        Ok(true)
    }

    fn entry_id(&self, nid: usize, slot: usize) -> usize {
        nid + slot
    }

    fn data_entry(&self, eid: usize) -> Option<&NdArray> {
        self.entries.get(eid)
    }

    fn run(&mut self) -> DebugResult<()> {
        self.runs += 1;
        for nid in 0..self.nodes.len() {
            self.exec_op(nid)?;
        }
        Ok(())
    }
}

impl PackedDispatch for ScriptedExecutor {
    fn type_key(&self) -> &'static str {
        "ScriptedExecutor"
    }

    fn has_function(&self, name: &str) -> bool {
        matches!(name, "run" | "set_input")
    }

    fn invoke(&mut self, name: &str, args: &CallArgs) -> DebugResult<ArgValue> {
        match name {
            "run" => {
                self.run()?;
                Ok(ArgValue::Null)
            }
            "set_input" => Ok(ArgValue::Str(format!("base:set_input/{}", args.num_args()))),
            other => Err(DebugRuntimeError::FunctionNotFound(other.to_string())),
        }
    }
}

// ============================================================================
// Graph builders (host kernels)
// ============================================================================

/// `in -> mid (relu) -> out (negative)`, shape `[4]`
pub fn chain_graph() -> GraphJson {
    let mut g = GraphJson::new();
    let x = g.add_placeholder("in", &[4]);
    let mid = g.add_op("mid", "relu", &[x], &[4]);
    let out = g.add_op("out", "negative", &[mid], &[4]);
    g.with_heads(&[out])
}

/// Six nodes over every host kernel, with fan-out and fan-in
pub fn mixed_graph() -> GraphJson {
    let mut g = GraphJson::new();
    let x = g.add_placeholder("x", &[5]);
    let a = g.add_op("a", "relu", &[x], &[5]);
    let b = g.add_op("b", "negative", &[x], &[5]);
    let c = g.add_op("c", "add", &[a, b], &[5]);
    let d = g.add_op("d", "multiply", &[c, x], &[5]);
    let e = g.add_op("e", "subtract", &[d, a], &[5]);
    let f = g.add_op("f", "copy", &[e], &[5]);
    g.with_heads(&[f])
}

pub fn f32_tensor(values: &[f32]) -> NdArray {
    NdArray::from_f32(&[values.len()], values, Device::cpu()).unwrap()
}
