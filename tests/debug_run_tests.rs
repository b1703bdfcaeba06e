//! Single-operator timing through `debug_run`

mod common;

use common::{event_log, DelayedSync, FakeClock, RecordingClock, RecordingSync, ScriptedExecutor};
use graph_runtime_debug::device::{Device, DeviceApiTable, DeviceKind};
use graph_runtime_debug::error::DebugRuntimeError;
use graph_runtime_debug::GraphRuntimeDebug;
use std::sync::atomic::Ordering;
use std::time::Duration;

const GPU0: Device = Device::new(DeviceKind::Gpu, 0);

#[test]
fn test_debug_run_returns_virtual_cost_in_seconds() {
    let clock = FakeClock::new();
    let exec = ScriptedExecutor::new(clock.clone())
        .placeholder("x")
        .op("y", Duration::from_millis(3));
    let mut rt = GraphRuntimeDebug::new(exec, DeviceApiTable::new()).with_clock(clock.clone());

    let secs = rt.debug_run(1).unwrap();
    assert!((secs - 0.003).abs() < 1e-12, "got {secs}");
    assert_eq!(rt.executor().calls(), vec![1]);
}

#[test]
fn test_empty_closure_is_zero_without_clock_reads() {
    let clock = FakeClock::new();
    let exec = ScriptedExecutor::new(clock.clone())
        .placeholder("x")
        .op("y", Duration::from_millis(1));
    let mut rt = GraphRuntimeDebug::new(exec, DeviceApiTable::new()).with_clock(clock.clone());

    assert_eq!(rt.debug_run(0).unwrap(), 0.0);
    assert_eq!(clock.reads(), 0);
    assert!(rt.executor().calls().is_empty());
}

#[test]
fn test_out_of_range_index_is_precondition() {
    let clock = FakeClock::new();
    let exec = ScriptedExecutor::new(clock.clone()).op("y", Duration::ZERO);
    let mut rt = GraphRuntimeDebug::new(exec, DeviceApiTable::new()).with_clock(clock);

    let err = rt.debug_run(1).unwrap_err();
    assert!(err.is_precondition());
    assert!(err.to_string().starts_with("Check failed: index < "), "{err}");
}

#[test]
fn test_sync_between_op_and_end_timestamp() {
    let events = event_log();
    let exec = ScriptedExecutor::new(FakeClock::new())
        .on_device(GPU0)
        .with_events(events.clone())
        .op("y", Duration::ZERO);
    let devices = DeviceApiTable::new().with_api(DeviceKind::Gpu, RecordingSync::new(events.clone()));
    let mut rt = GraphRuntimeDebug::new(exec, devices).with_clock(RecordingClock::new(events.clone()));

    rt.debug_run(0).unwrap();
    assert_eq!(
        *events.lock().unwrap(),
        vec!["now", "op:0", "sync:gpu(0)", "now"]
    );
}

#[test]
fn test_delayed_device_completion_is_measured() {
    let sync = DelayedSync::new(Duration::from_millis(10));
    let exec = ScriptedExecutor::new(FakeClock::new())
        .on_device(GPU0)
        .op("slow", Duration::ZERO);
    let devices = DeviceApiTable::new().with_api(DeviceKind::Gpu, sync.clone());
    // monotonic clock: the only elapsed time is the device delay
    let mut rt = GraphRuntimeDebug::new(exec, devices);

    let secs = rt.debug_run(0).unwrap();
    assert!(secs >= 0.010, "expected at least 10 ms, got {:.6} s", secs);
    assert_eq!(sync.syncs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unregistered_device_fails() {
    let exec = ScriptedExecutor::new(FakeClock::new())
        .on_device(GPU0)
        .op("y", Duration::ZERO);
    let mut rt = GraphRuntimeDebug::new(exec, DeviceApiTable::new());
    assert!(matches!(
        rt.debug_run(0),
        Err(DebugRuntimeError::DeviceUnavailable(_))
    ));
}

#[test]
fn test_closure_failure_propagates_unchanged() {
    let exec = ScriptedExecutor::new(FakeClock::new())
        .placeholder("x")
        .failing_op("bad");
    let mut rt = GraphRuntimeDebug::new(exec, DeviceApiTable::new());
    match rt.debug_run(1) {
        Err(DebugRuntimeError::KernelFailed { kernel, message }) => {
            assert_eq!(kernel, "bad");
            assert_eq!(message, "scripted failure");
        }
        other => panic!("expected kernel failure, got {:?}", other),
    }
}
