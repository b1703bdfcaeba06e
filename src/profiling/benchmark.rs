//! Adaptive per-operator benchmark loop
//!
//! One warm-up pass through the base executor, then `repeat` independent
//! samples. Each sample runs every operator `number` times, timing each
//! invocation through [`OpTimer`]. A sample that finishes faster than
//! `min_repeat_ms` is discarded and retried with a larger `number`.
//!
//! Every sample is reported on the `tracing` INFO channel:
//!
//! ```text
//! Repeat: 0
//! Op #0: 0.0123 ms/iter
//! Op #1: 0.0456 ms/iter
//! ```

use std::env;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::{Device, DeviceApiTable};
use crate::error::{DebugResult, DebugRuntimeError};
use crate::profiling::clock::{as_millis_f64, Clock};
use crate::profiling::op_timer::OpTimer;
use crate::runtime::GraphExecutor;
use crate::check_gt;

/// Default growth factor applied to `number` on every retry
pub const DEFAULT_GROWTH_FACTOR: f64 = 1.618;

/// Environment variable overriding [`BenchmarkConfig::growth_factor`]
pub const GROWTH_FACTOR_ENV: &str = "GRAPH_DEBUG_GROWTH_FACTOR";

/// Tuning knobs for the benchmark loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Minimum multiplicative growth of `number` between retries
    pub growth_factor: f64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl BenchmarkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry growth factor
    pub fn with_growth_factor(mut self, growth_factor: f64) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    /// Defaults, overridden by `GRAPH_DEBUG_GROWTH_FACTOR` when set
    pub fn from_env() -> DebugResult<Self> {
        let mut config = Self::default();
        if let Ok(raw) = env::var(GROWTH_FACTOR_ENV) {
            config.growth_factor = raw.trim().parse().map_err(|_| {
                DebugRuntimeError::InvalidConfiguration(format!(
                    "{} must be a number, got '{}'",
                    GROWTH_FACTOR_ENV, raw
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DebugResult<()> {
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            return Err(DebugRuntimeError::InvalidConfiguration(format!(
                "growth_factor must be finite and greater than 1.0, got {}",
                self.growth_factor
            )));
        }
        Ok(())
    }
}

/// Iteration count for the retry of an under-duration sample
///
/// `max(floor(min_repeat_ms / (duration_ms / number) + 1), ceil(number * growth))`.
/// The projection term is skipped when the sample took no measurable time.
pub fn next_iteration_count(number: u64, duration_ms: f64, min_repeat_ms: f64, growth: f64) -> u64 {
    let current = number as f64;
    let grown = (current * growth).ceil() as u64;
    if duration_ms <= 0.0 {
        return grown;
    }
    let projected = (min_repeat_ms / (duration_ms / current) + 1.0).floor() as u64;
    projected.max(grown)
}

/// Mean time of one operator over a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpTiming {
    /// Running counter over operator-bearing nodes
    pub op: usize,
    pub node_index: usize,
    pub node_name: String,
    pub ms_per_iter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatReport {
    pub repeat: u64,
    /// Iteration count of the accepted attempt
    pub number: u64,
    /// Attempts needed to reach `min_repeat_ms`
    pub attempts: u32,
    pub duration_ms: f64,
    pub ops: Vec<OpTiming>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub repeats: Vec<RepeatReport>,
}

impl BenchmarkReport {
    pub fn to_json(&self) -> DebugResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run the warm-up pass followed by `repeat` timed samples
///
/// The adapted `number` carries over from one sample to the next.
///
/// # Errors
///
/// `number` and `repeat` must be positive. Kernel and sync failures
/// propagate unchanged and end the benchmark.
#[allow(clippy::too_many_arguments)]
pub fn run_individual<E: GraphExecutor + ?Sized>(
    exec: &mut E,
    devices: &DeviceApiTable,
    clock: &dyn Clock,
    config: &BenchmarkConfig,
    number: u64,
    repeat: u64,
    min_repeat_ms: u64,
) -> DebugResult<BenchmarkReport> {
    check_gt!(number, 0);
    check_gt!(repeat, 0);
    config.validate()?;

    exec.run()?;

    let num_nodes = exec.num_nodes();
    let mut op_nodes: Vec<(usize, Device)> = Vec::new();
    for nid in 0..num_nodes {
        if exec.has_op(nid) {
            op_nodes.push((nid, exec.node_device(nid)?));
        }
    }

    let timer = OpTimer::new(clock, devices);
    let min_ms = min_repeat_ms as f64;
    let mut time_per_op = vec![0f64; num_nodes];
    let mut number = number;
    let mut report = BenchmarkReport::default();

    for r in 0..repeat {
        let mut attempts = 0u32;
        let mut duration_ms = 0.0;
        if !op_nodes.is_empty() {
            loop {
                attempts += 1;
                time_per_op.fill(0.0);
                let t_begin = clock.now();
                for _ in 0..number {
                    for &(nid, device) in &op_nodes {
                        time_per_op[nid] +=
                            timer.time_ms(device, || exec.exec_op(nid).map(|_| ()))?;
                    }
                }
                duration_ms = as_millis_f64(clock.now().saturating_sub(t_begin));
                if duration_ms >= min_ms {
                    break;
                }
                let next = next_iteration_count(number, duration_ms, min_ms, config.growth_factor);
                debug!(
                    repeat = r,
                    attempt = attempts,
                    duration_ms,
                    number,
                    next,
                    "sample below {} ms, retrying",
                    min_repeat_ms
                );
                number = next;
            }
        }

        info!(repeat = r, "Repeat: {}", r);
        let mut ops = Vec::with_capacity(op_nodes.len());
        for (op, &(nid, _)) in op_nodes.iter().enumerate() {
            let ms_per_iter = time_per_op[nid] / number as f64;
            info!(
                repeat = r,
                op,
                node = nid,
                ms_per_iter,
                "Op #{}: {} ms/iter",
                op,
                ms_per_iter
            );
            ops.push(OpTiming {
                op,
                node_index: nid,
                node_name: exec.node_name(nid).to_string(),
                ms_per_iter,
            });
        }
        report.repeats.push(RepeatReport {
            repeat: r,
            number,
            attempts,
            duration_ms,
            ops,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serial_test::serial;

    #[test]
    fn test_projection_dominates_after_fast_sample() {
        // 1 ms per iteration, 100 ms wanted
        assert_eq!(next_iteration_count(1, 1.0, 100.0, DEFAULT_GROWTH_FACTOR), 101);
        // 10 iterations in 5 ms, 100 ms wanted
        assert_eq!(next_iteration_count(10, 5.0, 100.0, DEFAULT_GROWTH_FACTOR), 201);
    }

    #[test]
    fn test_growth_dominates_near_target() {
        assert_eq!(next_iteration_count(100, 99.0, 100.0, DEFAULT_GROWTH_FACTOR), 162);
        assert_eq!(next_iteration_count(1, 0.0, 100.0, DEFAULT_GROWTH_FACTOR), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(BenchmarkConfig::default().validate().is_ok());
        assert_eq!(BenchmarkConfig::new().growth_factor, 1.618);
        for bad in [1.0, 0.5, f64::NAN, f64::INFINITY] {
            let err = BenchmarkConfig::new().with_growth_factor(bad).validate().unwrap_err();
            assert!(matches!(err, DebugRuntimeError::InvalidConfiguration(_)));
        }
        assert!(BenchmarkConfig::new().with_growth_factor(2.0).validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var(GROWTH_FACTOR_ENV, "2.5");
        assert_eq!(BenchmarkConfig::from_env().unwrap().growth_factor, 2.5);

        env::set_var(GROWTH_FACTOR_ENV, "fast");
        assert!(BenchmarkConfig::from_env().is_err());

        env::set_var(GROWTH_FACTOR_ENV, "0.9");
        assert!(BenchmarkConfig::from_env().is_err());

        env::remove_var(GROWTH_FACTOR_ENV);
        assert_eq!(BenchmarkConfig::from_env().unwrap(), BenchmarkConfig::default());
    }

    #[test]
    fn test_report_serializes() {
        let report = BenchmarkReport {
            repeats: vec![RepeatReport {
                repeat: 0,
                number: 4,
                attempts: 1,
                duration_ms: 2.0,
                ops: vec![OpTiming {
                    op: 0,
                    node_index: 1,
                    node_name: "relu0".to_string(),
                    ms_per_iter: 0.5,
                }],
            }],
        };
        let json = report.to_json().unwrap();
        let back: BenchmarkReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    proptest! {
        #[test]
        fn prop_retry_grows_by_at_least_growth_factor(
            number in 1u64..100_000,
            duration_ms in 0.0f64..10_000.0,
            min_repeat_ms in 0u64..10_000,
            growth in 1.01f64..4.0,
        ) {
            let next = next_iteration_count(number, duration_ms, min_repeat_ms as f64, growth);
            prop_assert!(next as f64 >= number as f64 * growth);
            prop_assert!(next > number);
        }

        #[test]
        fn prop_retry_reaches_projected_count(
            number in 1u64..10_000,
            duration_ms in 0.001f64..1_000.0,
            min_repeat_ms in 1u64..10_000,
        ) {
            let next = next_iteration_count(number, duration_ms, min_repeat_ms as f64, DEFAULT_GROWTH_FACTOR);
            let per_iter = duration_ms / number as f64;
            prop_assert!(next as f64 * per_iter >= min_repeat_ms as f64 * (1.0 - 1e-9));
        }
    }
}
