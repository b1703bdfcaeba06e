use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use graph_runtime_debug::logging::{init_with_config, LogFormat, LoggingConfig};
use graph_runtime_debug::profiling::BenchmarkConfig;
use graph_runtime_debug::{
    DType, DebugRuntimeBuilder, Device, GraphExecutor, GraphRuntimeDebug, HostKernelModule,
    NdArray,
};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "graph-debug", version)]
#[command(about = "Time, benchmark and inspect a graph on the host kernels", long_about = None)]
struct Cli {
    /// Log output format (human or json); overrides GRAPH_DEBUG_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the adaptive per-operator benchmark
    Bench {
        /// Path to the graph JSON
        #[arg(long)]
        graph: PathBuf,
        /// Iterations averaged per sample
        #[arg(long, default_value_t = 1)]
        number: i64,
        /// Number of reported samples
        #[arg(long, default_value_t = 1)]
        repeat: i64,
        /// Minimum duration of one sample in milliseconds
        #[arg(long, default_value_t = 0)]
        min_repeat_ms: i64,
        /// Value every float32 input is filled with
        #[arg(long, default_value_t = 1.0)]
        fill: f32,
        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Print the primary output of one node after a partial run
    Inspect {
        /// Path to the graph JSON
        #[arg(long)]
        graph: PathBuf,
        /// Node name or index
        #[arg(long)]
        node: String,
        /// Value every float32 input is filled with
        #[arg(long, default_value_t = 1.0)]
        fill: f32,
    },
    /// Run every node once in order and print its time in seconds
    Time {
        /// Path to the graph JSON
        #[arg(long)]
        graph: PathBuf,
        /// Value every float32 input is filled with
        #[arg(long, default_value_t = 1.0)]
        fill: f32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(format) = cli.log_format.as_deref() {
        logging.format = LogFormat::parse(format)
            .with_context(|| format!("unknown log format '{}'", format))?;
    }
    init_with_config(&logging);

    match cli.command {
        Commands::Bench {
            graph,
            number,
            repeat,
            min_repeat_ms,
            fill,
            json,
        } => {
            let mut rt = load(&graph, fill)?;
            let report = rt.run_individual(number, repeat, min_repeat_ms)?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                for sample in &report.repeats {
                    println!(
                        "repeat {}: number={} attempts={} duration={:.3} ms",
                        sample.repeat, sample.number, sample.attempts, sample.duration_ms
                    );
                    for op in &sample.ops {
                        println!(
                            "  op #{:<3} node {:<4} {:<24} {:.6} ms/iter",
                            op.op, op.node_index, op.node_name, op.ms_per_iter
                        );
                    }
                }
            }
        }
        Commands::Inspect { graph, node, fill } => {
            let mut rt = load(&graph, fill)?;
            let index = match node.parse::<usize>() {
                Ok(index) => index,
                Err(_) => rt.node_index(&node)?,
            };
            let entry = rt
                .executor()
                .graph()
                .nodes
                .get(index)
                .with_context(|| format!("node {} out of range", index))?
                .clone();
            let out = NdArray::empty(&entry.shape, entry.dtype, Device::cpu());
            rt.debug_get_output(index, &out)?;
            println!("node {} ({}) shape {:?} {}", index, entry.name, entry.shape, entry.dtype);
            if entry.dtype == DType::Float32 {
                println!("{:?}", out.to_f32_vec()?);
            } else {
                println!("{:?}", out.to_bytes()?);
            }
        }
        Commands::Time { graph, fill } => {
            let mut rt = load(&graph, fill)?;
            for nid in 0..rt.num_nodes() {
                let secs = rt.debug_run(nid)?;
                println!("{:>4}  {:<24} {:.9} s", nid, rt.executor().node_name(nid), secs);
            }
        }
    }
    Ok(())
}

fn load(path: &Path, fill: f32) -> anyhow::Result<GraphRuntimeDebug> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph {}", path.display()))?;
    let mut rt = DebugRuntimeBuilder::new()
        .with_config(BenchmarkConfig::from_env()?)
        .build(&json, &HostKernelModule::module(), &[Device::cpu()])
        .with_context(|| format!("failed to bind graph {}", path.display()))?;

    let exec = rt.executor_mut();
    let inputs: Vec<_> = exec
        .graph()
        .arg_nodes()
        .into_iter()
        .map(|nid| exec.graph().nodes[nid].clone())
        .collect();
    for (index, node) in inputs.iter().enumerate() {
        if node.dtype != DType::Float32 {
            warn!("input '{}' is {}, leaving it zero-filled", node.name, node.dtype);
            continue;
        }
        let data = NdArray::empty(&node.shape, node.dtype, Device::cpu());
        data.fill_f32(fill)?;
        exec.set_input(index, &data)?;
    }
    Ok(rt)
}
