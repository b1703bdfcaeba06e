//! Reference base executor.
//!
//! Binds a [`GraphJson`] against a kernel [`Module`]: one storage entry per
//! node output, and for every non-placeholder node a closure invoking the
//! module's packed function named after the node's `op` with
//! `[inputs..., outputs...]`.

use std::fmt;

use tracing::debug;

use crate::device::{Device, DeviceApiTable};
use crate::error::{DebugResult, DebugRuntimeError};
use crate::graph::GraphJson;
use crate::packed::{ArgValue, CallArgs, Module, PackedDispatch};
use crate::runtime::executor::{GraphExecutor, OpExec};
use crate::tensor::NdArray;
use crate::{check_ge, check_lt};

const FUNCTIONS: &[&str] = &[
    "run",
    "set_input",
    "get_input",
    "get_output",
    "get_num_outputs",
    "get_num_inputs",
];

pub struct GraphRuntime {
    graph: GraphJson,
    device_api: DeviceApiTable,
    /// `node_row_ptr[nid]` is the entry id of slot 0 of node `nid`
    node_row_ptr: Vec<usize>,
    data_entry: Vec<NdArray>,
    op_execs: Vec<Option<OpExec>>,
    input_nodes: Vec<usize>,
    outputs: Vec<[usize; 2]>,
}

impl GraphRuntime {
    /// Parse `graph_json` and bind it against `module` on `devices`
    pub fn init(
        graph_json: &str,
        module: &Module,
        devices: &[Device],
        device_api: DeviceApiTable,
    ) -> DebugResult<Self> {
        Self::from_graph(GraphJson::parse(graph_json)?, module, devices, device_api)
    }

    pub fn from_graph(
        graph: GraphJson,
        module: &Module,
        devices: &[Device],
        device_api: DeviceApiTable,
    ) -> DebugResult<Self> {
        graph.validate(devices.len())?;
        for device in devices {
            if !device_api.supports(device.kind) {
                return Err(DebugRuntimeError::DeviceUnavailable(format!(
                    "no device API registered for {}",
                    device
                )));
            }
        }

        let mut node_row_ptr = Vec::with_capacity(graph.num_nodes() + 1);
        let mut data_entry = Vec::new();
        for node in &graph.nodes {
            node_row_ptr.push(data_entry.len());
            let device = devices[node.device_index];
            for _ in 0..node.num_outputs {
                data_entry.push(NdArray::empty(&node.shape, node.dtype, device));
            }
        }
        node_row_ptr.push(data_entry.len());

        let mut op_execs: Vec<Option<OpExec>> = Vec::with_capacity(graph.num_nodes());
        for (nid, node) in graph.nodes.iter().enumerate() {
            if node.is_placeholder() {
                op_execs.push(None);
                continue;
            }
            let func = module.get_function(&node.op)?.ok_or_else(|| {
                DebugRuntimeError::FunctionNotFound(format!(
                    "kernel '{}' for node {} ('{}')",
                    node.op, nid, node.name
                ))
            })?;
            let mut values: Vec<ArgValue> = node
                .inputs
                .iter()
                .map(|&[src, slot]| ArgValue::Tensor(data_entry[node_row_ptr[src] + slot].clone()))
                .collect();
            values.extend(
                (0..node.num_outputs)
                    .map(|slot| ArgValue::Tensor(data_entry[node_row_ptr[nid] + slot].clone())),
            );
            let args = CallArgs::new(values);
            op_execs.push(Some(Box::new(move || func.call(&args).map(|_| ()))));
        }

        let input_nodes = graph.arg_nodes();
        let outputs = graph.heads.clone();
        debug!(
            "GraphRuntime bound {} nodes, {} entries, {} inputs, {} outputs",
            graph.num_nodes(),
            data_entry.len(),
            input_nodes.len(),
            outputs.len()
        );

        Ok(GraphRuntime {
            graph,
            device_api,
            node_row_ptr,
            data_entry,
            op_execs,
            input_nodes,
            outputs,
        })
    }

    pub fn graph(&self) -> &GraphJson {
        &self.graph
    }

    pub fn device_api(&self) -> &DeviceApiTable {
        &self.device_api
    }

    pub fn num_inputs(&self) -> usize {
        self.input_nodes.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Position of the named placeholder among the graph inputs
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.input_nodes
            .iter()
            .position(|&nid| self.graph.nodes[nid].name == name)
    }

    pub fn set_input(&mut self, index: usize, data: &NdArray) -> DebugResult<()> {
        check_lt!(index, self.input_nodes.len());
        let eid = self.entry_id(self.input_nodes[index], 0);
        data.copy_to(&self.data_entry[eid], &self.device_api)
    }

    pub fn get_input(&self, index: usize) -> DebugResult<NdArray> {
        check_lt!(index, self.input_nodes.len());
        Ok(self.data_entry[self.entry_id(self.input_nodes[index], 0)].clone())
    }

    pub fn get_output(&self, index: usize) -> DebugResult<NdArray> {
        check_lt!(index, self.outputs.len());
        let [nid, slot] = self.outputs[index];
        Ok(self.data_entry[self.entry_id(nid, slot)].clone())
    }

    fn input_selector(&self, args: &CallArgs) -> DebugResult<usize> {
        match args.get(0)? {
            ArgValue::Str(name) => self
                .input_index(name)
                .ok_or_else(|| DebugRuntimeError::NodeNotFound(name.clone())),
            ArgValue::Int(index) => {
                check_ge!(*index, 0);
                Ok(*index as usize)
            }
            other => Err(DebugRuntimeError::ArgTypeMismatch {
                index: 0,
                expected: "int or str",
                actual: other.type_name(),
            }),
        }
    }
}

impl GraphExecutor for GraphRuntime {
    fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    fn node_name(&self, nid: usize) -> &str {
        &self.graph.nodes[nid].name
    }

    fn num_node_outputs(&self, nid: usize) -> usize {
        self.graph.nodes[nid].num_outputs
    }

    fn has_op(&self, nid: usize) -> bool {
        matches!(self.op_execs.get(nid), Some(Some(_)))
    }

    fn exec_op(&mut self, nid: usize) -> DebugResult<bool> {
        check_lt!(nid, self.op_execs.len());
        match self.op_execs[nid].as_mut() {
            Some(op) => {
                op()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn entry_id(&self, nid: usize, slot: usize) -> usize {
        self.node_row_ptr[nid] + slot
    }

    fn data_entry(&self, eid: usize) -> Option<&NdArray> {
        self.data_entry.get(eid)
    }

    fn run(&mut self) -> DebugResult<()> {
        for op in self.op_execs.iter_mut().flatten() {
            op()?;
        }
        Ok(())
    }
}

impl PackedDispatch for GraphRuntime {
    fn type_key(&self) -> &'static str {
        "GraphRuntime"
    }

    fn has_function(&self, name: &str) -> bool {
        FUNCTIONS.contains(&name)
    }

    fn invoke(&mut self, name: &str, args: &CallArgs) -> DebugResult<ArgValue> {
        match name {
            "run" => {
                self.run()?;
                Ok(ArgValue::Null)
            }
            "set_input" => {
                let index = self.input_selector(args)?;
                let data = args.tensor(1)?.clone();
                self.set_input(index, &data)?;
                Ok(ArgValue::Null)
            }
            "get_input" => {
                let index = self.input_selector(args)?;
                Ok(ArgValue::Tensor(self.get_input(index)?))
            }
            "get_output" => {
                let index = args.int(0)?;
                check_ge!(index, 0);
                let output = self.get_output(index as usize)?;
                if args.num_args() > 1 {
                    output.copy_to(args.tensor(1)?, &self.device_api)?;
                    Ok(ArgValue::Null)
                } else {
                    Ok(ArgValue::Tensor(output))
                }
            }
            "get_num_outputs" => Ok(ArgValue::Int(self.num_outputs() as i64)),
            "get_num_inputs" => Ok(ArgValue::Int(self.num_inputs() as i64)),
            other => Err(DebugRuntimeError::FunctionNotFound(other.to_string())),
        }
    }
}

impl fmt::Debug for GraphRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRuntime")
            .field("num_nodes", &self.graph.num_nodes())
            .field("num_entries", &self.data_entry.len())
            .field("node_row_ptr", &self.node_row_ptr)
            .field("device_api", &self.device_api)
            .finish_non_exhaustive()
    }
}
