//! Serialized graph description.
//!
//! Nodes are listed in execution order, which must be a topological
//! order: every input refers to an earlier node. `op == "null"` marks a
//! placeholder (input or parameter) that has no kernel.

use serde::{Deserialize, Serialize};

use crate::error::DebugResult;
use crate::graph_error;
use crate::tensor::DType;

/// `op` value for nodes without a kernel
pub const NULL_OP: &str = "null";

/// Reference to one output of a node: `[node_index, output_slot]`
pub type EntryRef = [usize; 2];

fn default_num_outputs() -> usize {
    1
}

fn default_dtype() -> DType {
    DType::Float32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub name: String,
    pub op: String,
    #[serde(default)]
    pub inputs: Vec<EntryRef>,
    /// Shape shared by every output of the node
    pub shape: Vec<usize>,
    #[serde(default = "default_dtype")]
    pub dtype: DType,
    #[serde(default = "default_num_outputs")]
    pub num_outputs: usize,
    /// Index into the device list the graph is bound against
    #[serde(default)]
    pub device_index: usize,
}

impl NodeJson {
    pub fn is_placeholder(&self) -> bool {
        self.op == NULL_OP
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphJson {
    pub nodes: Vec<NodeJson>,
    /// Graph outputs
    #[serde(default)]
    pub heads: Vec<EntryRef>,
}

impl GraphJson {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(json: &str) -> DebugResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> DebugResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn add_placeholder(&mut self, name: &str, shape: &[usize]) -> usize {
        self.push(NodeJson {
            name: name.to_string(),
            op: NULL_OP.to_string(),
            inputs: Vec::new(),
            shape: shape.to_vec(),
            dtype: DType::Float32,
            num_outputs: 1,
            device_index: 0,
        })
    }

    /// Append a kernel node reading slot 0 of each input node
    pub fn add_op(&mut self, name: &str, op: &str, inputs: &[usize], shape: &[usize]) -> usize {
        self.push(NodeJson {
            name: name.to_string(),
            op: op.to_string(),
            inputs: inputs.iter().map(|&nid| [nid, 0]).collect(),
            shape: shape.to_vec(),
            dtype: DType::Float32,
            num_outputs: 1,
            device_index: 0,
        })
    }

    pub fn push(&mut self, node: NodeJson) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn with_heads(mut self, heads: &[usize]) -> Self {
        self.heads = heads.iter().map(|&nid| [nid, 0]).collect();
        self
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Indices of placeholder nodes, in node order
    pub fn arg_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_placeholder())
            .map(|(nid, _)| nid)
            .collect()
    }

    /// Check references against node order and the bound device count
    pub fn validate(&self, num_devices: usize) -> DebugResult<()> {
        if num_devices == 0 {
            return Err(graph_error!("graph must be bound to at least one device"));
        }
        for (nid, node) in self.nodes.iter().enumerate() {
            if node.num_outputs == 0 {
                return Err(graph_error!("node {} ('{}') has no outputs", nid, node.name));
            }
            if node.device_index >= num_devices {
                return Err(graph_error!(
                    "node {} ('{}') uses device index {} but only {} devices were given",
                    nid,
                    node.name,
                    node.device_index,
                    num_devices
                ));
            }
            if node.is_placeholder() && !node.inputs.is_empty() {
                return Err(graph_error!("placeholder node {} ('{}') has inputs", nid, node.name));
            }
            for &[src, slot] in &node.inputs {
                if src >= nid {
                    return Err(graph_error!(
                        "node {} ('{}') reads node {} which does not precede it",
                        nid,
                        node.name,
                        src
                    ));
                }
                self.check_slot(src, slot)?;
            }
        }
        for &[nid, slot] in &self.heads {
            if nid >= self.nodes.len() {
                return Err(graph_error!("head references missing node {}", nid));
            }
            self.check_slot(nid, slot)?;
        }
        Ok(())
    }

    fn check_slot(&self, nid: usize, slot: usize) -> DebugResult<()> {
        let outputs = self.nodes[nid].num_outputs;
        if slot >= outputs {
            return Err(graph_error!(
                "output slot {} of node {} does not exist (node has {})",
                slot,
                nid,
                outputs
            ));
        }
        Ok(())
    }
}
