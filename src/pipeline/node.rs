//! Node abstraction for the pipeline.
//!
//! Two-layer design:
//! - **`NodeBase`**: name, ports and running flag shared by every node, plus
//!   the wiring helpers (`connect`, `connect_ports`).
//! - **`Node` trait**: the capability set a concrete node implements
//!   (`init`, `run`, `stop`). Concrete nodes embed a `NodeBase` and expose it
//!   through `base()`/`base_mut()`.
//!
//! A node is initialized on the pipeline's thread, then moved onto its own
//! thread for `run` and handed back when the pipeline stops.

use crate::pipeline::error::{NodeError, NodeResult};
use crate::pipeline::port::{base_name, InputPort, OutputPort, PortDirection};
use crate::pipeline::run_flag::RunFlag;
use crate::pipeline::stream::Capacity;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration document handed to `Node::init`.
pub type NodeConfig = serde_json::Value;

/// Sleep used by run loops when there is no work.
pub const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// State common to every node.
pub struct NodeBase {
    name: String,
    inputs: Vec<Arc<InputPort>>,
    outputs: Vec<Arc<OutputPort>>,
    running: RunFlag,
}

impl NodeBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            running: RunFlag::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to this node's running flag.
    pub fn run_flag(&self) -> &RunFlag {
        &self.running
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    pub fn set_running(&self) {
        self.running.set_running();
    }

    /// Clear the running flag. Does not wait for `run` to return.
    pub fn stop(&self) {
        self.running.stop();
    }

    /// Sleep briefly; call from run loops when no packet was available.
    pub fn idle(&self) {
        std::thread::sleep(IDLE_BACKOFF);
    }

    // ── Ports ──

    /// Declare an input port. Returns `false` if the name is taken.
    pub fn add_input_port(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.find_input_port(&name).is_some() {
            tracing::warn!("Node '{}' already has input port '{}'", self.name, name);
            return false;
        }
        let port = InputPort::with_flag(name, self.running.clone());
        self.inputs.push(Arc::new(port));
        true
    }

    /// Declare an output port. Returns `false` if the name is taken.
    pub fn add_output_port(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.find_output_port(&name).is_some() {
            tracing::warn!("Node '{}' already has output port '{}'", self.name, name);
            return false;
        }
        let port = OutputPort::with_flag(name, self.running.clone());
        self.outputs.push(Arc::new(port));
        true
    }

    pub fn input_ports(&self) -> &[Arc<InputPort>] {
        &self.inputs
    }

    pub fn output_ports(&self) -> &[Arc<OutputPort>] {
        &self.outputs
    }

    pub fn input_port(&self, index: usize) -> Option<&Arc<InputPort>> {
        self.inputs.get(index)
    }

    pub fn output_port(&self, index: usize) -> Option<&Arc<OutputPort>> {
        self.outputs.get(index)
    }

    pub fn find_input_port(&self, name: &str) -> Option<&Arc<InputPort>> {
        self.inputs.iter().find(|p| p.name() == name)
    }

    pub fn find_output_port(&self, name: &str) -> Option<&Arc<OutputPort>> {
        self.outputs.iter().find(|p| p.name() == name)
    }

    /// Input port by name, for run loops that hold on to the handle.
    pub fn input(&self, name: &str) -> NodeResult<Arc<InputPort>> {
        self.find_input_port(name)
            .cloned()
            .ok_or_else(|| NodeError::config(&self.name, format!("no input port '{}'", name)))
    }

    /// Output port by name, for run loops that hold on to the handle.
    pub fn output(&self, name: &str) -> NodeResult<Arc<OutputPort>> {
        self.find_output_port(name)
            .cloned()
            .ok_or_else(|| NodeError::config(&self.name, format!("no output port '{}'", name)))
    }

    // ── Wiring ──

    /// Wire `<base>_output` ports of this node to `<base>_input` ports of
    /// `other` through unbounded streams. Returns the number of matched pairs.
    pub fn connect(&self, other: &NodeBase) -> usize {
        self.connect_with_capacity(other, Capacity::Unbounded)
    }

    /// Suffix-convention wiring with streams of the given capacity.
    ///
    /// Pairs whose input is already bound are counted but left untouched.
    pub fn connect_with_capacity(&self, other: &NodeBase, capacity: Capacity) -> usize {
        let mut connected = 0;
        for oport in &self.outputs {
            let Some(out_base) = base_name(oport.name(), PortDirection::Output) else {
                continue;
            };
            for iport in &other.inputs {
                if base_name(iport.name(), PortDirection::Input) != Some(out_base) {
                    continue;
                }
                self.wire(oport, other, iport, capacity);
                connected += 1;
            }
        }
        connected
    }

    /// Wire `output` of this node to `input` of `other` by exact name.
    /// Returns 0 if either port is missing, 1 otherwise.
    pub fn connect_ports(&self, output: &str, other: &NodeBase, input: &str) -> usize {
        self.connect_ports_with_capacity(output, other, input, Capacity::Unbounded)
    }

    pub fn connect_ports_with_capacity(
        &self,
        output: &str,
        other: &NodeBase,
        input: &str,
        capacity: Capacity,
    ) -> usize {
        let (Some(oport), Some(iport)) =
            (self.find_output_port(output), other.find_input_port(input))
        else {
            return 0;
        };
        self.wire(oport, other, iport, capacity);
        1
    }

    fn wire(&self, oport: &OutputPort, other: &NodeBase, iport: &InputPort, capacity: Capacity) {
        if oport.connect_with_capacity(iport, capacity).is_none() {
            tracing::debug!(
                "{}.{} already bound, not wiring from {}.{}",
                other.name,
                iport.name(),
                self.name,
                oport.name()
            );
        }
    }
}

impl fmt::Debug for NodeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBase")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Capability set every pipeline node implements.
pub trait Node: Send {
    fn base(&self) -> &NodeBase;

    fn base_mut(&mut self) -> &mut NodeBase;

    /// Read `config` and declare ports. An error keeps the node out of the pipeline.
    fn init(&mut self, config: &NodeConfig) -> NodeResult<()>;

    /// Main loop. Must poll `is_running()` and return once it turns false.
    fn run(&mut self) -> NodeResult<()>;

    /// Signal-only stop request.
    fn stop(&self) {
        self.base().stop();
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn is_running(&self) -> bool {
        self.base().is_running()
    }

    fn set_running(&self) {
        self.base().set_running();
    }

    fn connect(&self, other: &dyn Node) -> usize {
        self.base().connect(other.base())
    }

    fn connect_ports(&self, output: &str, other: &dyn Node, input: &str) -> usize {
        self.base().connect_ports(output, other.base(), input)
    }
}
