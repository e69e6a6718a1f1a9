//! Pipeline executor: node ownership, wiring and concurrent lifecycle.
//!
//! Lifecycle:
//! 1. Add nodes (each is initialized with its config document on add).
//! 2. Wire ports, by suffix convention or explicit name pairs.
//! 3. `init` marks the pipeline ready; boundary streams may be attached to
//!    the first unbound input/output ports.
//! 4. `start` moves every node onto its own named thread.
//! 5. `stop` clears every node's run flag (waking producers blocked on full
//!    streams), joins the threads and takes the node bodies back, so the
//!    pipeline can be started again.
//!
//! Dropping a started pipeline stops it first, so no node thread outlives the
//! streams and nodes it references.

use crate::config::{LinkSpec, PipelineConfig};
use crate::pipeline::error::{NodeResult, PipelineError, PipelineResult, Status};
use crate::pipeline::id::{NodeId, StreamId};
use crate::pipeline::node::{Node, NodeBase, NodeConfig};
use crate::pipeline::port::{InputPort, OutputPort, PortDirection};
use crate::pipeline::registry::NodeRegistry;
use crate::pipeline::run_flag::RunFlag;
use crate::pipeline::stream::{Capacity, Stream, StreamHandle};
use crate::pipeline::topology::{
    EdgeSnapshot, Endpoint, NodeSnapshot, PortSnapshot, TopologySnapshot,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type NodeThread = JoinHandle<(Box<dyn Node>, NodeResult<()>)>;

enum SlotState {
    /// Body owned by the pipeline (before start / after stop).
    Idle(Box<dyn Node>),
    /// Body owned by its execution thread.
    Running(NodeThread),
    /// Thread panicked or could not be spawned; body is gone.
    Lost,
}

/// A node plus the handles the pipeline keeps while the body is away.
struct NodeSlot {
    name: String,
    flag: RunFlag,
    /// Port snapshot taken when the body leaves for its thread.
    inputs: Vec<Arc<InputPort>>,
    outputs: Vec<Arc<OutputPort>>,
    state: SlotState,
}

impl NodeSlot {
    fn new(node: Box<dyn Node>) -> Self {
        let base = node.base();
        Self {
            name: base.name().to_string(),
            flag: base.run_flag().clone(),
            inputs: base.input_ports().to_vec(),
            outputs: base.output_ports().to_vec(),
            state: SlotState::Idle(node),
        }
    }

    fn inputs(&self) -> &[Arc<InputPort>] {
        match &self.state {
            SlotState::Idle(node) => node.base().input_ports(),
            _ => &self.inputs,
        }
    }

    fn outputs(&self) -> &[Arc<OutputPort>] {
        match &self.state {
            SlotState::Idle(node) => node.base().output_ports(),
            _ => &self.outputs,
        }
    }

    fn base(&self) -> PipelineResult<&NodeBase> {
        match &self.state {
            SlotState::Idle(node) => Ok(node.base()),
            _ => Err(PipelineError::NodeBusy(self.name.clone())),
        }
    }

    fn is_running(&self) -> bool {
        matches!(&self.state, SlotState::Running(handle) if !handle.is_finished())
    }
}

/// Outcome of one node activation, recorded when the pipeline stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeExit {
    pub node: NodeId,
    pub name: String,
    pub status: Status,
    pub message: Option<String>,
}

/// Owner and driver of a node graph.
pub struct Pipeline {
    name: String,
    nodes: Vec<NodeSlot>,
    initialized: bool,
    started: bool,
    last_exits: Vec<NodeExit>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            initialized: false,
            started: false,
            last_exits: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Run an assembly step and mark the pipeline initialized if it succeeds.
    pub fn init<F>(&mut self, assemble: F) -> PipelineResult<()>
    where
        F: FnOnce(&mut Self) -> PipelineResult<()>,
    {
        assemble(self)?;
        self.initialized = true;
        tracing::info!(
            "Pipeline '{}' initialized with {} nodes",
            self.name,
            self.nodes.len()
        );
        Ok(())
    }

    /// Build and initialize a pipeline from a config document.
    pub fn from_config(config: &PipelineConfig, registry: &NodeRegistry) -> PipelineResult<Self> {
        config.validate()?;

        let mut pipeline = Pipeline::new(config.name.clone());
        pipeline.init(|p| {
            for spec in &config.nodes {
                let node = registry.create(&spec.kind, &spec.name)?;
                p.add_node(node, &spec.config)?;
            }
            for link in &config.links {
                p.apply_link(link)?;
            }
            Ok(())
        })?;
        Ok(pipeline)
    }

    fn apply_link(&mut self, link: &LinkSpec) -> PipelineResult<()> {
        let from = self.require_node(&link.from)?;
        let to = self.require_node(&link.to)?;
        let capacity = Capacity::from(link.capacity);

        match (&link.output, &link.input) {
            (Some(output), Some(input)) => {
                self.connect_ports_with_capacity(from, output, to, input, capacity)
            }
            (None, None) => {
                if self.connect_with_capacity(from, to, capacity)? == 0 {
                    return Err(PipelineError::NoMatchingPorts {
                        from: link.from.clone(),
                        to: link.to.clone(),
                    });
                }
                Ok(())
            }
            _ => Err(PipelineError::Config(format!(
                "link {} -> {} must name both ports or neither",
                link.from, link.to
            ))),
        }
    }

    // ── Nodes ──

    /// Initialize `node` with `config` and append it.
    ///
    /// Rejected without side effects if the name is taken or `init` fails.
    pub fn add_node(
        &mut self,
        mut node: Box<dyn Node>,
        config: &NodeConfig,
    ) -> PipelineResult<NodeId> {
        let name = node.name().to_string();
        if self.find_node(&name).is_some() {
            tracing::warn!("Pipeline '{}' already has node '{}'", self.name, name);
            return Err(PipelineError::DuplicateNode(name));
        }

        if let Err(source) = node.init(config) {
            tracing::warn!("Node '{}' failed to initialize: {}", name, source);
            return Err(PipelineError::NodeInit { name, source });
        }

        let id = NodeId(self.nodes.len() as u32);
        tracing::debug!(
            "Added node '{}' as {} ({} inputs, {} outputs)",
            name,
            id,
            node.base().input_ports().len(),
            node.base().output_ports().len()
        );
        self.nodes.push(NodeSlot::new(node));
        Ok(id)
    }

    /// Convenience wrapper around [`add_node`](Self::add_node).
    pub fn add<N: Node + 'static>(
        &mut self,
        node: N,
        config: &NodeConfig,
    ) -> PipelineResult<NodeId> {
        self.add_node(Box::new(node), config)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|slot| slot.name == name)
            .map(|i| NodeId(i as u32))
    }

    fn require_node(&self, name: &str) -> PipelineResult<NodeId> {
        self.find_node(name)
            .ok_or_else(|| PipelineError::UnknownNode(name.to_string()))
    }

    fn slot(&self, id: NodeId) -> PipelineResult<&NodeSlot> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| PipelineError::UnknownNode(id.to_string()))
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|slot| slot.name.as_str())
    }

    /// The node body, while it is not running.
    ///
    /// Returns `None` between `start` and `stop` (the body is owned by its
    /// thread) and for a node lost to a panic. Use [`stop_node`](Self::stop_node)
    /// or [`run_flag`](Self::run_flag) to reach a running node.
    pub fn node(&self, id: NodeId) -> Option<&dyn Node> {
        match &self.nodes.get(id.index())?.state {
            SlotState::Idle(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    /// Mutable node body, while it is not running.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn Node> {
        match &mut self.nodes.get_mut(id.index())?.state {
            SlotState::Idle(node) => Some(node.as_mut()),
            _ => None,
        }
    }

    /// Handle to a node's running flag, valid in every state.
    pub fn run_flag(&self, id: NodeId) -> Option<&RunFlag> {
        self.nodes.get(id.index()).map(|slot| &slot.flag)
    }

    /// Ask one node to stop without touching the others.
    ///
    /// Its thread winds down on its own and is joined by the next
    /// [`stop`](Self::stop); the exit is reported there.
    pub fn stop_node(&self, id: NodeId) -> PipelineResult<()> {
        let slot = self.slot(id)?;
        slot.flag.stop();
        tracing::info!("Stop requested for node '{}'", slot.name);
        Ok(())
    }

    pub fn input_ports(&self, id: NodeId) -> Option<&[Arc<InputPort>]> {
        self.nodes.get(id.index()).map(NodeSlot::inputs)
    }

    pub fn output_ports(&self, id: NodeId) -> Option<&[Arc<OutputPort>]> {
        self.nodes.get(id.index()).map(NodeSlot::outputs)
    }

    /// Number of node threads that have not returned yet.
    pub fn active_node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_running()).count()
    }

    // ── Wiring ──

    /// Suffix-convention wiring from `from` to `to`. Returns the matched pair count.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> PipelineResult<usize> {
        self.connect_with_capacity(from, to, Capacity::Unbounded)
    }

    pub fn connect_with_capacity(
        &mut self,
        from: NodeId,
        to: NodeId,
        capacity: Capacity,
    ) -> PipelineResult<usize> {
        let source = self.slot(from)?.base()?;
        let target = self.slot(to)?.base()?;
        Ok(source.connect_with_capacity(target, capacity))
    }

    /// Explicit wiring of `from.output` to `to.input`.
    pub fn connect_ports(
        &mut self,
        from: NodeId,
        output: &str,
        to: NodeId,
        input: &str,
    ) -> PipelineResult<()> {
        self.connect_ports_with_capacity(from, output, to, input, Capacity::Unbounded)
    }

    pub fn connect_ports_with_capacity(
        &mut self,
        from: NodeId,
        output: &str,
        to: NodeId,
        input: &str,
        capacity: Capacity,
    ) -> PipelineResult<()> {
        let source = self.slot(from)?.base()?;
        let target = self.slot(to)?.base()?;
        if source.find_output_port(output).is_none() {
            return Err(PipelineError::UnknownPort {
                node: source.name().to_string(),
                port: output.to_string(),
                direction: PortDirection::Output.as_str(),
            });
        }
        if target.find_input_port(input).is_none() {
            return Err(PipelineError::UnknownPort {
                node: target.name().to_string(),
                port: input.to_string(),
                direction: PortDirection::Input.as_str(),
            });
        }
        source.connect_ports_with_capacity(output, target, input, capacity);
        Ok(())
    }

    // ── Boundary ──

    /// First input port, in node then declaration order, with no bound stream.
    pub fn input_port(&self) -> Option<Arc<InputPort>> {
        if !self.initialized {
            return None;
        }
        self.nodes
            .iter()
            .flat_map(|slot| slot.inputs())
            .find(|port| !port.has_stream())
            .cloned()
    }

    /// First output port, in node then declaration order, with no bound stream.
    pub fn output_port(&self) -> Option<Arc<OutputPort>> {
        if !self.initialized {
            return None;
        }
        self.nodes
            .iter()
            .flat_map(|slot| slot.outputs())
            .find(|port| !port.has_stream())
            .cloned()
    }

    /// Bind a new stream to the first unbound input port; the application
    /// pushes into the returned handle.
    ///
    /// `None` when every input is bound or `capacity` is `Bounded(0)`.
    pub fn create_input_stream(&self, capacity: Capacity) -> Option<StreamHandle> {
        if capacity.is_zero() {
            tracing::warn!("Refusing zero-capacity boundary stream");
            return None;
        }
        let port = self.input_port()?;
        let stream = Stream::shared(capacity);
        if !port.set_stream(Arc::clone(&stream)) {
            return None;
        }
        tracing::debug!("Boundary stream {} feeds '{}'", stream.id(), port.name());
        Some(stream)
    }

    /// Bind a new stream to the first unbound output port; the application
    /// pops from the returned handle.
    ///
    /// `None` when every output is bound or `capacity` is `Bounded(0)`.
    pub fn create_output_stream(&self, capacity: Capacity) -> Option<StreamHandle> {
        if capacity.is_zero() {
            tracing::warn!("Refusing zero-capacity boundary stream");
            return None;
        }
        let port = self.output_port()?;
        let stream = Stream::shared(capacity);
        port.add_stream(Arc::clone(&stream));
        tracing::debug!("Boundary stream {} drains '{}'", stream.id(), port.name());
        Some(stream)
    }

    // ── Lifecycle ──

    /// Launch one thread per node.
    ///
    /// Fails with `InitFail` before `init`; a no-op when already started.
    pub fn start(&mut self) -> PipelineResult<()> {
        if !self.initialized {
            return Err(PipelineError::InitFail);
        }
        if self.started {
            return Ok(());
        }

        let mut failure = None;
        for slot in &mut self.nodes {
            let node = match std::mem::replace(&mut slot.state, SlotState::Lost) {
                SlotState::Idle(node) => node,
                other => {
                    slot.state = other;
                    continue;
                }
            };
            slot.inputs = node.base().input_ports().to_vec();
            slot.outputs = node.base().output_ports().to_vec();

            node.set_running();
            let spawned = thread::Builder::new()
                .name(format!("node-{}", slot.name))
                .spawn(move || run_node(node));

            match spawned {
                Ok(handle) => slot.state = SlotState::Running(handle),
                Err(source) => {
                    slot.flag.stop();
                    tracing::error!("Failed to spawn node '{}': {}", slot.name, source);
                    failure = Some(PipelineError::Spawn {
                        name: slot.name.clone(),
                        source,
                    });
                    break;
                }
            }
        }

        self.started = true;
        if let Some(err) = failure {
            // Bring down whatever already launched.
            self.stop()?;
            return Err(err);
        }

        tracing::info!("Pipeline '{}' started {} nodes", self.name, self.nodes.len());
        tracing::debug!("Pipeline '{}' topology:\n{}", self.name, self.topology());
        Ok(())
    }

    /// Stop every node and wait for its thread to exit.
    ///
    /// Fails with `NotInit` if never initialized; a no-op when not started.
    pub fn stop(&mut self) -> PipelineResult<()> {
        if !self.initialized {
            return Err(PipelineError::NotInit);
        }
        if !self.started {
            return Ok(());
        }

        // Signal everyone first so shutdown latency is the slowest node, not the sum.
        for slot in &self.nodes {
            slot.flag.stop();
        }

        self.last_exits.clear();
        for (index, slot) in self.nodes.iter_mut().enumerate() {
            let handle = match std::mem::replace(&mut slot.state, SlotState::Lost) {
                SlotState::Running(handle) => handle,
                other => {
                    slot.state = other;
                    continue;
                }
            };

            let id = NodeId(index as u32);
            match handle.join() {
                Ok((node, result)) => {
                    let (status, message) = match &result {
                        Ok(()) => (Status::Success, None),
                        Err(e) => (e.status(), Some(e.to_string())),
                    };
                    self.last_exits.push(NodeExit {
                        node: id,
                        name: slot.name.clone(),
                        status,
                        message,
                    });
                    slot.state = SlotState::Idle(node);
                }
                Err(_) => {
                    tracing::error!("Node '{}' panicked; it will not be restarted", slot.name);
                    self.last_exits.push(NodeExit {
                        node: id,
                        name: slot.name.clone(),
                        status: Status::Failed,
                        message: Some("panicked".to_string()),
                    });
                }
            }
        }

        self.started = false;
        tracing::info!("Pipeline '{}' stopped", self.name);
        Ok(())
    }

    /// Exit outcomes collected by the most recent `stop`.
    pub fn last_run_results(&self) -> &[NodeExit] {
        &self.last_exits
    }

    // ── Inspection ──

    pub fn topology(&self) -> TopologySnapshot {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut edges: BTreeMap<StreamId, EdgeSnapshot> = BTreeMap::new();

        let mut edge_for = |stream: &StreamHandle| -> StreamId {
            let id = stream.id();
            edges.entry(id).or_insert_with(|| EdgeSnapshot {
                stream: id,
                from: None,
                to: None,
                capacity: stream.capacity(),
                queued: stream.len(),
            });
            id
        };

        let mut producers = Vec::new();
        let mut consumers = Vec::new();

        for (index, slot) in self.nodes.iter().enumerate() {
            let id = NodeId(index as u32);
            let mut ports = Vec::new();

            for port in slot.inputs() {
                let streams: Vec<StreamId> = port.stream().map(&mut edge_for).into_iter().collect();
                for &stream in &streams {
                    consumers.push((stream, id, port.name().to_string()));
                }
                ports.push(PortSnapshot {
                    name: port.name().to_string(),
                    direction: PortDirection::Input,
                    streams,
                });
            }
            for port in slot.outputs() {
                let streams: Vec<StreamId> = port.streams().iter().map(&mut edge_for).collect();
                for &stream in &streams {
                    producers.push((stream, id, port.name().to_string()));
                }
                ports.push(PortSnapshot {
                    name: port.name().to_string(),
                    direction: PortDirection::Output,
                    streams,
                });
            }

            nodes.push(NodeSnapshot {
                id,
                name: slot.name.clone(),
                running: slot.is_running(),
                ports,
            });
        }

        for (stream, node, port) in producers {
            if let Some(edge) = edges.get_mut(&stream) {
                edge.from.get_or_insert(Endpoint { node, port });
            }
        }
        for (stream, node, port) in consumers {
            if let Some(edge) = edges.get_mut(&stream) {
                edge.to.get_or_insert(Endpoint { node, port });
            }
        }

        TopologySnapshot {
            nodes,
            edges: edges.into_values().collect(),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.started {
            let _ = self.stop();
        }
    }
}

fn run_node(mut node: Box<dyn Node>) -> (Box<dyn Node>, NodeResult<()>) {
    tracing::info!("Node '{}' running", node.name());
    let result = node.run();
    match &result {
        Ok(()) => tracing::info!("Node '{}' exited", node.name()),
        Err(e) => tracing::error!("Node '{}' failed with {}: {}", node.name(), e.status(), e),
    }
    // A returned node must not keep producers waiting on its streams.
    node.base().stop();
    (node, result)
}
