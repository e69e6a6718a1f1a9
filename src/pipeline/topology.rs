//! Read-only snapshots of a pipeline's wiring.
//!
//! Built by `Pipeline::topology()` for logging and inspection. Streams appear
//! as edges; a stream with no producer or no consumer port is a pipeline
//! boundary stream owned by the embedding application.

use crate::pipeline::id::{NodeId, StreamId};
use crate::pipeline::port::PortDirection;
use crate::pipeline::stream::Capacity;
use std::fmt;

/// Snapshot of a single port.
#[derive(Debug, Clone)]
pub struct PortSnapshot {
    pub name: String,
    pub direction: PortDirection,
    pub streams: Vec<StreamId>,
}

/// Snapshot of a single pipeline node.
#[derive(Debug, Clone)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub name: String,
    pub running: bool,
    pub ports: Vec<PortSnapshot>,
}

/// One end of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: String,
}

/// Snapshot of a single stream.
#[derive(Debug, Clone)]
pub struct EdgeSnapshot {
    pub stream: StreamId,
    /// Producing output port; `None` for an application-fed input stream.
    pub from: Option<Endpoint>,
    /// Consuming input port; `None` for an application-drained output stream.
    pub to: Option<Endpoint>,
    pub capacity: Capacity,
    /// Packets queued when the snapshot was taken.
    pub queued: usize,
}

impl EdgeSnapshot {
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.from.is_none() || self.to.is_none()
    }
}

/// Complete topology snapshot of the pipeline graph.
#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl TopologySnapshot {
    /// Edges between `from` and `to`, in stream creation order.
    pub fn edges_between(
        &self,
        from: NodeId,
        to: NodeId,
    ) -> impl Iterator<Item = &EdgeSnapshot> {
        self.edges.iter().filter(move |e| {
            e.from.as_ref().map(|p| p.node) == Some(from)
                && e.to.as_ref().map(|p| p.node) == Some(to)
        })
    }

    pub fn boundary_edges(&self) -> impl Iterator<Item = &EdgeSnapshot> {
        self.edges.iter().filter(|e| e.is_boundary())
    }

    fn node_name(&self, id: NodeId) -> &str {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map_or("?", |n| n.name.as_str())
    }
}

impl fmt::Display for TopologySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for edge in &self.edges {
            let from = match &edge.from {
                Some(ep) => format!("{}.{}", self.node_name(ep.node), ep.port),
                None => "<app>".to_string(),
            };
            let to = match &edge.to {
                Some(ep) => format!("{}.{}", self.node_name(ep.node), ep.port),
                None => "<app>".to_string(),
            };
            let cap = match edge.capacity.max_size() {
                Some(n) => format!("{}/{}", edge.queued, n),
                None => format!("{}/inf", edge.queued),
            };
            writeln!(f, "{} {} -> {} [{}]", edge.stream, from, to, cap)?;
        }
        Ok(())
    }
}
