//! Built-in pipeline node implementations.
//!
//! Port names follow the suffix convention: each node takes a `port` config
//! key naming the base, and declares `<base>_input` / `<base>_output`.

pub mod channel_sink;
pub mod sequence_source;
pub mod transform;

pub use channel_sink::ChannelSink;
pub use sequence_source::SequenceSource;
pub use transform::Transform;

use crate::pipeline::error::{NodeError, NodeResult, PortError, QueueError};
use crate::pipeline::node::NodeConfig;
use crate::pipeline::packet::Packet;
use crate::pipeline::port::OutputPort;

/// What happened to a packet handed to [`forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    Sent,
    /// Not delivered: the port is unconnected or a stream stayed full.
    Dropped,
    /// The node was stopped while waiting for space.
    Stopped,
}

/// Send from a run loop, turning transient failures into an outcome.
pub fn forward(port: &OutputPort, packet: Packet) -> NodeResult<Forwarded> {
    match port.send(packet) {
        Ok(()) => Ok(Forwarded::Sent),
        Err(PortError::Queue(QueueError::Cancelled)) => Ok(Forwarded::Stopped),
        Err(e @ (PortError::Queue(QueueError::Full) | PortError::NotConnected(_))) => {
            tracing::trace!("Dropped packet on '{}': {}", port.name(), e);
            Ok(Forwarded::Dropped)
        }
        Err(e) => Err(e.into()),
    }
}

// ── Config helpers ──

fn string_or<'a>(
    config: &'a NodeConfig,
    node: &str,
    key: &str,
    default: &'a str,
) -> NodeResult<&'a str> {
    match config.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_str()
            .ok_or_else(|| NodeError::config(node, format!("'{}' must be a string", key))),
    }
}

fn u64_opt(config: &NodeConfig, node: &str, key: &str) -> NodeResult<Option<u64>> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| {
                NodeError::config(node, format!("'{}' must be a non-negative integer", key))
            }),
    }
}

fn i64_opt(config: &NodeConfig, node: &str, key: &str) -> NodeResult<Option<i64>> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| NodeError::config(node, format!("'{}' must be an integer", key))),
    }
}
