//! Thread-per-node dataflow pipeline.
//!
//! Nodes exchange [`Packet`]s through named ports joined by FIFO [`Stream`]s.
//! Each node runs on its own thread once the [`Pipeline`] starts.
//!
//! # Architecture
//!
//! ```text
//! [SequenceSource] ──seq_output──► seq_input ──[Transform]──► ... ──► [ChannelSink]
//!         ▲                                                              │
//!   create_input_stream                                           create_output_stream
//!   (application feeds)                                           (application drains)
//! ```
//!
//! # Design
//!
//! - **Shared streams**: `Arc<Stream>` held by the producing output port(s) and
//!   the one consuming input port; no stream outlives its last endpoint.
//! - **Backpressure**: bounded streams block producers on a condvar, with a
//!   per-send timeout (forever, non-blocking or a duration).
//! - **Cooperative shutdown**: every node owns a [`RunFlag`]; stopping it wakes
//!   any producer blocked on a stream that node feeds.
//! - **Owned threads**: `Pipeline::stop` joins each node thread and takes the
//!   node back, so a pipeline can be restarted and never leaks threads.

pub mod error;
pub mod executor;
pub mod id;
pub mod node;
pub mod nodes;
pub mod packet;
pub mod port;
pub mod registry;
pub mod run_flag;
pub mod stream;
pub mod topology;

pub use error::{
    NodeError, NodeResult, PacketError, PipelineError, PipelineResult, PortError, QueueError,
    Status,
};
pub use executor::{NodeExit, Pipeline};
pub use id::{NodeId, StreamId};
pub use node::{Node, NodeBase, NodeConfig};
pub use packet::Packet;
pub use port::{InputPort, OutputPort, PortDirection, INPUT_SUFFIX, OUTPUT_SUFFIX};
pub use registry::{NodeFactory, NodeRegistry};
pub use run_flag::RunFlag;
pub use stream::{Capacity, PushTimeout, Stream, StreamHandle, StreamStats};
pub use topology::{EdgeSnapshot, Endpoint, NodeSnapshot, PortSnapshot, TopologySnapshot};
