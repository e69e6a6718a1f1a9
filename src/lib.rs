//! # dataflow-rs: thread-per-node dataflow pipelines
//!
//! Independent processing nodes exchange type-erased packets through named,
//! directional ports joined by bounded or unbounded FIFO streams. Every node
//! runs on its own thread; the pipeline wires ports together and drives the
//! start/stop lifecycle.
//!
//! ## Architecture
//!
//! - **Packet / Stream**: shared payloads and the blocking queues that carry them
//! - **Port / Node**: named endpoints and the `Node` trait nodes implement
//! - **Pipeline**: node ownership, wiring, boundary streams, threads
//! - **Config**: TOML/JSON pipeline documents built through a `NodeRegistry`
//!
//! ## Example
//!
//! ```no_run
//! use dataflow_rs::pipeline::nodes::{ChannelSink, SequenceSource};
//! use dataflow_rs::pipeline::{Capacity, Pipeline};
//! use serde_json::json;
//!
//! fn main() -> dataflow_rs::Result<()> {
//!     let (sink, rx) = ChannelSink::channel("sink");
//!     let mut pipeline = Pipeline::new("demo");
//!     pipeline.init(|p| {
//!         let src = p.add(SequenceSource::new("src"), &json!({"count": 10}))?;
//!         let dst = p.add(sink, &json!({"port": "seq"}))?;
//!         p.connect_with_capacity(src, dst, Capacity::Bounded(4))?;
//!         Ok(())
//!     })?;
//!
//!     pipeline.start()?;
//!     let first = rx.recv().expect("sink hung up");
//!     assert_eq!(first.get::<i64>(), Ok(&0));
//!     pipeline.stop()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export commonly used types
pub use config::{LinkSpec, NodeSpec, PipelineConfig};
pub use error::{Error, Result, ResultExt};
pub use pipeline::{Node, NodeBase, Packet, Pipeline, PipelineError, Stream};
