//! SequenceSource: emits consecutive integers.
//!
//! Config keys:
//! - `port`: output base name (default `"seq"`, giving `seq_output`)
//! - `start`: first value (default 0)
//! - `count`: number of values; omitted means run until stopped
//! - `interval_ms`: pause between values (default 0)
//! - `push_timeout_ms`: output push timeout; negative waits forever, 0 never waits

use super::{forward, i64_opt, string_or, u64_opt, Forwarded};
use crate::pipeline::error::NodeResult;
use crate::pipeline::node::{Node, NodeBase, NodeConfig};
use crate::pipeline::packet::Packet;
use crate::pipeline::port::OUTPUT_SUFFIX;
use crate::pipeline::stream::PushTimeout;
use std::time::Duration;

/// Source node producing `i64` packets.
pub struct SequenceSource {
    base: NodeBase,
    port: String,
    start: i64,
    count: Option<u64>,
    interval: Duration,
    /// Total packets delivered across all runs.
    emitted: u64,
    dropped: u64,
}

impl SequenceSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: NodeBase::new(name),
            port: String::new(),
            start: 0,
            count: None,
            interval: Duration::ZERO,
            emitted: 0,
            dropped: 0,
        }
    }

    /// Name of the declared output port (empty before `init`).
    pub fn output_name(&self) -> &str {
        &self.port
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Node for SequenceSource {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn init(&mut self, config: &NodeConfig) -> NodeResult<()> {
        let name = self.base.name().to_string();
        let base = string_or(config, &name, "port", "seq")?;
        self.start = i64_opt(config, &name, "start")?.unwrap_or(0);
        self.count = u64_opt(config, &name, "count")?;
        self.interval = Duration::from_millis(u64_opt(config, &name, "interval_ms")?.unwrap_or(0));

        self.port = format!("{}{}", base, OUTPUT_SUFFIX);
        self.base.add_output_port(self.port.clone());
        if let Some(ms) = i64_opt(config, &name, "push_timeout_ms")? {
            let port = self.base.output(&self.port)?;
            port.set_push_timeout(PushTimeout::from_millis(ms));
        }

        tracing::debug!(
            "SequenceSource '{}' -> {}, start={} count={:?} interval={:?}",
            name,
            self.port,
            self.start,
            self.count,
            self.interval
        );
        Ok(())
    }

    fn run(&mut self) -> NodeResult<()> {
        let port = self.base.output(&self.port)?;
        let mut value = self.start;
        let mut produced = 0u64;

        while self.is_running() {
            if self.count.is_some_and(|count| produced >= count) {
                break;
            }
            match forward(&port, Packet::new(value))? {
                Forwarded::Sent => self.emitted += 1,
                Forwarded::Dropped => {
                    self.dropped += 1;
                    self.base.idle();
                }
                Forwarded::Stopped => break,
            }
            produced += 1;
            value = value.wrapping_add(1);

            if !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }

        tracing::debug!(
            "SequenceSource '{}' produced {} ({} dropped)",
            self.base.name(),
            produced,
            self.dropped
        );
        Ok(())
    }
}
