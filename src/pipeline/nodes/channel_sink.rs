//! ChannelSink: hands packets out of the pipeline through a crossbeam channel.
//!
//! Config keys: `port` (input base name, default `"sink"`) and `poll_ms`.

use super::{string_or, u64_opt};
use crate::pipeline::error::{NodeResult, PortError};
use crate::pipeline::node::{Node, NodeBase, NodeConfig};
use crate::pipeline::packet::Packet;
use crate::pipeline::port::INPUT_SUFFIX;
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

pub struct ChannelSink {
    base: NodeBase,
    tx: Sender<Packet>,
    input: String,
    poll: Duration,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>, tx: Sender<Packet>) -> Self {
        Self {
            base: NodeBase::new(name),
            tx,
            input: String::new(),
            poll: Duration::from_millis(10),
        }
    }

    /// Sink plus the receiving end of a fresh unbounded channel.
    pub fn channel(name: impl Into<String>) -> (Self, Receiver<Packet>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self::new(name, tx), rx)
    }
}

impl Node for ChannelSink {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn init(&mut self, config: &NodeConfig) -> NodeResult<()> {
        let name = self.base.name().to_string();
        let base = string_or(config, &name, "port", "sink")?;
        if let Some(ms) = u64_opt(config, &name, "poll_ms")? {
            self.poll = Duration::from_millis(ms.max(1));
        }
        self.input = format!("{}{}", base, INPUT_SUFFIX);
        self.base.add_input_port(self.input.clone());
        Ok(())
    }

    fn run(&mut self) -> NodeResult<()> {
        let input = self.base.input(&self.input)?;

        while self.is_running() {
            let packet = match input.recv_timeout(self.poll) {
                Ok(packet) => packet,
                Err(e) if e.is_retryable() => continue,
                Err(PortError::Unbound(_)) => {
                    self.base.idle();
                    continue;
                }
                Err(PortError::Queue(_)) => break,
                Err(e) => return Err(e.into()),
            };
            if self.tx.send(packet).is_err() {
                tracing::info!("ChannelSink '{}': receiver dropped, exiting", self.base.name());
                break;
            }
        }
        Ok(())
    }
}
