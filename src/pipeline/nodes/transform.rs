//! Transform: applies a closure to every packet between one input and one output.
//!
//! The closure returns `Ok(None)` to filter a packet out. Config keys:
//! - `port`: base name shared by both ports (default `"data"`)
//! - `poll_ms`: how long one receive waits before re-checking the run flag (default 10)

use super::{forward, string_or, u64_opt, Forwarded};
use crate::pipeline::error::{NodeResult, PortError};
use crate::pipeline::node::{Node, NodeBase, NodeConfig};
use crate::pipeline::packet::Packet;
use crate::pipeline::port::{INPUT_SUFFIX, OUTPUT_SUFFIX};
use std::any::Any;
use std::time::Duration;

pub type TransformFn = Box<dyn FnMut(Packet) -> NodeResult<Option<Packet>> + Send>;

const DEFAULT_POLL: Duration = Duration::from_millis(10);

pub struct Transform {
    base: NodeBase,
    func: TransformFn,
    input: String,
    output: String,
    poll: Duration,
}

impl Transform {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut(Packet) -> NodeResult<Option<Packet>> + Send + 'static,
    {
        Self {
            base: NodeBase::new(name),
            func: Box::new(func),
            input: String::new(),
            output: String::new(),
            poll: DEFAULT_POLL,
        }
    }

    /// Forwards every packet unchanged.
    pub fn passthrough(name: impl Into<String>) -> Self {
        Self::new(name, |packet| Ok(Some(packet)))
    }

    /// Typed map from `T` to `U`; packets of other types fail the node.
    pub fn map<T, U, F>(name: impl Into<String>, mut func: F) -> Self
    where
        T: Any,
        U: Any + Send + Sync,
        F: FnMut(&T) -> U + Send + 'static,
    {
        Self::new(name, move |packet| {
            let value = packet.get::<T>()?;
            Ok(Some(Packet::new(func(value))))
        })
    }

    /// Typed filter keeping packets for which `keep` returns true.
    pub fn filter<T, F>(name: impl Into<String>, mut keep: F) -> Self
    where
        T: Any,
        F: FnMut(&T) -> bool + Send + 'static,
    {
        Self::new(name, move |packet| {
            let pass = keep(packet.get::<T>()?);
            Ok(pass.then_some(packet))
        })
    }
}

impl Node for Transform {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn init(&mut self, config: &NodeConfig) -> NodeResult<()> {
        let name = self.base.name().to_string();
        let base = string_or(config, &name, "port", "data")?;
        if let Some(ms) = u64_opt(config, &name, "poll_ms")? {
            self.poll = Duration::from_millis(ms.max(1));
        }

        self.input = format!("{}{}", base, INPUT_SUFFIX);
        self.output = format!("{}{}", base, OUTPUT_SUFFIX);
        self.base.add_input_port(self.input.clone());
        self.base.add_output_port(self.output.clone());
        Ok(())
    }

    fn run(&mut self) -> NodeResult<()> {
        let input = self.base.input(&self.input)?;
        let output = self.base.output(&self.output)?;
        let mut processed = 0u64;

        while self.is_running() {
            let packet = match input.recv_timeout(self.poll) {
                Ok(packet) => packet,
                Err(e) if e.is_retryable() => continue,
                // Unwired input: nothing to do until stopped.
                Err(PortError::Unbound(_)) => {
                    self.base.idle();
                    continue;
                }
                Err(PortError::Queue(_)) => break,
                Err(e) => return Err(e.into()),
            };

            let Some(out) = (self.func)(packet)? else {
                continue;
            };
            processed += 1;
            if forward(&output, out)? == Forwarded::Stopped {
                break;
            }
        }

        tracing::debug!("Transform '{}' processed {} packets", self.base.name(), processed);
        Ok(())
    }
}
