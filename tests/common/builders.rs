//! Scripted nodes for driving pipelines through specific behaviors

use dataflow_rs::pipeline::nodes::{forward, Forwarded};
use dataflow_rs::pipeline::{NodeConfig, NodeError, NodeResult};
use dataflow_rs::{Node, NodeBase, Packet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What a [`ScriptedNode`] does when run.
#[derive(Debug, Clone)]
pub enum Script {
    /// Wait for stop.
    Idle,
    /// Send these values on the first output, then wait for stop.
    Emit(Vec<i64>),
    /// Send increasing values on the first output until stopped.
    Flood,
    /// Return an error straight away.
    Fail(&'static str),
    /// Panic straight away.
    Panic,
}

/// Node with caller-chosen ports and run behavior.
pub struct ScriptedNode {
    base: NodeBase,
    inputs: Vec<String>,
    outputs: Vec<String>,
    script: Script,
    init_error: Option<String>,
    runs: Arc<AtomicUsize>,
}

impl ScriptedNode {
    pub fn builder(name: &str) -> ScriptedNodeBuilder {
        ScriptedNodeBuilder {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            script: Script::Idle,
            init_error: None,
        }
    }

    /// Counter of `run` activations, shared with the node.
    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

impl Node for ScriptedNode {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn init(&mut self, _config: &NodeConfig) -> NodeResult<()> {
        if let Some(message) = &self.init_error {
            return Err(NodeError::config(self.base.name(), message.clone()));
        }
        for name in &self.inputs {
            self.base.add_input_port(name.clone());
        }
        for name in &self.outputs {
            self.base.add_output_port(name.clone());
        }
        Ok(())
    }

    fn run(&mut self) -> NodeResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.script.clone() {
            Script::Idle => {}
            Script::Emit(values) => {
                let port = self.base.output_port(0).cloned();
                for value in values {
                    let Some(port) = &port else { break };
                    if forward(port, Packet::new(value))? == Forwarded::Stopped {
                        return Ok(());
                    }
                }
            }
            Script::Flood => {
                let Some(port) = self.base.output_port(0).cloned() else {
                    return Ok(());
                };
                let mut value = 0i64;
                while self.is_running() {
                    match forward(&port, Packet::new(value))? {
                        Forwarded::Sent => {}
                        Forwarded::Dropped => self.base.idle(),
                        Forwarded::Stopped => return Ok(()),
                    }
                    value += 1;
                }
            }
            Script::Fail(message) => return Err(NodeError::Failed(message.to_string())),
            Script::Panic => panic!("scripted panic in '{}'", self.base.name()),
        }

        while self.is_running() {
            self.base.idle();
        }
        Ok(())
    }
}

/// Builder for [`ScriptedNode`]
pub struct ScriptedNodeBuilder {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    script: Script,
    init_error: Option<String>,
}

impl ScriptedNodeBuilder {
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.push(name.to_string());
        self
    }

    pub fn output(mut self, name: &str) -> Self {
        self.outputs.push(name.to_string());
        self
    }

    pub fn script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn failing_init(mut self, message: &str) -> Self {
        self.init_error = Some(message.to_string());
        self
    }

    pub fn build(self) -> ScriptedNode {
        ScriptedNode {
            base: NodeBase::new(self.name),
            inputs: self.inputs,
            outputs: self.outputs,
            script: self.script,
            init_error: self.init_error,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scripted_node_builder() {
        let mut node = ScriptedNode::builder("n")
            .input("a_input")
            .output("b_output")
            .build();
        node.init(&json!({})).unwrap();
        assert_eq!(node.base().input_ports().len(), 1);
        assert_eq!(node.base().output_ports()[0].name(), "b_output");
    }
}
