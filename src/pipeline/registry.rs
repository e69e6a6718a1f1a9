//! Node kind registry used when building pipelines from config files.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::Node;
use crate::pipeline::nodes::{SequenceSource, Transform};
use std::collections::HashMap;
use std::fmt;

/// Builds a fresh, uninitialized node with the given name.
pub type NodeFactory = Box<dyn Fn(&str) -> Box<dyn Node> + Send + Sync>;

/// Maps node kind names (`"sequence"`, `"passthrough"`, ...) to factories.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in node kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("sequence", |name| Box::new(SequenceSource::new(name)));
        registry.register("passthrough", |name| Box::new(Transform::passthrough(name)));
        registry
    }

    /// Register `kind`, replacing any previous factory under that name.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Box<dyn Node> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.factories.insert(kind.clone(), Box::new(factory)).is_some() {
            tracing::debug!("Replaced node factory for kind '{}'", kind);
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn create(&self, kind: &str, name: &str) -> PipelineResult<Box<dyn Node>> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| PipelineError::UnknownKind(kind.to_string()))?;
        Ok(factory(name))
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
