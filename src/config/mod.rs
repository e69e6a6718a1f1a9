//! Pipeline configuration files.
//!
//! A pipeline document names its nodes (by registered kind, with a free-form
//! config table handed to `Node::init`) and the links between them. Files are
//! read as TOML or JSON depending on their extension.
//!
//! # Example
//!
//! ```toml
//! name = "counter"
//!
//! [[nodes]]
//! name = "source"
//! kind = "sequence"
//! config = { count = 100, interval_ms = 1 }
//!
//! [[nodes]]
//! name = "relay"
//! kind = "passthrough"
//! config = { port = "seq" }
//!
//! [[links]]
//! from = "source"
//! to = "relay"
//! capacity = 8
//! ```

use crate::error::{Error, Result};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::node::NodeConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One node entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    /// Registry kind, e.g. `"sequence"`.
    pub kind: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: NodeConfig,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            config: NodeConfig::Null,
        }
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }
}

/// One link between two nodes.
///
/// With both `output` and `input` set the ports are wired by name; with
/// neither, every `<base>_output`/`<base>_input` pair is wired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Bound for the created streams; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

impl LinkSpec {
    pub fn auto(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            output: None,
            input: None,
            capacity: None,
        }
    }

    pub fn ports(
        from: impl Into<String>,
        output: impl Into<String>,
        to: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            output: Some(output.into()),
            input: Some(input.into()),
            ..Self::auto(from, to)
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// A complete pipeline document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

/// On-disk encodings, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            _ => Err(Error::Config(format!(
                "Unsupported pipeline file {:?}: expected .toml or .json",
                path
            ))),
        }
    }
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    pub fn link(mut self, spec: LinkSpec) -> Self {
        self.links.push(spec);
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a pipeline file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read pipeline file {:?}: {}", path, e))
        })?;

        let config = match format {
            ConfigFormat::Toml => Self::from_toml_str(&content),
            ConfigFormat::Json => Self::from_json_str(&content),
        }
        .map_err(|e| e.with_context(format!("Failed to parse pipeline file {:?}", path)))?;

        config.validate()?;
        tracing::info!(
            "Loaded pipeline '{}' from {:?} ({} nodes, {} links)",
            config.name,
            path,
            config.nodes.len(),
            config.links.len()
        );
        Ok(config)
    }

    /// Save in the format implied by the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Toml => self.to_toml_string()?,
            ConfigFormat::Json => self.to_json_string()?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!("Failed to write pipeline file {:?}: {}", path, e))
        })
    }

    /// Structural checks that do not need a node registry.
    pub fn validate(&self) -> PipelineResult<()> {
        let mut names = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() {
                return Err(PipelineError::Config("node with empty name".into()));
            }
            if node.kind.is_empty() {
                return Err(PipelineError::Config(format!(
                    "node '{}' has no kind",
                    node.name
                )));
            }
            if !names.insert(node.name.as_str()) {
                return Err(PipelineError::DuplicateNode(node.name.clone()));
            }
        }

        for link in &self.links {
            for end in [&link.from, &link.to] {
                if !names.contains(end.as_str()) {
                    return Err(PipelineError::UnknownNode(end.clone()));
                }
            }
            if link.output.is_some() != link.input.is_some() {
                return Err(PipelineError::Config(format!(
                    "link {} -> {} must name both ports or neither",
                    link.from, link.to
                )));
            }
            if link.capacity == Some(0) {
                return Err(PipelineError::Config(format!(
                    "link {} -> {} has zero capacity",
                    link.from, link.to
                )));
            }
        }
        Ok(())
    }
}
