//! Pipeline-specific error types.
//!
//! Each operation family has its own closed enum so call sites can match
//! exhaustively. [`Status`] flattens all of them into one kind taxonomy with
//! stable integer codes for logging and interop.

use std::fmt;
use thiserror::Error;

/// Flat status kind shared by every error family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    /// Pop on an empty stream.
    QueueEmpty,
    /// Bounded push exhausted its timeout.
    QueueFull,
    /// Operation on an unbound port.
    NullPointer,
    /// Invalid packet or argument.
    IllegalParam,
    /// Start requested before the pipeline was initialized.
    InitFail,
    /// Stop requested on a pipeline that was never initialized.
    NotInit,
    /// Send on an output port with no streams.
    NotConnected,
    /// Blocking push abandoned because the producer was stopped.
    Cancelled,
    /// Node-defined failure.
    Failed,
}

impl Status {
    /// Integer code for this status. `Success` is zero, failures are negative.
    pub const fn code(self) -> i32 {
        match self {
            Status::Success => 0,
            Status::QueueEmpty => -1001,
            Status::QueueFull => -1002,
            Status::NullPointer => -1003,
            Status::IllegalParam => -1004,
            Status::InitFail => -1005,
            Status::NotInit => -1006,
            Status::Cancelled => -1007,
            Status::Failed => -1008,
            Status::NotConnected => -1,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Errors from stream push/pop.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Stream is empty")]
    Empty,

    #[error("Stream is full")]
    Full,

    #[error("Push cancelled: producer was stopped")]
    Cancelled,
}

impl QueueError {
    pub fn status(&self) -> Status {
        match self {
            QueueError::Empty => Status::QueueEmpty,
            QueueError::Full => Status::QueueFull,
            QueueError::Cancelled => Status::Cancelled,
        }
    }
}

/// Errors from typed packet access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("Packet is empty")]
    Empty,

    #[error("Packet type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl PacketError {
    pub fn status(&self) -> Status {
        Status::IllegalParam
    }
}

/// Errors from port send/recv.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("Input port '{0}' has no bound stream")]
    Unbound(String),

    #[error("Output port '{0}' is not connected to any stream")]
    NotConnected(String),

    #[error("Cannot send an invalid packet")]
    InvalidPacket,

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl PortError {
    pub fn status(&self) -> Status {
        match self {
            PortError::Unbound(_) => Status::NullPointer,
            PortError::NotConnected(_) => Status::NotConnected,
            PortError::InvalidPacket => Status::IllegalParam,
            PortError::Queue(e) => e.status(),
        }
    }

    /// True when the failure is a transient empty/full queue the caller should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PortError::Queue(QueueError::Empty) | PortError::Queue(QueueError::Full)
        )
    }
}

/// Errors returned by node `init` and `run`.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Invalid config for node '{node}': {message}")]
    Config { node: String, message: String },

    #[error("Port error: {0}")]
    Port(#[from] PortError),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("{0}")]
    Failed(String),
}

impl NodeError {
    pub fn config(node: impl Into<String>, message: impl Into<String>) -> Self {
        NodeError::Config {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            NodeError::Config { .. } => Status::IllegalParam,
            NodeError::Port(e) => e.status(),
            NodeError::Packet(e) => e.status(),
            NodeError::Failed(_) => Status::Failed,
        }
    }
}

pub type NodeResult<T> = std::result::Result<T, NodeError>;

/// Errors that can occur while assembling or driving a pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline has not been initialized")]
    InitFail,

    #[error("Pipeline was never initialized")]
    NotInit,

    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    #[error("Node '{name}' failed to initialize: {source}")]
    NodeInit {
        name: String,
        #[source]
        source: NodeError,
    },

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("Node '{node}' has no {direction} port '{port}'")]
    UnknownPort {
        node: String,
        port: String,
        direction: &'static str,
    },

    #[error("Unknown node kind '{0}'")]
    UnknownKind(String),

    #[error("No matching ports between '{from}' and '{to}'")]
    NoMatchingPorts { from: String, to: String },

    #[error("Node '{0}' is running")]
    NodeBusy(String),

    #[error("Failed to spawn thread for node '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pipeline config: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn status(&self) -> Status {
        match self {
            PipelineError::InitFail => Status::InitFail,
            PipelineError::NotInit => Status::NotInit,
            PipelineError::NodeInit { .. } | PipelineError::Spawn { .. } => Status::InitFail,
            PipelineError::DuplicateNode(_)
            | PipelineError::UnknownNode(_)
            | PipelineError::UnknownPort { .. }
            | PipelineError::UnknownKind(_)
            | PipelineError::NoMatchingPorts { .. }
            | PipelineError::Config(_) => Status::IllegalParam,
            PipelineError::NodeBusy(_) => Status::Failed,
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
