//! Named, directional endpoints on a node.
//!
//! An `InputPort` drains exactly one stream (first bind wins). An
//! `OutputPort` fans out to every stream bound to it. Ports are shared behind
//! `Arc` so the pipeline can inspect and wire them while a node body is owned
//! by its execution thread; binding state uses interior mutability.
//!
//! # Naming convention
//!
//! Auto-wiring matches an output named `<base>_output` with an input named
//! `<base>_input`, e.g. `video_output` → `video_input`.

use crate::pipeline::error::PortError;
use crate::pipeline::packet::Packet;
use crate::pipeline::run_flag::RunFlag;
use crate::pipeline::stream::{Capacity, PushTimeout, Stream, StreamHandle};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Reserved suffix for auto-wired input ports.
pub const INPUT_SUFFIX: &str = "_input";
/// Reserved suffix for auto-wired output ports.
pub const OUTPUT_SUFFIX: &str = "_output";

/// Whether a port is an input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            PortDirection::Input => INPUT_SUFFIX,
            PortDirection::Output => OUTPUT_SUFFIX,
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip the reserved suffix for `direction`, if the name carries it.
pub fn base_name(name: &str, direction: PortDirection) -> Option<&str> {
    name.strip_suffix(direction.suffix())
}

// ── Input ──

/// Endpoint that drains one bound stream.
pub struct InputPort {
    name: String,
    stream: OnceLock<StreamHandle>,
    flag: Option<RunFlag>,
}

impl InputPort {
    /// A free-standing port not tied to any node's run flag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream: OnceLock::new(),
            flag: None,
        }
    }

    pub(crate) fn with_flag(name: impl Into<String>, flag: RunFlag) -> Self {
        Self {
            name: name.into(),
            stream: OnceLock::new(),
            flag: Some(flag),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn has_stream(&self) -> bool {
        self.stream.get().is_some()
    }

    pub fn stream(&self) -> Option<&StreamHandle> {
        self.stream.get()
    }

    /// Bind `stream` if the port is still unbound. Returns `false` (and keeps
    /// the existing stream) otherwise.
    pub fn set_stream(&self, stream: StreamHandle) -> bool {
        if self.stream.set(stream).is_err() {
            return false;
        }
        if let (Some(flag), Some(bound)) = (&self.flag, self.stream.get()) {
            flag.watch(bound);
        }
        true
    }

    fn bound(&self) -> Result<&StreamHandle, PortError> {
        self.stream
            .get()
            .ok_or_else(|| PortError::Unbound(self.name.clone()))
    }

    /// Take the next packet without blocking.
    pub fn recv(&self) -> Result<Packet, PortError> {
        Ok(self.bound()?.pop()?)
    }

    /// Take the next packet, waiting up to `timeout` for one to arrive.
    ///
    /// On a node's port the wait also ends when the node is stopped.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Packet, PortError> {
        let stream = self.bound()?;
        let packet = match &self.flag {
            Some(flag) => stream.pop_while(timeout, flag)?,
            None => stream.pop_timeout(timeout)?,
        };
        Ok(packet)
    }
}

impl fmt::Debug for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputPort")
            .field("name", &self.name)
            .field("stream", &self.stream.get().map(|s| s.id()))
            .finish()
    }
}

// ── Output ──

struct Fanout {
    streams: Vec<StreamHandle>,
    timeout: PushTimeout,
}

/// Endpoint that delivers each sent packet to every bound stream.
pub struct OutputPort {
    name: String,
    fanout: RwLock<Fanout>,
    flag: Option<RunFlag>,
}

impl OutputPort {
    /// A free-standing port not tied to any node's run flag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fanout: RwLock::new(Fanout {
                streams: Vec::new(),
                timeout: PushTimeout::Forever,
            }),
            flag: None,
        }
    }

    pub(crate) fn with_flag(name: impl Into<String>, flag: RunFlag) -> Self {
        Self {
            flag: Some(flag),
            ..Self::new(name)
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_stream(&self) -> bool {
        !self.fanout.read().streams.is_empty()
    }

    pub fn stream_count(&self) -> usize {
        self.fanout.read().streams.len()
    }

    /// Snapshot of the bound streams in fan-out order.
    pub fn streams(&self) -> Vec<StreamHandle> {
        self.fanout.read().streams.clone()
    }

    /// Default wait used by [`send`](Self::send) when a bound stream is full.
    pub fn push_timeout(&self) -> PushTimeout {
        self.fanout.read().timeout
    }

    pub fn set_push_timeout(&self, timeout: PushTimeout) {
        self.fanout.write().timeout = timeout;
    }

    /// Append a stream to the fan-out list.
    pub fn add_stream(&self, stream: StreamHandle) {
        if let Some(flag) = &self.flag {
            flag.watch(&stream);
        }
        self.fanout.write().streams.push(stream);
    }

    /// Wire this port to `input` through a new unbounded stream.
    ///
    /// No-op returning `None` when `input` already has a stream.
    pub fn connect(&self, input: &InputPort) -> Option<StreamHandle> {
        self.connect_with_capacity(input, Capacity::Unbounded)
    }

    /// Wire this port to `input` through a new stream of the given capacity.
    pub fn connect_with_capacity(
        &self,
        input: &InputPort,
        capacity: Capacity,
    ) -> Option<StreamHandle> {
        if input.has_stream() {
            return None;
        }
        let stream = Stream::shared(capacity);
        if !input.set_stream(Arc::clone(&stream)) {
            return None;
        }
        self.add_stream(Arc::clone(&stream));
        tracing::debug!(
            "Stream {} wired {} -> {} ({:?})",
            stream.id(),
            self.name,
            input.name(),
            capacity
        );
        Some(stream)
    }

    /// Send to every bound stream using the port's default push timeout.
    pub fn send(&self, packet: Packet) -> Result<(), PortError> {
        let timeout = self.push_timeout();
        self.send_timeout(packet, timeout)
    }

    /// Send to every bound stream in fan-out order.
    ///
    /// Delivery stops at the first stream that fails; streams after it do not
    /// receive the packet, streams before it keep theirs.
    pub fn send_timeout(&self, packet: Packet, timeout: PushTimeout) -> Result<(), PortError> {
        if !packet.is_valid() {
            return Err(PortError::InvalidPacket);
        }

        // Pushes may block, so they run on a snapshot with the lock released.
        let streams = {
            let fanout = self.fanout.read();
            if fanout.streams.is_empty() {
                return Err(PortError::NotConnected(self.name.clone()));
            }
            fanout.streams.clone()
        };

        for stream in &streams {
            match &self.flag {
                Some(flag) => stream.push_while(packet.clone(), timeout, flag)?,
                None => stream.push(packet.clone(), timeout)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<_> = self.fanout.read().streams.iter().map(|s| s.id()).collect();
        f.debug_struct("OutputPort")
            .field("name", &self.name)
            .field("streams", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::{QueueError, Status};

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("video_output", PortDirection::Output), Some("video"));
        assert_eq!(base_name("video_input", PortDirection::Input), Some("video"));
        assert_eq!(base_name("video_input", PortDirection::Output), None);
        assert_eq!(base_name("frames", PortDirection::Input), None);
    }

    #[test]
    fn test_recv_on_unbound_port() {
        let port = InputPort::new("frame_input");
        let err = port.recv().unwrap_err();
        assert_eq!(err, PortError::Unbound("frame_input".into()));
        assert_eq!(err.status(), Status::NullPointer);
    }

    #[test]
    fn test_first_bind_wins() {
        let port = InputPort::new("in");
        let first = Stream::shared(Capacity::Unbounded);
        let second = Stream::shared(Capacity::Unbounded);
        assert!(port.set_stream(Arc::clone(&first)));
        assert!(!port.set_stream(second));
        assert_eq!(port.stream().unwrap().id(), first.id());
    }

    #[test]
    fn test_recv_propagates_queue_empty() {
        let port = InputPort::new("in");
        port.set_stream(Stream::shared(Capacity::Unbounded));
        assert_eq!(port.recv().unwrap_err(), PortError::Queue(QueueError::Empty));
    }

    #[test]
    fn test_send_invalid_packet() {
        let out = OutputPort::new("out");
        let input = InputPort::new("in");
        out.connect(&input);
        assert_eq!(out.send(Packet::empty()), Err(PortError::InvalidPacket));
        assert!(input.stream().unwrap().is_empty());
    }

    #[test]
    fn test_send_without_stream() {
        let out = OutputPort::new("out");
        let err = out.send(Packet::new(1u8)).unwrap_err();
        assert_eq!(err, PortError::NotConnected("out".into()));
        assert_eq!(err.status(), Status::NotConnected);
        assert!(!out.has_stream());
    }

    #[test]
    fn test_connect_creates_and_binds_stream() {
        let out = OutputPort::new("video_output");
        let input = InputPort::new("video_input");
        let stream = out.connect(&input).unwrap();
        assert!(input.has_stream());
        assert_eq!(out.stream_count(), 1);
        assert_eq!(stream.max_size(), None);

        out.send(Packet::new(5u32)).unwrap();
        assert_eq!(*input.recv().unwrap().get::<u32>().unwrap(), 5);
    }

    #[test]
    fn test_connect_is_noop_when_input_bound() {
        let a = OutputPort::new("a_output");
        let b = OutputPort::new("b_output");
        let input = InputPort::new("a_input");
        assert!(a.connect(&input).is_some());
        assert!(b.connect(&input).is_none());
        assert!(!b.has_stream());
    }

    #[test]
    fn test_fan_out_delivers_to_every_stream() {
        let out = OutputPort::new("out");
        let inputs: Vec<InputPort> = (0..3).map(|i| InputPort::new(format!("in{i}"))).collect();
        for input in &inputs {
            out.connect(input);
        }
        let pkt = Packet::new(String::from("frame"));
        out.send(pkt.clone()).unwrap();

        for input in &inputs {
            let got = input.recv().unwrap();
            assert!(got.ptr_eq(&pkt));
        }
    }

    #[test]
    fn test_fan_out_stops_at_first_failure() {
        let out = OutputPort::new("out");
        let first = InputPort::new("first");
        let second = InputPort::new("second");
        let third = InputPort::new("third");
        out.connect(&first);
        out.connect_with_capacity(&second, Capacity::Bounded(1));
        out.connect(&third);

        out.send(Packet::new(1u32)).unwrap();
        let err = out
            .send_timeout(Packet::new(2u32), PushTimeout::NonBlocking)
            .unwrap_err();
        assert_eq!(err, PortError::Queue(QueueError::Full));

        assert_eq!(first.stream().unwrap().len(), 2);
        assert_eq!(second.stream().unwrap().len(), 1);
        assert_eq!(third.stream().unwrap().len(), 1);
    }

    #[test]
    fn test_stopped_node_port_does_not_block() {
        let flag = RunFlag::new();
        let out = OutputPort::with_flag("out", flag.clone());
        let input = InputPort::new("in");
        out.connect_with_capacity(&input, Capacity::Bounded(1));
        assert_eq!(flag.watched_count(), 1);

        out.send(Packet::new(1u32)).unwrap();
        assert_eq!(
            out.send(Packet::new(2u32)),
            Err(PortError::Queue(QueueError::Cancelled))
        );
    }

    #[test]
    fn test_blocked_send_leaves_port_configurable() {
        let out = Arc::new(OutputPort::new("out"));
        let input = InputPort::new("in");
        out.connect_with_capacity(&input, Capacity::Bounded(1));
        out.send(Packet::new(1u32)).unwrap();

        let sender = {
            let out = Arc::clone(&out);
            std::thread::spawn(move || out.send(Packet::new(2u32)))
        };
        std::thread::sleep(Duration::from_millis(20));

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let wiring = {
            let out = Arc::clone(&out);
            std::thread::spawn(move || {
                out.set_push_timeout(PushTimeout::NonBlocking);
                out.add_stream(Stream::shared(Capacity::Unbounded));
                let _ = done_tx.send(out.stream_count());
            })
        };
        let count = done_rx.recv_timeout(Duration::from_secs(1));

        // Unblock the sender whatever happened above.
        assert_eq!(*input.recv().unwrap().get::<u32>().unwrap(), 1);
        assert_eq!(count, Ok(2));
        assert!(sender.join().unwrap().is_ok());
        wiring.join().unwrap();
        assert_eq!(out.push_timeout(), PushTimeout::NonBlocking);
    }
}
