//! FIFO packet queue connecting an output port to an input port.
//!
//! A single mutex guards the queue. Producers blocked on a full bounded
//! stream park on a condition variable and are woken by `pop` (or by
//! [`Stream::interrupt`] when their node is stopped) rather than polling.
//!
//! # Push timeouts
//!
//! | `PushTimeout`  | stream full                                   |
//! |----------------|-----------------------------------------------|
//! | `Forever`      | wait until space frees                        |
//! | `NonBlocking`  | fail with `QueueError::Full` immediately      |
//! | `Within(d)`    | wait up to `d`, then fail with `Full`         |
//!
//! Unbounded streams never block.

use crate::pipeline::error::QueueError;
use crate::pipeline::id::StreamId;
use crate::pipeline::packet::Packet;
use crate::pipeline::run_flag::RunFlag;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared handle to a stream. Held by the ports on both ends.
pub type StreamHandle = Arc<Stream>;

/// Maximum number of queued packets.
///
/// `Bounded(0)` is representable but always full; boundary streams refuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capacity {
    #[default]
    Unbounded,
    Bounded(usize),
}

impl Capacity {
    /// `None` maps to unbounded.
    pub fn from_max_size(max_size: Option<usize>) -> Self {
        max_size.map_or(Capacity::Unbounded, Capacity::Bounded)
    }

    pub fn max_size(self) -> Option<usize> {
        match self {
            Capacity::Unbounded => None,
            Capacity::Bounded(n) => Some(n),
        }
    }

    /// `Bounded(0)`: a stream that is always full.
    #[inline]
    pub fn is_zero(self) -> bool {
        self == Capacity::Bounded(0)
    }

    #[inline]
    fn is_full(self, len: usize) -> bool {
        match self {
            Capacity::Unbounded => false,
            Capacity::Bounded(n) => len >= n,
        }
    }
}

impl From<Option<usize>> for Capacity {
    fn from(max_size: Option<usize>) -> Self {
        Self::from_max_size(max_size)
    }
}

/// How long a push may wait for space on a full bounded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushTimeout {
    #[default]
    Forever,
    NonBlocking,
    Within(Duration),
}

impl PushTimeout {
    /// Millisecond convention: negative waits forever, zero never waits.
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => PushTimeout::Forever,
            0 => PushTimeout::NonBlocking,
            ms => PushTimeout::Within(Duration::from_millis(ms as u64)),
        }
    }
}

impl From<Duration> for PushTimeout {
    fn from(d: Duration) -> Self {
        PushTimeout::Within(d)
    }
}

/// Lifetime counters for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub pushed: u64,
    pub popped: u64,
    /// Pushes that gave up because the stream stayed full.
    pub rejected: u64,
}

struct State {
    queue: VecDeque<Packet>,
    stats: StreamStats,
}

/// FIFO queue of packets, optionally bounded.
pub struct Stream {
    id: StreamId,
    capacity: Capacity,
    state: Mutex<State>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl Stream {
    pub fn new(capacity: Capacity) -> Self {
        let queue = match capacity {
            Capacity::Bounded(n) => VecDeque::with_capacity(n.min(1024)),
            Capacity::Unbounded => VecDeque::new(),
        };
        Self {
            id: StreamId::next(),
            capacity,
            state: Mutex::new(State {
                queue,
                stats: StreamStats::default(),
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(Capacity::Unbounded)
    }

    /// Stream holding at most `max_size` packets.
    ///
    /// `max_size` should be positive: a zero bound is accepted but yields a
    /// stream that is always full, so every push either fails or waits until
    /// its producer is stopped.
    pub fn bounded(max_size: usize) -> Self {
        Self::new(Capacity::Bounded(max_size))
    }

    /// Create a stream already wrapped in a shareable handle.
    pub fn shared(capacity: Capacity) -> StreamHandle {
        Arc::new(Self::new(capacity))
    }

    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    #[inline]
    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Bound on queued packets, `None` when unbounded.
    #[inline]
    pub fn max_size(&self) -> Option<usize> {
        self.capacity.max_size()
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_full(self.len())
    }

    pub fn stats(&self) -> StreamStats {
        self.state.lock().stats
    }

    /// Append a packet, waiting for space according to `timeout`.
    pub fn push(&self, packet: Packet, timeout: PushTimeout) -> Result<(), QueueError> {
        self.push_inner(packet, timeout, None)
    }

    /// Like [`push`](Self::push), but a wait is abandoned with
    /// `QueueError::Cancelled` once `flag` is no longer running.
    pub fn push_while(
        &self,
        packet: Packet,
        timeout: PushTimeout,
        flag: &RunFlag,
    ) -> Result<(), QueueError> {
        self.push_inner(packet, timeout, Some(flag))
    }

    fn push_inner(
        &self,
        packet: Packet,
        timeout: PushTimeout,
        flag: Option<&RunFlag>,
    ) -> Result<(), QueueError> {
        // A deadline too far out to represent is treated as no deadline.
        let deadline = match timeout {
            PushTimeout::Within(d) => Instant::now().checked_add(d),
            _ => None,
        };

        let mut state = self.state.lock();
        loop {
            if !self.capacity.is_full(state.queue.len()) {
                state.queue.push_back(packet);
                state.stats.pushed += 1;
                drop(state);
                self.not_empty.notify_one();
                return Ok(());
            }

            if flag.is_some_and(|f| !f.is_running()) {
                return Err(QueueError::Cancelled);
            }

            match (timeout, deadline) {
                (PushTimeout::NonBlocking, _) => {
                    state.stats.rejected += 1;
                    return Err(QueueError::Full);
                }
                (PushTimeout::Within(_), Some(deadline)) => {
                    if Instant::now() >= deadline {
                        state.stats.rejected += 1;
                        return Err(QueueError::Full);
                    }
                    self.not_full.wait_until(&mut state, deadline);
                }
                _ => self.not_full.wait(&mut state),
            }
        }
    }

    /// Remove the head packet without blocking.
    pub fn pop(&self) -> Result<Packet, QueueError> {
        let state = self.state.lock();
        self.take_front(state)
    }

    /// Remove the head packet, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Packet, QueueError> {
        self.pop_inner(timeout, None)
    }

    /// Like [`pop_timeout`](Self::pop_timeout), but gives up with
    /// `QueueError::Cancelled` once `flag` is no longer running.
    pub fn pop_while(&self, timeout: Duration, flag: &RunFlag) -> Result<Packet, QueueError> {
        self.pop_inner(timeout, Some(flag))
    }

    fn pop_inner(&self, timeout: Duration, flag: Option<&RunFlag>) -> Result<Packet, QueueError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        loop {
            if !state.queue.is_empty() {
                return self.take_front(state);
            }
            if flag.is_some_and(|f| !f.is_running()) {
                return Err(QueueError::Cancelled);
            }
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(QueueError::Empty);
                    }
                    self.not_empty.wait_until(&mut state, deadline);
                }
                None => self.not_empty.wait(&mut state),
            }
        }
    }

    fn take_front(&self, mut state: MutexGuard<'_, State>) -> Result<Packet, QueueError> {
        let packet = state.queue.pop_front().ok_or(QueueError::Empty)?;
        state.stats.popped += 1;
        drop(state);
        self.not_full.notify_one();
        Ok(packet)
    }

    /// Wake every thread blocked on this stream so it re-checks its run flag.
    pub fn interrupt(&self) {
        // Notify under the lock so a waiter cannot miss the wake-up between
        // checking its flag and parking.
        let _state = self.state.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
