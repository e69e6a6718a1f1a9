//! Shared running flag for a node.
//!
//! The flag doubles as a cancellation token: ports created by a node carry a
//! clone of it, blocking stream operations re-check it while they wait, and
//! [`RunFlag::stop`] wakes every stream the node's ports are bound to so a
//! producer parked on a full stream returns promptly.

use crate::pipeline::stream::{Stream, StreamHandle};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Default)]
struct Inner {
    running: AtomicBool,
    /// Streams to interrupt on stop.
    watched: Mutex<Vec<Weak<Stream>>>,
}

/// Cooperative running flag. Starts out stopped.
#[derive(Clone, Default)]
pub struct RunFlag {
    inner: Arc<Inner>,
}

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn set_running(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
    }

    /// Clear the flag and wake every watched stream.
    ///
    /// Does not wait for the owner's run loop to observe the change.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);

        let streams: Vec<StreamHandle> = self
            .inner
            .watched
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for stream in streams {
            stream.interrupt();
        }
    }

    /// Register a stream to be interrupted when this flag stops.
    pub fn watch(&self, stream: &StreamHandle) {
        let mut watched = self.inner.watched.lock();
        watched.retain(|w| w.strong_count() > 0);
        if !watched.iter().any(|w| w.as_ptr() == Arc::as_ptr(stream)) {
            watched.push(Arc::downgrade(stream));
        }
    }

    /// Number of live streams currently watched.
    pub fn watched_count(&self) -> usize {
        self.inner
            .watched
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Whether both handles refer to the same flag.
    pub fn same_flag(&self, other: &RunFlag) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RunFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunFlag")
            .field("running", &self.is_running())
            .finish()
    }
}
