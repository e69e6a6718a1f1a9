//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use crossbeam_channel::Receiver;
use dataflow_rs::Packet;
use std::time::{Duration, Instant};

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("dataflow_rs=debug")
        .try_init();
}

/// Receive `n` i64 packets, panicking if they do not arrive in time.
pub fn collect_i64(rx: &Receiver<Packet>, n: usize) -> Vec<i64> {
    let deadline = Instant::now() + test_timeout();
    let mut values = Vec::with_capacity(n);
    while values.len() < n {
        let left = deadline.saturating_duration_since(Instant::now());
        let packet = rx
            .recv_timeout(left)
            .unwrap_or_else(|_| panic!("only {} of {} packets arrived", values.len(), n));
        values.push(*packet.get::<i64>().expect("i64 packet"));
    }
    values
}

/// Poll `cond` until it holds or the test timeout passes.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    cond()
}
