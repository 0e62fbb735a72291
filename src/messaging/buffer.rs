//! # Cross-test message buffer with periodic sweep.
//!
//! Messages can arrive before their destination test is discoverable (the
//! runner has not been created yet, or a nested test has not reported in).
//! The [`ForwardingBuffer`] holds them keyed by root test id until a router
//! polls them, and a periodic sweep drops entries whose root test the
//! [`ActiveTestRegistry`] no longer knows — otherwise abandoned root tests
//! would grow the buffer without bound.
//!
//! ## Rules
//! - Entries are FIFO per root; `poll` removes the whole entry
//! - Per-root capacity is bounded; overflow drops the **oldest** message
//!   with a logged warning
//! - The sweeper is a cancellable task on a fixed interval; a buffered
//!   message survives at most one sweep after its root test disappears

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::messaging::message::TestMessage;

/// Lookup used by the sweep to decide whether a root test is still known.
pub trait ActiveTestRegistry: Send + Sync + 'static {
    /// True while the root test is discoverable in the harness.
    fn is_known(&self, root_test_id: &str) -> bool;
}

/// Simple set-backed registry of active root tests.
///
/// Harness callers register a test when its runner is created and
/// unregister it when the runner is discarded.
#[derive(Default)]
pub struct ActiveTests {
    tests: RwLock<HashSet<String>>,
}

impl ActiveTests {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a root test as active.
    pub fn register(&self, root_test_id: impl Into<String>) {
        self.tests.write().unwrap().insert(root_test_id.into());
    }

    /// Removes a root test.
    pub fn unregister(&self, root_test_id: &str) {
        self.tests.write().unwrap().remove(root_test_id);
    }
}

impl ActiveTestRegistry for ActiveTests {
    fn is_known(&self, root_test_id: &str) -> bool {
        self.tests.read().unwrap().contains(root_test_id)
    }
}

/// Buffer of messages whose destination test is not yet ready, keyed by
/// root test id.
pub struct ForwardingBuffer {
    capacity_per_root: usize,
    entries: Mutex<HashMap<String, VecDeque<TestMessage>>>,
}

impl ForwardingBuffer {
    /// Creates a buffer holding at most `capacity_per_root` messages per
    /// root test (clamped to a minimum of 1).
    pub fn new(capacity_per_root: usize) -> Self {
        Self {
            capacity_per_root: capacity_per_root.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a buffer from the process-wide config.
    pub fn with_config(config: &Config) -> Self {
        Self::new(config.message_capacity_clamped())
    }

    /// Buffers a message under its root test id.
    ///
    /// When the root's queue is full the oldest message is dropped.
    pub fn push(&self, message: TestMessage) {
        let mut entries = self.entries.lock().unwrap();
        let queue = entries
            .entry(message.root_test_id.clone())
            .or_insert_with(VecDeque::new);
        if queue.len() >= self.capacity_per_root {
            queue.pop_front();
            tracing::warn!(
                root_test = %message.root_test_id,
                capacity = self.capacity_per_root,
                "forwarding buffer full, dropped oldest message",
            );
        }
        queue.push_back(message);
    }

    /// Removes and returns all buffered messages for a root test, in
    /// arrival order.
    pub fn poll(&self, root_test_id: &str) -> Vec<TestMessage> {
        self.entries
            .lock()
            .unwrap()
            .remove(root_test_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Drops every entry whose root test the registry no longer knows.
    ///
    /// Returns the number of messages dropped.
    pub fn sweep(&self, registry: &dyn ActiveTestRegistry) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let mut dropped = 0;
        entries.retain(|root_test_id, queue| {
            if registry.is_known(root_test_id) {
                true
            } else {
                dropped += queue.len();
                tracing::debug!(
                    root_test = %root_test_id,
                    messages = queue.len(),
                    "swept messages for unknown root test",
                );
                false
            }
        });
        dropped
    }

    /// Total number of buffered messages across all roots.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().values().map(VecDeque::len).sum()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Spawns the periodic sweeper.
    ///
    /// Runs until `token` is cancelled. The first tick fires one full
    /// `interval` after the call, not immediately.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        registry: Arc<dyn ActiveTestRegistry>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let buffer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick of `interval` would sweep an empty
            // buffer; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let dropped = buffer.sweep(registry.as_ref());
                        if dropped > 0 {
                            tracing::debug!(dropped, "forwarding buffer sweep");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(root: &str, marker: &str) -> TestMessage {
        TestMessage::new(root).with_property("marker", marker)
    }

    #[test]
    fn test_poll_drains_in_arrival_order() {
        let buffer = ForwardingBuffer::new(8);
        buffer.push(message("root-1", "a"));
        buffer.push(message("root-1", "b"));
        buffer.push(message("root-2", "c"));

        let polled = buffer.poll("root-1");
        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0].properties["marker"], "a");
        assert_eq!(polled[1].properties["marker"], "b");
        assert!(buffer.poll("root-1").is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = ForwardingBuffer::new(2);
        buffer.push(message("root-1", "a"));
        buffer.push(message("root-1", "b"));
        buffer.push(message("root-1", "c"));

        let polled = buffer.poll("root-1");
        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0].properties["marker"], "b");
        assert_eq!(polled[1].properties["marker"], "c");
    }

    #[test]
    fn test_sweep_drops_unknown_roots_only() {
        let buffer = ForwardingBuffer::new(8);
        let registry = ActiveTests::new();
        registry.register("known");
        buffer.push(message("known", "keep"));
        buffer.push(message("gone", "drop-1"));
        buffer.push(message("gone", "drop-2"));

        assert_eq!(buffer.sweep(&registry), 2);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.poll("known").len(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_sweeper_task_runs_on_interval() {
        let buffer = Arc::new(ForwardingBuffer::new(8));
        let registry: Arc<dyn ActiveTestRegistry> = Arc::new(ActiveTests::new());
        let token = CancellationToken::new();
        buffer.push(message("gone", "x"));

        let handle = buffer.spawn_sweeper(
            Arc::clone(&registry),
            Duration::from_secs(60),
            token.clone(),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(buffer.is_empty());

        token.cancel();
        handle.await.unwrap();
    }
}
