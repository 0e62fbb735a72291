//! # Per-test message router: cache-then-flush delivery.
//!
//! Messages can arrive while the lifecycle is still in its pre-run phases,
//! before the test-message subscribers are registered. The router buffers
//! those messages and flushes them, in arrival order, exactly once when the
//! lifecycle reports the test as ready ([`MessageRouter::on_test_starting`]).
//! From then on messages are delivered immediately.
//!
//! ## Rules
//! - One coarse lock guards the live flag and the buffer; delivery happens
//!   under it, so buffered and direct messages never interleave out of order
//! - `on_test_starting` first drains messages parked in the
//!   [`ForwardingBuffer`](crate::messaging::ForwardingBuffer) (they arrived
//!   before this runner existed), then the local buffer
//! - Delivery posts a `TestMessage` event on the `TestMessage` scope;
//!   subscriber failures there are logged, never surfaced to the sender

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::events::{EventKind, EventScope, ScopedDispatcher, TestEvent};
use crate::messaging::buffer::ForwardingBuffer;
use crate::messaging::message::TestMessage;
use crate::model::TestInfo;
use crate::runner::DeviceStatusTracker;

struct RouterState {
    live: bool,
    buffer: VecDeque<TestMessage>,
}

/// Buffers and forwards inbound messages for one test.
pub struct MessageRouter {
    test: Arc<TestInfo>,
    dispatcher: Arc<ScopedDispatcher>,
    tracker: Arc<DeviceStatusTracker>,
    forwarding: Option<Arc<ForwardingBuffer>>,
    state: Mutex<RouterState>,
}

impl MessageRouter {
    /// Creates a router for `test`, initially buffering.
    pub fn new(
        test: Arc<TestInfo>,
        dispatcher: Arc<ScopedDispatcher>,
        tracker: Arc<DeviceStatusTracker>,
        forwarding: Option<Arc<ForwardingBuffer>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            test,
            dispatcher,
            tracker,
            forwarding,
            state: Mutex::new(RouterState {
                live: false,
                buffer: VecDeque::new(),
            }),
        })
    }

    /// Delivers a message, or buffers it while the test is not yet ready.
    pub async fn notify(&self, message: TestMessage) {
        let mut state = self.state.lock().await;
        if !state.live {
            state.buffer.push_back(message);
            return;
        }
        self.deliver(message).await;
    }

    /// Flushes buffered messages in arrival order and switches to direct
    /// delivery. Idempotent.
    pub async fn on_test_starting(&self) {
        let mut state = self.state.lock().await;
        if state.live {
            return;
        }
        if let Some(forwarding) = &self.forwarding {
            for message in forwarding.poll(&self.test.locator().id) {
                self.deliver(message).await;
            }
        }
        while let Some(message) = state.buffer.pop_front() {
            self.deliver(message).await;
        }
        state.live = true;
    }

    /// True once buffered delivery has been flushed.
    pub async fn is_live(&self) -> bool {
        self.state.lock().await.live
    }

    async fn deliver(&self, message: TestMessage) {
        let snapshot = self.tracker.snapshot().await;
        let mut event = TestEvent::new(
            EventKind::TestMessage,
            Arc::clone(&self.test),
            snapshot.allocation,
        )
        .with_message(message);
        if let Some(infos) = snapshot.device_infos {
            event = event.with_device_infos(infos);
        }
        self.dispatcher
            .post(&event, &[EventScope::TestMessage])
            .await;
        for failure in self.dispatcher.poll_failures(EventScope::TestMessage) {
            tracing::warn!(
                test = %self.test.locator(),
                subscriber = failure.subscriber,
                error = %failure.error,
                "test message subscriber failed",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Allocation, JobInfo, TestLocator, Timer};
    use crate::subscribers::{PluginError, TestSubscriber};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct MessageRecorder {
        markers: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl TestSubscriber for MessageRecorder {
        async fn on_event(&self, event: &TestEvent) -> Result<(), PluginError> {
            let marker = event
                .message
                .as_ref()
                .and_then(|m| m.properties.get("marker"))
                .cloned()
                .unwrap_or_default();
            self.markers.lock().unwrap().push(marker);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "message_recorder"
        }
    }

    fn router_fixture() -> (Arc<MessageRouter>, Arc<MessageRecorder>, Arc<ForwardingBuffer>) {
        let job = JobInfo::new("job-1", Timer::unlimited());
        let test = TestInfo::new(
            TestLocator {
                id: "t-1".into(),
                name: "demo".into(),
                job_id: "job-1".into(),
            },
            job,
            Timer::unlimited(),
        );
        let dispatcher = Arc::new(ScopedDispatcher::new());
        let recorder = Arc::new(MessageRecorder {
            markers: StdMutex::new(Vec::new()),
        });
        dispatcher.register(EventScope::TestMessage, Arc::clone(&recorder) as _);
        let tracker = Arc::new(DeviceStatusTracker::new(Arc::new(Allocation::new(
            "t-1",
            vec![],
        ))));
        let forwarding = Arc::new(ForwardingBuffer::new(8));
        let router = MessageRouter::new(test, dispatcher, tracker, Some(Arc::clone(&forwarding)));
        (router, recorder, forwarding)
    }

    fn message(marker: &str) -> TestMessage {
        TestMessage::new("t-1").with_property("marker", marker)
    }

    #[tokio::test]
    async fn test_messages_before_starting_are_buffered_then_flushed_fifo() {
        let (router, recorder, _) = router_fixture();
        router.notify(message("a")).await;
        router.notify(message("b")).await;
        assert!(recorder.markers.lock().unwrap().is_empty());

        router.on_test_starting().await;
        assert_eq!(*recorder.markers.lock().unwrap(), vec!["a", "b"]);

        // A second activation must not replay anything.
        router.on_test_starting().await;
        assert_eq!(recorder.markers.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_messages_after_starting_are_delivered_directly() {
        let (router, recorder, _) = router_fixture();
        router.on_test_starting().await;
        assert!(router.is_live().await);

        router.notify(message("direct")).await;
        assert_eq!(*recorder.markers.lock().unwrap(), vec!["direct"]);
    }

    #[tokio::test]
    async fn test_forwarded_messages_flush_before_local_buffer() {
        let (router, recorder, forwarding) = router_fixture();
        forwarding.push(message("forwarded"));
        router.notify(message("local")).await;

        router.on_test_starting().await;
        assert_eq!(
            *recorder.markers.lock().unwrap(),
            vec!["forwarded", "local"]
        );
        // The forwarding entry was consumed, not copied.
        assert!(forwarding.is_empty());
    }
}
