//! # Lifecycle events posted by the test runner.
//!
//! The [`EventKind`] enum classifies the four lifecycle phases plus inbound
//! test messages. The [`TestEvent`] struct carries a coherent snapshot of
//! the state the subscribers may read: the test handle, the allocation
//! version current at posting time, and (when available) the device
//! infos/features from the last device check.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Within one post call, scopes and subscribers observe the
//! same event instance; across posts, `seq` restores the emission order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::TestError;
use crate::messaging::TestMessage;
use crate::model::{Allocation, DeviceFeature, DeviceInfo, TestInfo};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Pre-run is about to start; posted in forward scope order.
    ///
    /// Skip requests from plugin scopes are honored.
    TestStarting,

    /// Pre-run finished, the driver is about to run; forward scope order.
    ///
    /// Skip requests from plugin scopes are honored.
    TestStarted,

    /// The driver has ended, cleanup is about to run; reverse scope order.
    ///
    /// Skip requests are diagnostics-only.
    TestEnding,

    /// Cleanup finished, the test is finalized; reverse scope order.
    ///
    /// Skip requests are diagnostics-only.
    TestEnded,

    /// An inbound test message; posted on the `TestMessage` scope only.
    TestMessage,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            EventKind::TestStarting => "test_starting",
            EventKind::TestStarted => "test_started",
            EventKind::TestEnding => "test_ending",
            EventKind::TestEnded => "test_ended",
            EventKind::TestMessage => "test_message",
        }
    }

    /// True for the events posted after the driver has run.
    pub fn is_after_driver(self) -> bool {
        matches!(self, EventKind::TestEnding | EventKind::TestEnded)
    }
}

/// A lifecycle event with its state snapshot.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - optional fields are set depending on the [`EventKind`] and the phase
///   the snapshot was taken in
#[derive(Clone)]
pub struct TestEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// The test this event belongs to.
    pub test: Arc<TestInfo>,
    /// Allocation version current when the event was posted.
    pub allocation: Arc<Allocation>,
    /// Device infos from the last device check, if one has run.
    pub device_infos: Option<Arc<[DeviceInfo]>>,
    /// Device features from the last device check, if one has run.
    pub device_features: Option<Arc<[DeviceFeature]>>,
    /// The execution error, on `TestEnding`/`TestEnded` after a failed run.
    pub execution_error: Option<TestError>,
    /// The message payload, on `TestMessage` events.
    pub message: Option<TestMessage>,
}

impl TestEvent {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind, test: Arc<TestInfo>, allocation: Arc<Allocation>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            test,
            allocation,
            device_infos: None,
            device_features: None,
            execution_error: None,
            message: None,
        }
    }

    /// Attaches the device infos from the last device check.
    #[inline]
    pub fn with_device_infos(mut self, infos: Arc<[DeviceInfo]>) -> Self {
        self.device_infos = Some(infos);
        self
    }

    /// Attaches the device features from the last device check.
    #[inline]
    pub fn with_device_features(mut self, features: Arc<[DeviceFeature]>) -> Self {
        self.device_features = Some(features);
        self
    }

    /// Attaches the error the run phase ended with.
    #[inline]
    pub fn with_execution_error(mut self, error: TestError) -> Self {
        self.execution_error = Some(error);
        self
    }

    /// Attaches an inbound message payload.
    #[inline]
    pub fn with_message(mut self, message: TestMessage) -> Self {
        self.message = Some(message);
        self
    }

    /// The primary (first-allocated) device's info, if a check has run.
    pub fn primary_device(&self) -> Option<&DeviceInfo> {
        self.device_infos.as_deref().and_then(|infos| infos.first())
    }
}

impl std::fmt::Debug for TestEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEvent")
            .field("seq", &self.seq)
            .field("kind", &self.kind)
            .field("test", &self.test.locator().id)
            .finish()
    }
}
