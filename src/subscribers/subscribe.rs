//! # Core subscriber trait
//!
//! `TestSubscriber` is the extension point for plugging lifecycle plugins
//! into the runner. Subscribers are delivered events synchronously, in
//! registration order, within their scope; a failing or panicking subscriber
//! never disturbs delivery to the others.
//!
//! ## Contract
//! - Returning `Err(PluginError::SkipTest {..})` from a before-driver event
//!   (`TestStarting`/`TestStarted`) requests a short-circuit of the run
//!   phase and proposes a result. After the driver has run, the same return
//!   is diagnostics-only.
//! - Returning `Err(PluginError::Failure {..})` records a warning on the
//!   test without affecting its result.
//! - Panics are caught by the dispatcher and treated like `Failure`.

use async_trait::async_trait;
use thiserror::Error;

use crate::events::TestEvent;
use crate::model::TestResult;

/// Failure returned by a subscriber while handling an event.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// Intentional short-circuit: skip the rest of the test and propose a
    /// result. Only honored before the driver has run.
    #[error("skip requested with result {}: {reason}", .result.as_label())]
    SkipTest {
        /// Result the plugin wants recorded on the test.
        result: TestResult,
        /// Why the plugin wants the test skipped.
        reason: String,
    },

    /// Unexpected subscriber failure; recorded as a test warning.
    #[error("{error}")]
    Failure {
        /// The underlying error message.
        error: String,
    },
}

impl PluginError {
    /// True for intentional skip requests.
    pub fn is_skip(&self) -> bool {
        matches!(self, PluginError::SkipTest { .. })
    }
}

/// Contract for lifecycle event subscribers.
///
/// Called inline from the lifecycle's event-posting path. Implementations
/// may block on I/O; they delay the phase they run in, nothing else.
#[async_trait]
pub trait TestSubscriber: Send + Sync + 'static {
    /// Handles a single event for this subscriber.
    async fn on_event(&self, event: &TestEvent) -> Result<(), PluginError>;

    /// Human-readable name (for logs and failure reports).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
