//! # Built-in logging subscriber _(demo/reference only)_.
//!
//! Mirrors lifecycle events into `tracing` at info level. Register it on
//! whichever scope should produce the log lines; it never fails and never
//! requests a skip.

use async_trait::async_trait;

use crate::events::TestEvent;
use crate::subscribers::{PluginError, TestSubscriber};

/// Subscriber that writes one log line per event.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new log writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TestSubscriber for LogWriter {
    async fn on_event(&self, event: &TestEvent) -> Result<(), PluginError> {
        tracing::info!(
            seq = event.seq,
            kind = event.kind.as_label(),
            test = %event.test.locator(),
            devices = event.allocation.device_count(),
            result = event.test.result().as_label(),
            "test event",
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
