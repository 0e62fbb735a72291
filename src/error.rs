//! Error types used by the labvisor runner and its collaborators.
//!
//! This module defines two main error enums:
//!
//! - [`TestError`] — failures raised while executing a test. These never
//!   escape the lifecycle's top-level execute path; they are converted into
//!   the test's terminal result + cause, or appended to its warning list.
//! - [`LauncherError`] — precondition violations in the launcher handshake
//!   (double-connect, double-execute). These indicate a caller bug, fail
//!   fast, and are the only error class that escapes the execute path.
//!
//! Both types provide `as_label` returning a short stable label for
//! logs/metrics.

use thiserror::Error;

use crate::runner::interrupt::InterruptCause;

/// # Precondition violations in the launcher handshake.
///
/// These are programmer errors, not runtime conditions: retrying the same
/// call can never succeed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LauncherError {
    /// A runner was already connected to this launcher.
    #[error("launcher already connected to test {test_id}")]
    AlreadyConnected {
        /// Id of the test whose runner holds the connection.
        test_id: String,
    },

    /// `execute_once` was invoked while a previous invocation is still running.
    #[error("test {test_id} is already executing")]
    AlreadyExecuting {
        /// Id of the test being executed.
        test_id: String,
    },

    /// The launcher was asked to execute before any runner was connected.
    #[error("no runner connected to the launcher")]
    NotConnected,
}

impl LauncherError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LauncherError::AlreadyConnected { .. } => "launcher_already_connected",
            LauncherError::AlreadyExecuting { .. } => "launcher_already_executing",
            LauncherError::NotConnected => "launcher_not_connected",
        }
    }
}

/// # Failures raised while executing a test.
///
/// A `TestError` ends up in exactly one of two places: as the **cause**
/// attached to a non-passing test result, or as an entry in the test's
/// **warning list** (cleanup and plugin failures that must not affect the
/// result).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    /// The run phase was interrupted; the cause carries the classification.
    #[error("{cause}")]
    Interrupted {
        /// Classified interruption cause (see [`InterruptCause`]).
        cause: InterruptCause,
    },

    /// Device check returned a feature list whose length does not match the
    /// allocation. Indicates an upstream allocation bug; never retried.
    #[error("unmatched device count: allocated {allocated}, checked {checked}")]
    UnmatchedDeviceCount {
        /// Number of devices in the active allocation.
        allocated: usize,
        /// Number of device features returned by the check.
        checked: usize,
    },

    /// Initialization or another pre-run step failed.
    #[error("test setup failed: {error}")]
    Setup {
        /// The underlying error message.
        error: String,
    },

    /// The device-check step failed.
    #[error("device check failed: {error}")]
    DeviceCheck {
        /// The underlying error message.
        error: String,
    },

    /// The driver (test body) failed.
    #[error("driver failed: {error}")]
    Driver {
        /// The underlying error message.
        error: String,
    },

    /// A subscriber failed while handling an event.
    #[error("plugin [{subscriber}] failed: {error}")]
    Plugin {
        /// Name of the failing subscriber.
        subscriber: &'static str,
        /// The underlying error message.
        error: String,
    },

    /// Plugins requested to skip the test before the driver ran.
    #[error("test skipped by plugin: {report}")]
    SkippedByPlugin {
        /// Merged report of all skip requests (winner + suppressed).
        report: String,
    },

    /// Plugins requested a skip after the driver had already ended; the
    /// request is ignored and the result stays as the driver left it.
    #[error("plugins requested a skip after the driver ended; result unchanged: {report}")]
    LateSkipRequest {
        /// Merged report of the ignored skip requests.
        report: String,
    },

    /// The driver completed normally but never set a result.
    #[error("test finished without result")]
    FinishedWithoutResult,

    /// The post-run cleanup hook failed. Recorded as a warning only.
    #[error("post-test cleanup failed: {error}")]
    Cleanup {
        /// The underlying error message.
        error: String,
    },

    /// An external killer terminated the test after its deadline expired.
    #[error("test killed after exceeding its deadline")]
    KilledAfterDeadline,
}

impl TestError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TestError::Interrupted { cause } => cause.as_label(),
            TestError::UnmatchedDeviceCount { .. } => "unmatched_device_count",
            TestError::Setup { .. } => "test_setup_failed",
            TestError::DeviceCheck { .. } => "device_check_failed",
            TestError::Driver { .. } => "driver_failed",
            TestError::Plugin { .. } => "plugin_failed",
            TestError::SkippedByPlugin { .. } => "skipped_by_plugin",
            TestError::LateSkipRequest { .. } => "late_skip_request",
            TestError::FinishedWithoutResult => "finished_without_result",
            TestError::Cleanup { .. } => "cleanup_failed",
            TestError::KilledAfterDeadline => "killed_after_deadline",
        }
    }

    /// True if this error came from the interruption classifier.
    pub fn is_interruption(&self) -> bool {
        matches!(self, TestError::Interrupted { .. })
    }
}
