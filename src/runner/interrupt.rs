//! # Interruption classification.
//!
//! When the run phase is cancelled, the lifecycle must report *why*: the
//! cancellation itself carries no reason, but the surrounding state does.
//! [`classify_interrupt`] is the pure decision table mapping that state to
//! exactly one cause; [`InterruptCause::result`] maps the cause to the
//! terminal result.
//!
//! ## Precedence
//! 1. Owning job's deadline expired → `Timeout`
//! 2. Test's own deadline expired → `Timeout`
//! 3. Process shutting down → `Error`
//! 4. Shared lab environment → `Error` (likely device disconnect)
//! 5. Dedicated lab environment → `Error` (likely device disconnect)
//! 6. Otherwise (client environment) → `Error` (explicit kill)
//!
//! The table is a pure function of its four inputs; no clocks, no globals.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::model::TestResult;

/// Process-scoped shutdown state with an explicit handle.
///
/// Cloned into every lifecycle that should observe process shutdown;
/// swappable in tests (no ambient global).
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Creates a signal in the not-shutting-down state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the process as shutting down. Irreversible.
    pub fn trigger(&self) {
        self.0.store(true, AtomicOrdering::Release);
    }

    /// True once shutdown has been triggered.
    pub fn is_shutting_down(&self) -> bool {
        self.0.load(AtomicOrdering::Acquire)
    }
}

/// Where the runner executes, for interruption classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionEnvironment {
    /// Lab server serving a shared device pool.
    SharedLab,
    /// Lab server serving a dedicated (single-tenant) device pool.
    DedicatedLab,
    /// Client-side execution; an interrupt here is a user kill.
    Client,
}

/// Why the run phase was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptCause {
    /// The owning job's deadline expired.
    JobTimeout,
    /// The test's own deadline expired.
    TestTimeout,
    /// The process received a shutdown signal.
    ProcessShutdown,
    /// Interrupted in a shared lab, likely a device disconnect.
    SharedLabDisconnect,
    /// Interrupted in a dedicated lab, likely a device disconnect.
    DedicatedLabDisconnect,
    /// Explicitly killed (client-initiated).
    UserKill,
}

impl InterruptCause {
    /// The terminal result this cause maps to.
    pub fn result(self) -> TestResult {
        match self {
            InterruptCause::JobTimeout | InterruptCause::TestTimeout => TestResult::Timeout,
            InterruptCause::ProcessShutdown
            | InterruptCause::SharedLabDisconnect
            | InterruptCause::DedicatedLabDisconnect
            | InterruptCause::UserKill => TestResult::Error,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            InterruptCause::JobTimeout => "interrupted_job_timeout",
            InterruptCause::TestTimeout => "interrupted_test_timeout",
            InterruptCause::ProcessShutdown => "interrupted_process_shutdown",
            InterruptCause::SharedLabDisconnect => "interrupted_shared_lab",
            InterruptCause::DedicatedLabDisconnect => "interrupted_dedicated_lab",
            InterruptCause::UserKill => "interrupted_user_kill",
        }
    }
}

impl std::fmt::Display for InterruptCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            InterruptCause::JobTimeout => "test interrupted due to job timeout",
            InterruptCause::TestTimeout => "test timeout and interrupted",
            InterruptCause::ProcessShutdown => {
                "test interrupted because the process is shutting down"
            }
            InterruptCause::SharedLabDisconnect => {
                "test interrupted in the shared lab, possibly caused by device disconnection"
            }
            InterruptCause::DedicatedLabDisconnect => {
                "test interrupted in the dedicated lab, possibly caused by device disconnection"
            }
            InterruptCause::UserKill => "test interrupted because it was manually killed",
        };
        f.write_str(message)
    }
}

/// Classifies a run-phase interruption. Exactly one branch applies.
pub fn classify_interrupt(
    job_expired: bool,
    test_expired: bool,
    process_shutting_down: bool,
    environment: ExecutionEnvironment,
) -> InterruptCause {
    if job_expired {
        InterruptCause::JobTimeout
    } else if test_expired {
        InterruptCause::TestTimeout
    } else if process_shutting_down {
        InterruptCause::ProcessShutdown
    } else {
        match environment {
            ExecutionEnvironment::SharedLab => InterruptCause::SharedLabDisconnect,
            ExecutionEnvironment::DedicatedLab => InterruptCause::DedicatedLabDisconnect,
            ExecutionEnvironment::Client => InterruptCause::UserKill,
        }
    }
}
