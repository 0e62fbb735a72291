//! # Launcher: connect-once handshake and single-invocation execution gate.
//!
//! A [`RunnerLauncher`] binds exactly one runner and guarantees the runner's
//! execute path is entered at most once at a time. The *when* of launching
//! is a separate strategy concern ([`LaunchStrategy`]); [`SpawnedLauncher`]
//! is the straightforward strategy that launches on the tokio runtime as
//! soon as it is asked.
//!
//! ## Rules
//! - `connect` binds exactly once; a second attempt fails fast
//! - `execute_once` atomically flips an is-executing flag; a concurrent or
//!   duplicate call observes [`LauncherError::AlreadyExecuting`] — this is a
//!   caller bug, not a runtime condition
//! - The flag resets on every exit path (drop guard)

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LauncherError;
use crate::runner::flow::TestExecutionResult;

/// A connected runner the launcher can execute.
#[async_trait]
pub trait Launchable: Send + Sync + 'static {
    /// Id of the test this runner executes (for error reports).
    fn test_id(&self) -> &str;

    /// Runs the test to completion, returning its terminal report.
    async fn execute(&self) -> TestExecutionResult;
}

/// Connect-once binding plus the single-invocation execution gate.
pub struct RunnerLauncher {
    runner: Mutex<Option<Arc<dyn Launchable>>>,
    executing: AtomicBool,
}

/// Resets the is-executing flag on every exit path.
struct ExecutingGuard<'a>(&'a AtomicBool);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, AtomicOrdering::Release);
    }
}

impl RunnerLauncher {
    /// Creates an unconnected launcher.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runner: Mutex::new(None),
            executing: AtomicBool::new(false),
        })
    }

    /// Binds the runner. Fails with [`LauncherError::AlreadyConnected`] on a
    /// second attempt.
    pub fn connect(&self, runner: Arc<dyn Launchable>) -> Result<(), LauncherError> {
        let mut bound = self.runner.lock().unwrap();
        if let Some(existing) = bound.as_ref() {
            return Err(LauncherError::AlreadyConnected {
                test_id: existing.test_id().to_string(),
            });
        }
        *bound = Some(runner);
        Ok(())
    }

    /// True once a runner is bound.
    pub fn is_connected(&self) -> bool {
        self.runner.lock().unwrap().is_some()
    }

    /// Non-blocking read of the is-executing flag.
    ///
    /// Launch strategies use this to avoid scheduling duplicate launches.
    pub fn is_executing(&self) -> bool {
        self.executing.load(AtomicOrdering::Acquire)
    }

    /// Executes the bound runner, at most one invocation at a time.
    ///
    /// Exactly one of two concurrent callers proceeds; the other observes
    /// [`LauncherError::AlreadyExecuting`] without touching the runner.
    pub async fn execute_once(&self) -> Result<TestExecutionResult, LauncherError> {
        let runner = self
            .runner
            .lock()
            .unwrap()
            .as_ref()
            .map(Arc::clone)
            .ok_or(LauncherError::NotConnected)?;

        if self
            .executing
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_err()
        {
            return Err(LauncherError::AlreadyExecuting {
                test_id: runner.test_id().to_string(),
            });
        }
        let _guard = ExecutingGuard(&self.executing);
        Ok(runner.execute().await)
    }
}

/// Strategy deciding *when* a connected runner is allowed to execute.
#[async_trait]
pub trait LaunchStrategy: Send + Sync + 'static {
    /// Starts the launch asynchronously. Never invoked twice.
    async fn async_launch(&self) -> Result<(), LauncherError>;

    /// Kills the launched execution.
    async fn kill(&self);

    /// True while the launched execution is still running.
    fn is_running(&self) -> bool;
}

/// Launch strategy that executes the gate on the tokio runtime immediately.
pub struct SpawnedLauncher {
    gate: Arc<RunnerLauncher>,
    kill_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<Result<TestExecutionResult, LauncherError>>>>,
}

impl SpawnedLauncher {
    /// Creates a strategy over the gate; `kill_token` is cancelled by
    /// [`kill`](LaunchStrategy::kill) and should be the lifecycle's kill
    /// token.
    pub fn new(gate: Arc<RunnerLauncher>, kill_token: CancellationToken) -> Self {
        Self {
            gate,
            kill_token,
            handle: Mutex::new(None),
        }
    }

    /// Awaits the spawned execution, if one was launched.
    pub async fn wait(&self) -> Option<Result<TestExecutionResult, LauncherError>> {
        let handle = self.handle.lock().unwrap().take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(join_error) => {
                tracing::warn!(error = %join_error, "launched execution task failed");
                None
            }
        }
    }
}

#[async_trait]
impl LaunchStrategy for SpawnedLauncher {
    async fn async_launch(&self) -> Result<(), LauncherError> {
        let gate = Arc::clone(&self.gate);
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            let test_id = self
                .gate
                .runner
                .lock()
                .unwrap()
                .as_ref()
                .map(|r| r.test_id().to_string())
                .unwrap_or_default();
            return Err(LauncherError::AlreadyExecuting { test_id });
        }
        *handle = Some(tokio::spawn(async move { gate.execute_once().await }));
        Ok(())
    }

    async fn kill(&self) {
        self.kill_token.cancel();
    }

    fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
