//! # TestLifecycle: the per-test execution state machine.
//!
//! Runs a single test across its allocated devices:
//! initialize → check device → pre-run → run → post-run, with skip/abort
//! semantics contributed by subscribers, interruption classification in the
//! run phase, and unconditional cleanup.
//!
//! ## Phase flow
//! ```text
//! execute()
//!   ├─► status = Running
//!   ├─► do_pre_run()                        (cancellable; cancel = fatal setup error)
//!   │     ├─► flow.initialize()             ── Err → fatal, skip to post-run
//!   │     ├─► flow.check_device()           ── Err → fatal, skip to post-run
//!   │     ├─► tracker.update(features)      ── count mismatch → fatal
//!   │     ├─► post TestStarting  (forward order) ─► skip requests honored
//!   │     ├─► flow.pre_run(skipped)         ── Err → error, still post-run
//!   │     ├─► router.on_test_starting()     (flush buffered messages)
//!   │     └─► post TestStarted   (forward order) ─► skip requests honored
//!   ├─► flow.run_test()                     (only if not skipped/cancelled)
//!   │     └─ cancelled ─► classify_interrupt() → Timeout/Error + cause
//!   └─► do_post_run()                       (always)
//!         ├─► force Error("finished without result") if result Unknown
//!         ├─► post TestEnding   (reverse order) ─► skips diagnostics-only
//!         ├─► status = Done
//!         ├─► flow.post_run()               ── Err → warning, Reboot
//!         └─► post TestEnded    (reverse order)
//! ```
//!
//! ## Rules
//! - Nothing but launcher precondition violations escapes `execute`; every
//!   failure becomes the test's result + cause or a warning
//! - One allocation snapshot per phase; the run phase never observes a
//!   mid-update allocation
//! - `finalize` is idempotent and callable concurrently from an external
//!   killer; whoever observes a non-`Done` status first wins

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TestError;
use crate::events::{
    merge_skip_requests, EventKind, EventScope, ScopedDispatcher, TestEvent,
};
use crate::messaging::{ForwardingBuffer, MessageRouter};
use crate::model::{Allocation, TestInfo, TestResult};
use crate::runner::flow::{DeviceRecoveryAction, TestExecutionResult, TestFlow};
use crate::runner::interrupt::{classify_interrupt, ExecutionEnvironment, ShutdownSignal};
use crate::runner::launcher::Launchable;
use crate::runner::tracker::{DeviceSnapshot, DeviceStatusTracker};
use crate::subscribers::TestSubscriber;

/// Construction-time wiring for one lifecycle.
///
/// Subscriber lists are provided here, at construction time; the lifecycle
/// never discovers plugins itself.
pub struct RunnerSetting {
    /// The test to execute.
    pub test: Arc<TestInfo>,
    /// Initial device allocation.
    pub allocation: Arc<Allocation>,
    /// Where the runner executes (drives interruption classification).
    pub environment: ExecutionEnvironment,
    /// Process-shutdown state shared across runners.
    pub shutdown: ShutdownSignal,
    /// Subscribers for the `InternalPlugin` scope.
    pub internal_plugins: Vec<Arc<dyn TestSubscriber>>,
    /// Subscribers for the `ApiPlugin` scope.
    pub api_plugins: Vec<Arc<dyn TestSubscriber>>,
    /// Subscribers for the `ExternalPlugin` scope.
    pub external_plugins: Vec<Arc<dyn TestSubscriber>>,
    /// Cross-test buffer to drain when the message router goes live.
    pub forwarding: Option<Arc<ForwardingBuffer>>,
}

impl RunnerSetting {
    /// Creates a setting with no plugins, client environment, and a fresh
    /// shutdown signal.
    pub fn new(test: Arc<TestInfo>, allocation: Arc<Allocation>) -> Self {
        Self {
            test,
            allocation,
            environment: ExecutionEnvironment::Client,
            shutdown: ShutdownSignal::new(),
            internal_plugins: Vec::new(),
            api_plugins: Vec::new(),
            external_plugins: Vec::new(),
            forwarding: None,
        }
    }

    /// Sets the execution environment.
    pub fn with_environment(mut self, environment: ExecutionEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Shares the process shutdown signal.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Registers `InternalPlugin` subscribers.
    pub fn with_internal_plugins(mut self, plugins: Vec<Arc<dyn TestSubscriber>>) -> Self {
        self.internal_plugins = plugins;
        self
    }

    /// Registers `ApiPlugin` subscribers.
    pub fn with_api_plugins(mut self, plugins: Vec<Arc<dyn TestSubscriber>>) -> Self {
        self.api_plugins = plugins;
        self
    }

    /// Registers `ExternalPlugin` subscribers.
    pub fn with_external_plugins(mut self, plugins: Vec<Arc<dyn TestSubscriber>>) -> Self {
        self.external_plugins = plugins;
        self
    }

    /// Attaches the cross-test forwarding buffer.
    pub fn with_forwarding(mut self, forwarding: Arc<ForwardingBuffer>) -> Self {
        self.forwarding = Some(forwarding);
        self
    }
}

/// Executes a single test with its allocated devices.
pub struct TestLifecycle {
    test: Arc<TestInfo>,
    flow: Arc<dyn TestFlow>,
    tracker: Arc<DeviceStatusTracker>,
    dispatcher: Arc<ScopedDispatcher>,
    router: Arc<MessageRouter>,
    kill_token: CancellationToken,
    shutdown: ShutdownSignal,
    environment: ExecutionEnvironment,
}

impl TestLifecycle {
    /// Wires a lifecycle from its setting and flow.
    pub fn new(setting: RunnerSetting, flow: Arc<dyn TestFlow>) -> Arc<Self> {
        let dispatcher = Arc::new(ScopedDispatcher::new());
        for plugin in setting.internal_plugins {
            dispatcher.register(EventScope::InternalPlugin, plugin);
        }
        for plugin in setting.api_plugins {
            dispatcher.register(EventScope::ApiPlugin, plugin);
        }
        for plugin in setting.external_plugins {
            dispatcher.register(EventScope::ExternalPlugin, plugin);
        }

        let tracker = Arc::new(DeviceStatusTracker::new(setting.allocation));
        let router = MessageRouter::new(
            Arc::clone(&setting.test),
            Arc::clone(&dispatcher),
            Arc::clone(&tracker),
            setting.forwarding,
        );

        Arc::new(Self {
            test: setting.test,
            flow,
            tracker,
            dispatcher,
            router,
            kill_token: CancellationToken::new(),
            shutdown: setting.shutdown,
            environment: setting.environment,
        })
    }

    /// The test under execution.
    pub fn test(&self) -> &Arc<TestInfo> {
        &self.test
    }

    /// The device status tracker (shared with the message router).
    pub fn tracker(&self) -> &Arc<DeviceStatusTracker> {
        &self.tracker
    }

    /// The per-test message router.
    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Registers a subscriber in the given scope.
    ///
    /// Used by harness code for the infrastructure scopes
    /// (`ClassInternal`, `GlobalInternal`) and for `TestMessage` handlers;
    /// plugin scopes are populated from the [`RunnerSetting`].
    pub fn register_subscriber(&self, scope: EventScope, subscriber: Arc<dyn TestSubscriber>) {
        self.dispatcher.register(scope, subscriber);
    }

    /// Token cancelled when the test is killed.
    pub fn kill_token(&self) -> CancellationToken {
        self.kill_token.clone()
    }

    /// Kills the test. Only the run phase classifies the interruption;
    /// earlier phases abort with a generic fatal error.
    pub fn kill(&self) {
        self.kill_token.cancel();
    }

    /// Records the timeout verdict when an external killer kills an expired
    /// test.
    pub fn post_kill(&self, timeout_expired: bool) {
        if timeout_expired {
            tracing::warn!(test = %self.test.locator(), "killing expired test, marking TIMEOUT");
            self.test
                .set_non_passing(TestResult::Timeout, TestError::KilledAfterDeadline);
        }
    }

    /// Finalizes the test out-of-band (e.g. killed while still allocated but
    /// never run). Idempotent; see [`TestInfo::finalize`].
    pub fn finalize(&self, error: TestError) {
        self.test.finalize(error);
    }

    /// Runs the whole lifecycle. Never panics past a failing phase: every
    /// failure is converted into the test's result/cause or a warning, and
    /// cleanup always runs.
    pub async fn execute(&self) -> TestExecutionResult {
        self.test.set_running();
        let mut execution_error: Option<TestError> = None;
        let mut skip_run = false;

        let device_count = self.tracker.allocation().await.device_count();
        tracing::info!(
            test = %self.test.locator(),
            devices = device_count,
            "start pre-running test",
        );
        let pre_run = tokio::select! {
            result = self.do_pre_run() => result,
            _ = self.kill_token.cancelled() => Err(TestError::Setup {
                error: "interrupted before the driver started".to_string(),
            }),
        };
        match pre_run {
            Ok(skipped) => skip_run = skipped,
            Err(error) => {
                tracing::warn!(
                    test = %self.test.locator(),
                    error = %error,
                    "pre-run failed, skipping driver",
                );
                self.test.set_non_passing(TestResult::Error, error.clone());
                execution_error = Some(error);
                skip_run = true;
            }
        }

        if !skip_run && !self.kill_token.is_cancelled() {
            let snapshot = self.tracker.snapshot().await;
            tracing::info!(test = %self.test.locator(), "start running test");
            let run = tokio::select! {
                result = self.flow.run_test(&self.test, &snapshot.allocation) => result,
                _ = self.kill_token.cancelled() => {
                    let cause = classify_interrupt(
                        self.test.job().timer().is_expired(),
                        self.test.timer().is_expired(),
                        self.shutdown.is_shutting_down(),
                        self.environment,
                    );
                    Err(TestError::Interrupted { cause })
                }
            };
            if let Err(error) = run {
                let result = match &error {
                    TestError::Interrupted { cause } => cause.result(),
                    _ => TestResult::Error,
                };
                self.test.set_non_passing(result, error.clone());
                execution_error = Some(error);
            }
            tracing::info!(test = %self.test.locator(), "run test finished");
        }

        let recovery = self.do_post_run(execution_error).await;
        TestExecutionResult {
            result: self.test.result(),
            recovery,
        }
    }

    /// Initialization, device check, starting/started events, and the
    /// pre-run hook. Returns whether the driver should be skipped.
    async fn do_pre_run(&self) -> Result<bool, TestError> {
        if self.flow.resumed(&self.test) {
            tracing::info!(
                test = %self.test.locator(),
                "resumed test, only activating the message router",
            );
            self.router.on_test_starting().await;
            return Ok(false);
        }

        let allocation = self.tracker.allocation().await;
        self.flow.initialize(&self.test, &allocation).await?;

        if allocation.is_empty() {
            return Err(TestError::Setup {
                error: "allocation contains no devices".to_string(),
            });
        }
        let features = self.flow.check_device(&self.test, &allocation).await?;
        self.tracker.update(features).await?;
        let snapshot = self.tracker.snapshot().await;

        let mut skipped = self
            .post_lifecycle_event(EventKind::TestStarting, &snapshot, None)
            .await;
        self.flow
            .pre_run(
                skipped,
                &self.test,
                &snapshot.allocation,
                snapshot.device_features.as_deref().unwrap_or(&[]),
            )
            .await?;
        self.router.on_test_starting().await;
        skipped |= self
            .post_lifecycle_event(EventKind::TestStarted, &snapshot, None)
            .await;
        Ok(skipped)
    }

    /// Ending/ended events and the post-run hook. Exception-safe: failures
    /// here become warnings, never block finalization.
    async fn do_post_run(&self, execution_error: Option<TestError>) -> DeviceRecoveryAction {
        let snapshot = self.tracker.snapshot().await;
        tracing::info!(test = %self.test.locator(), "start post-running test");

        if self.test.result() == TestResult::Unknown {
            tracing::warn!(
                test = %self.test.locator(),
                "test result not found when test finished, marking ERROR",
            );
            self.test
                .set_non_passing(TestResult::Error, TestError::FinishedWithoutResult);
        }

        self.post_lifecycle_event(EventKind::TestEnding, &snapshot, execution_error.clone())
            .await;
        self.test.mark_done();

        // Devices get rebooted unless the hook completes and says otherwise.
        let mut recovery = DeviceRecoveryAction::Reboot;
        match self.flow.post_run(&self.test, &snapshot.allocation).await {
            Ok(action) => recovery = action,
            Err(error) => self.test.add_warning(error),
        }

        self.post_lifecycle_event(EventKind::TestEnded, &snapshot, execution_error)
            .await;
        tracing::info!(
            test = %self.test.locator(),
            result = self.test.result().as_label(),
            "test finished",
        );
        recovery
    }

    /// Posts a lifecycle event and handles the captured plugin failures.
    ///
    /// Returns whether plugins requested to skip the driver (always `false`
    /// for after-driver events, where skips are diagnostics-only).
    async fn post_lifecycle_event(
        &self,
        kind: EventKind,
        snapshot: &DeviceSnapshot,
        execution_error: Option<TestError>,
    ) -> bool {
        let mut event = TestEvent::new(
            kind,
            Arc::clone(&self.test),
            Arc::clone(&snapshot.allocation),
        );
        if let Some(infos) = &snapshot.device_infos {
            event = event.with_device_infos(Arc::clone(infos));
        }
        if let Some(features) = &snapshot.device_features {
            event = event.with_device_features(Arc::clone(features));
        }
        if let Some(error) = execution_error {
            event = event.with_execution_error(error);
        }

        let after_driver = kind.is_after_driver();
        let scopes: &[EventScope] = if after_driver {
            &EventScope::AFTER_DRIVER
        } else {
            &EventScope::BEFORE_DRIVER
        };
        self.dispatcher.post(&event, scopes).await;
        self.check_plugin_failures(after_driver)
    }

    /// Converts captured plugin failures into warnings and, before the
    /// driver has run, a merged skip decision applied to the test.
    fn check_plugin_failures(&self, after_driver: bool) -> bool {
        // Infrastructure-scope failures were logged at capture; discard.
        for scope in [EventScope::ClassInternal, EventScope::GlobalInternal] {
            let _ = self.dispatcher.poll_failures(scope);
        }

        let failures = self.dispatcher.poll_plugin_failures();
        for failure in failures.iter().filter(|f| !f.error.is_skip()) {
            self.test.add_warning(TestError::Plugin {
                subscriber: failure.subscriber,
                error: failure.error.to_string(),
            });
        }

        let Some(outcome) = merge_skip_requests(&failures) else {
            return false;
        };
        if after_driver {
            self.test.add_warning(TestError::LateSkipRequest {
                report: outcome.report,
            });
            return false;
        }
        outcome.apply(&self.test);
        true
    }
}

#[async_trait]
impl Launchable for TestLifecycle {
    fn test_id(&self) -> &str {
        &self.test.locator().id
    }

    async fn execute(&self) -> TestExecutionResult {
        TestLifecycle::execute(self).await
    }
}
