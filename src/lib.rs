//! # labvisor
//!
//! **Labvisor** is the test-execution lifecycle core of a device-lab
//! harness: it runs a single test across one or more allocated devices,
//! posts lifecycle events through ordered subscriber scopes, tracks device
//! status, routes test messages, and classifies failures and interruptions
//! into terminal test results.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!           RunnerLauncher (connect-once, execute_once gate)
//!                  │
//!                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TestLifecycle (per-test state machine)                           │
//! │  - ScopedDispatcher (5 ordered scopes + TestMessage bus)          │
//! │  - DeviceStatusTracker (allocation snapshot, atomic swap)         │
//! │  - MessageRouter (cache-then-flush message delivery)              │
//! │  - classify_interrupt (kill → TIMEOUT/ERROR + cause)              │
//! └──────┬──────────────────────┬─────────────────────────┬───────────┘
//!        │ drives               │ posts                   │ reports
//!        ▼                      ▼                         ▼
//!   TestFlow (trait)      TestSubscriber (trait)      TestInfo
//!   initialize            on_event(&TestEvent)        status/result/
//!   check_device            per scope, in order,      cause/warnings
//!   pre_run                 failures isolated
//!   run_test (driver)
//!   post_run
//! ```
//!
//! ### Lifecycle
//! ```text
//! execute()
//!   ├─► initialize → check_device → tracker.update
//!   ├─► post TestStarting (forward scope order) ── plugins may skip
//!   ├─► pre_run → router goes live → post TestStarted (forward)
//!   ├─► run_test            ── kill here is classified:
//!   │                          job timeout → TIMEOUT
//!   │                          test timeout → TIMEOUT
//!   │                          process shutdown → ERROR
//!   │                          shared/dedicated lab → ERROR (disconnect)
//!   │                          otherwise → ERROR (user kill)
//!   └─► post TestEnding (reverse) → Done → post_run → post TestEnded (reverse)
//! ```
//!
//! ## Features
//! | Area             | Description                                            | Key types / traits                        |
//! |------------------|--------------------------------------------------------|-------------------------------------------|
//! | **Lifecycle**    | Phase state machine with skip/abort and finalization.  | [`TestLifecycle`], [`RunnerSetting`]      |
//! | **Launching**    | Connect-once handshake, single-invocation gate.        | [`RunnerLauncher`], [`LaunchStrategy`]    |
//! | **Events**       | Ordered scoped dispatch with failure isolation.        | [`ScopedDispatcher`], [`EventScope`]      |
//! | **Subscribers**  | Plugin seam; skip requests and failure capture.        | [`TestSubscriber`], [`PluginError`]       |
//! | **Devices**      | Allocation snapshots refreshed from device checks.     | [`DeviceStatusTracker`], [`Allocation`]   |
//! | **Messaging**    | Buffered test-message routing with periodic sweep.     | [`MessageRouter`], [`ForwardingBuffer`]   |
//! | **Errors**       | Typed failures and fail-fast precondition violations.  | [`TestError`], [`LauncherError`]          |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use labvisor::{
//!     Allocation, DeviceFeature, DeviceLocator, DeviceRecoveryAction, JobInfo,
//!     RunnerLauncher, RunnerSetting, TestError, TestFlow, TestInfo, TestLifecycle,
//!     TestLocator, TestResult, Timer,
//! };
//!
//! struct EchoFlow;
//!
//! #[async_trait]
//! impl TestFlow for EchoFlow {
//!     async fn initialize(&self, _: &TestInfo, _: &Allocation) -> Result<(), TestError> {
//!         Ok(())
//!     }
//!     async fn check_device(
//!         &self,
//!         _: &TestInfo,
//!         allocation: &Allocation,
//!     ) -> Result<Vec<DeviceFeature>, TestError> {
//!         Ok(vec![DeviceFeature::default(); allocation.device_count()])
//!     }
//!     async fn pre_run(
//!         &self,
//!         _skipped: bool,
//!         _: &TestInfo,
//!         _: &Allocation,
//!         _: &[DeviceFeature],
//!     ) -> Result<(), TestError> {
//!         Ok(())
//!     }
//!     async fn run_test(&self, test: &TestInfo, _: &Allocation) -> Result<(), TestError> {
//!         test.set_pass();
//!         Ok(())
//!     }
//!     async fn post_run(
//!         &self,
//!         _: &TestInfo,
//!         _: &Allocation,
//!     ) -> Result<DeviceRecoveryAction, TestError> {
//!         Ok(DeviceRecoveryAction::None)
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let job = JobInfo::new("job-1", Timer::unlimited());
//!     let test = TestInfo::new(
//!         TestLocator {
//!             id: "t-1".into(),
//!             name: "hello".into(),
//!             job_id: "job-1".into(),
//!         },
//!         job,
//!         Timer::unlimited(),
//!     );
//!     let allocation = Arc::new(Allocation::new(
//!         "t-1",
//!         vec![DeviceLocator::new("device-a", "lab-1")],
//!     ));
//!
//!     let lifecycle = TestLifecycle::new(
//!         RunnerSetting::new(Arc::clone(&test), allocation),
//!         Arc::new(EchoFlow),
//!     );
//!     let launcher = RunnerLauncher::new();
//!     launcher.connect(lifecycle)?;
//!
//!     let outcome = launcher.execute_once().await?;
//!     assert_eq!(outcome.result, TestResult::Pass);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod messaging;
mod model;
mod runner;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{LauncherError, TestError};
pub use events::{
    merge_skip_requests, CapturedFailure, EventKind, EventScope, ScopedDispatcher, SkipOutcome,
    TestEvent,
};
pub use messaging::{ActiveTestRegistry, ActiveTests, ForwardingBuffer, MessageRouter, TestMessage};
pub use model::{
    Allocation, DeviceFeature, DeviceInfo, DeviceLocator, DeviceStatus, JobInfo, ResultWithCause,
    TestInfo, TestLocator, TestResult, TestStatus, Timer,
};
pub use runner::{
    classify_interrupt, DeviceRecoveryAction, DeviceSnapshot, DeviceStatusTracker,
    ExecutionEnvironment, InterruptCause, Launchable, LaunchStrategy, RunnerLauncher,
    RunnerSetting, ShutdownSignal, SpawnedLauncher, TestExecutionResult, TestFlow, TestLifecycle,
};
pub use subscribers::{PluginError, TestSubscriber};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
