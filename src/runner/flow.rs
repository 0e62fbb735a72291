//! # The collaborator seam the lifecycle drives.
//!
//! [`TestFlow`] bundles the operations a concrete runner supplies: device
//! checking, the pre/post hooks, and the opaque driver invocation. The
//! lifecycle owns the ordering, skip semantics, and error handling; a flow
//! implementation only does the work.
//!
//! ## Contract
//! - `initialize` and `check_device` failures are fatal: the lifecycle
//!   finalizes the test as `Error` and skips straight to cleanup
//! - `pre_run` failures mark the test `Error` but cleanup still runs
//! - `run_test` is the only interruptible operation
//! - `post_run` failures are recorded as warnings and never affect the
//!   result; when it fails the device defaults to [`DeviceRecoveryAction::Reboot`]

use async_trait::async_trait;

use crate::error::TestError;
use crate::model::{Allocation, DeviceFeature, TestInfo, TestResult};

/// What to do with the devices once the test is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRecoveryAction {
    /// Devices are reusable as-is.
    None,
    /// Devices should be rebooted before the next allocation.
    Reboot,
}

/// The lifecycle's terminal report to its launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestExecutionResult {
    /// The test's terminal result.
    pub result: TestResult,
    /// Recovery action requested by the post-run hook.
    pub recovery: DeviceRecoveryAction,
}

/// Operations a concrete runner supplies to the lifecycle.
#[async_trait]
pub trait TestFlow: Send + Sync + 'static {
    /// Prepares the runner before any device interaction.
    async fn initialize(&self, test: &TestInfo, allocation: &Allocation) -> Result<(), TestError>;

    /// Checks every allocated device, returning one feature snapshot per
    /// device, index-aligned with the allocation's locator list.
    async fn check_device(
        &self,
        test: &TestInfo,
        allocation: &Allocation,
    ) -> Result<Vec<DeviceFeature>, TestError>;

    /// Preparation before the driver runs.
    ///
    /// `skipped` reports whether a plugin already requested a skip in the
    /// starting event, so expensive preparation can be avoided.
    async fn pre_run(
        &self,
        skipped: bool,
        test: &TestInfo,
        allocation: &Allocation,
        device_features: &[DeviceFeature],
    ) -> Result<(), TestError>;

    /// Executes the test body (the driver). Opaque to the lifecycle.
    async fn run_test(&self, test: &TestInfo, allocation: &Allocation) -> Result<(), TestError>;

    /// Cleanup after the test has finished, successful or not.
    async fn post_run(
        &self,
        test: &TestInfo,
        allocation: &Allocation,
    ) -> Result<DeviceRecoveryAction, TestError>;

    /// True for tests resumed from a previous run; the lifecycle then skips
    /// initialization, device check, and the pre-run hook.
    fn resumed(&self, test: &TestInfo) -> bool {
        let _ = test;
        false
    }
}
