//! # Test entity: identity, deadline timers, and mutable outcome state.
//!
//! [`TestInfo`] is the result/error sink the lifecycle controller reports
//! into. Status and result live behind a single lock so that finalization is
//! one atomic transition, callable concurrently from the normal post-run path
//! and from an external killer.
//!
//! ## Rules
//! - Status only moves forward: `Created → Running → Done`
//! - Once `Done`, result/status mutations are dropped with a logged warning
//! - Warnings stay appendable after `Done` (cleanup failures are recorded
//!   while the result is already frozen)

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::TestError;
use crate::model::result::{ResultWithCause, TestResult, TestStatus};

/// Deadline timer for a test or job.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// A timer expiring `timeout` from now.
    pub fn expiring(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A timer that never expires.
    pub fn unlimited() -> Self {
        Self { deadline: None }
    }

    /// True once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// Identity of a test within its job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestLocator {
    /// Globally unique test id.
    pub id: String,
    /// Human-readable test name.
    pub name: String,
    /// Id of the owning job.
    pub job_id: String,
}

impl std::fmt::Display for TestLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.id)
    }
}

/// The job owning one or more tests.
///
/// Shared by every test of the job; carries the job-level deadline consulted
/// by the interruption classifier.
#[derive(Debug)]
pub struct JobInfo {
    id: String,
    timer: Timer,
}

impl JobInfo {
    /// Creates a job with the given deadline timer.
    pub fn new(id: impl Into<String>, timer: Timer) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            timer,
        })
    }

    /// Job id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Job deadline timer.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }
}

/// Status + result behind one lock, so finalization is a single transition.
struct TestState {
    status: TestStatus,
    result: ResultWithCause,
}

/// A single test: identity, timers, and the mutable outcome state the
/// lifecycle controller writes into.
///
/// ### Ownership
/// Owned exclusively by the lifecycle controller during execution;
/// externally visible through the read accessors. All mutators are safe to
/// call concurrently (external killers race the normal path).
pub struct TestInfo {
    locator: TestLocator,
    job: Arc<JobInfo>,
    timer: Timer,
    state: Mutex<TestState>,
    warnings: Mutex<Vec<TestError>>,
}

impl TestInfo {
    /// Creates a test in `Created` status with an `Unknown` result.
    pub fn new(locator: TestLocator, job: Arc<JobInfo>, timer: Timer) -> Arc<Self> {
        Arc::new(Self {
            locator,
            job,
            timer,
            state: Mutex::new(TestState {
                status: TestStatus::Created,
                result: ResultWithCause::unknown(),
            }),
            warnings: Mutex::new(Vec::new()),
        })
    }

    /// Test identity.
    pub fn locator(&self) -> &TestLocator {
        &self.locator
    }

    /// The owning job.
    pub fn job(&self) -> &Arc<JobInfo> {
        &self.job
    }

    /// Test deadline timer.
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Current status.
    pub fn status(&self) -> TestStatus {
        self.state.lock().unwrap().status
    }

    /// Current result.
    pub fn result(&self) -> TestResult {
        self.state.lock().unwrap().result.result
    }

    /// Current result with its cause.
    pub fn result_with_cause(&self) -> ResultWithCause {
        self.state.lock().unwrap().result.clone()
    }

    /// Marks the test as running. No-op once `Done`.
    pub fn set_running(&self) {
        let mut state = self.state.lock().unwrap();
        if state.status == TestStatus::Done {
            tracing::warn!(test = %self.locator, "ignoring status change on finalized test");
            return;
        }
        state.status = TestStatus::Running;
    }

    /// Records a passing result. Dropped with a warning once `Done`.
    pub fn set_pass(&self) {
        let mut state = self.state.lock().unwrap();
        if state.status == TestStatus::Done {
            tracing::warn!(test = %self.locator, "ignoring result change on finalized test");
            return;
        }
        state.result = ResultWithCause::pass();
    }

    /// Records a non-passing result with its cause, overwriting any earlier
    /// result. Dropped with a warning once `Done`.
    pub fn set_non_passing(&self, result: TestResult, cause: TestError) {
        let mut state = self.state.lock().unwrap();
        if state.status == TestStatus::Done {
            tracing::warn!(
                test = %self.locator,
                dropped = cause.as_label(),
                "ignoring result change on finalized test",
            );
            return;
        }
        state.result = ResultWithCause::non_passing(result, cause);
    }

    /// Appends a non-fatal warning. Allowed after finalization.
    pub fn add_warning(&self, warning: TestError) {
        tracing::warn!(test = %self.locator, warning = %warning, "test warning");
        self.warnings.lock().unwrap().push(warning);
    }

    /// Snapshot of the accumulated warnings.
    pub fn warnings(&self) -> Vec<TestError> {
        self.warnings.lock().unwrap().clone()
    }

    /// Marks the test `Done` if it is not already. Returns whether this call
    /// performed the transition.
    pub fn mark_done(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.status == TestStatus::Done {
            return false;
        }
        state.status = TestStatus::Done;
        true
    }

    /// Finalizes the test out-of-band (e.g. from an external killer).
    ///
    /// If the status is not yet `Done`, forces it to `Done` and, if the
    /// result is still `Unknown`, records `Error` with the supplied cause.
    /// Safe to call concurrently with the normal post-run path: whichever
    /// caller observes a non-`Done` status first performs the transition.
    ///
    /// Returns whether this call performed the transition.
    pub fn finalize(&self, error: TestError) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.status == TestStatus::Done {
            return false;
        }
        state.status = TestStatus::Done;
        if state.result.result == TestResult::Unknown {
            tracing::warn!(test = %self.locator, cause = %error, "finalizing test without result");
            state.result = ResultWithCause::non_passing(TestResult::Error, error);
        }
        true
    }
}

impl std::fmt::Debug for TestInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestInfo")
            .field("locator", &self.locator)
            .field("status", &self.status())
            .field("result", &self.result())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_info() -> Arc<TestInfo> {
        let job = JobInfo::new("job-1", Timer::unlimited());
        TestInfo::new(
            TestLocator {
                id: "t-1".into(),
                name: "demo".into(),
                job_id: "job-1".into(),
            },
            job,
            Timer::unlimited(),
        )
    }

    #[test]
    fn test_finalize_transitions_exactly_once() {
        let test = test_info();
        assert!(test.finalize(TestError::FinishedWithoutResult));
        assert!(!test.finalize(TestError::KilledAfterDeadline));
        assert_eq!(test.status(), TestStatus::Done);
        assert_eq!(test.result(), TestResult::Error);
        assert_eq!(
            test.result_with_cause().cause,
            Some(TestError::FinishedWithoutResult)
        );
    }

    #[test]
    fn test_finalize_keeps_existing_result() {
        let test = test_info();
        test.set_non_passing(
            TestResult::Timeout,
            TestError::KilledAfterDeadline,
        );
        assert!(test.finalize(TestError::FinishedWithoutResult));
        assert_eq!(test.result(), TestResult::Timeout);
        assert_eq!(
            test.result_with_cause().cause,
            Some(TestError::KilledAfterDeadline)
        );
    }

    #[test]
    fn test_result_frozen_after_done() {
        let test = test_info();
        test.set_pass();
        test.mark_done();
        test.set_non_passing(TestResult::Error, TestError::FinishedWithoutResult);
        assert_eq!(test.result(), TestResult::Pass);
    }

    #[test]
    fn test_warnings_appendable_after_done() {
        let test = test_info();
        test.mark_done();
        test.add_warning(TestError::Cleanup {
            error: "device wipe failed".into(),
        });
        assert_eq!(test.warnings().len(), 1);
    }

    #[test]
    fn test_timer_expiry() {
        assert!(!Timer::unlimited().is_expired());
        assert!(Timer::expiring(Duration::ZERO).is_expired());
        assert!(!Timer::expiring(Duration::from_secs(3600)).is_expired());
    }
}
