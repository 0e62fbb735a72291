//! # Test status and result model.
//!
//! A test's externally observable outcome is its result plus an optional
//! structured cause. Status and result move independently until the test is
//! finalized; after that both are frozen.
//!
//! ## Rules
//! - `Unknown` is never a terminal result: finalization forces it to `Error`
//!   with a "finished without result" cause
//! - A non-passing result always carries a cause; `Pass` never does

use crate::error::TestError;

/// Coarse execution status of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// Created but not yet picked up by a runner.
    Created,
    /// The lifecycle controller is executing the test.
    Running,
    /// Terminal state; status and result are frozen.
    Done,
}

/// Terminal result of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    /// No result recorded yet.
    Unknown,
    /// The test passed.
    Pass,
    /// The test ran and failed.
    Fail,
    /// The test could not produce a verdict (infra failure, kill, ...).
    Error,
    /// The test or its job exceeded a deadline.
    Timeout,
}

impl TestResult {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            TestResult::Unknown => "unknown",
            TestResult::Pass => "pass",
            TestResult::Fail => "fail",
            TestResult::Error => "error",
            TestResult::Timeout => "timeout",
        }
    }

    /// True for every result except `Pass` and `Unknown`.
    pub fn is_non_passing(self) -> bool {
        !matches!(self, TestResult::Pass | TestResult::Unknown)
    }
}

/// A result together with the error that produced it.
///
/// `cause` is `None` exactly when the result is `Pass` or `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultWithCause {
    /// The recorded result.
    pub result: TestResult,
    /// Structured cause for non-passing results.
    pub cause: Option<TestError>,
}

impl ResultWithCause {
    /// An empty result (`Unknown`, no cause).
    pub fn unknown() -> Self {
        Self {
            result: TestResult::Unknown,
            cause: None,
        }
    }

    /// A passing result.
    pub fn pass() -> Self {
        Self {
            result: TestResult::Pass,
            cause: None,
        }
    }

    /// A non-passing result with its cause.
    pub fn non_passing(result: TestResult, cause: TestError) -> Self {
        Self {
            result,
            cause: Some(cause),
        }
    }
}
