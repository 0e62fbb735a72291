//! # Merging plugin skip requests into one result.
//!
//! Multiple plugins may request a skip from the same event post, each
//! proposing a result. The merge is deterministic: the most severe result
//! wins, and among requests proposing the same result the first captured
//! wins (registration order within a scope, scope order across scopes).
//!
//! ## Priority
//! `Fail > Error > Timeout > Pass` — a non-passing result always beats a
//! passing one. Losing requests are not discarded silently; they are folded
//! into the winning outcome's report, so the test record shows every plugin
//! that asked for a skip.

use crate::error::TestError;
use crate::events::dispatcher::CapturedFailure;
use crate::model::{TestInfo, TestResult};
use crate::subscribers::PluginError;

/// The merged decision of all skip requests from one event post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipOutcome {
    /// The winning result.
    pub result: TestResult,
    /// Report naming the winning request and any suppressed ones.
    pub report: String,
}

impl SkipOutcome {
    /// Applies this outcome to the test: `Pass` sets a passing result,
    /// anything else a non-passing result caused by the skip report.
    pub fn apply(&self, test: &TestInfo) {
        if self.result == TestResult::Pass {
            test.set_pass();
        } else {
            test.set_non_passing(
                self.result,
                TestError::SkippedByPlugin {
                    report: self.report.clone(),
                },
            );
        }
    }
}

/// Rank of a proposed skip result; lower wins.
fn result_rank(result: TestResult) -> u8 {
    match result {
        TestResult::Fail => 0,
        TestResult::Error => 1,
        TestResult::Timeout => 2,
        TestResult::Pass => 3,
        // Unknown is not a result a plugin can meaningfully propose; it
        // never wins over a concrete one.
        TestResult::Unknown => 4,
    }
}

/// Merges the skip requests among `failures` into at most one outcome.
///
/// Non-skip failures are ignored here (the caller records them as
/// warnings). Returns `None` when no request was a skip.
pub fn merge_skip_requests(failures: &[CapturedFailure]) -> Option<SkipOutcome> {
    let mut winner: Option<(&CapturedFailure, TestResult)> = None;
    let mut suppressed: Vec<&CapturedFailure> = Vec::new();

    for failure in failures {
        let PluginError::SkipTest { result, .. } = &failure.error else {
            continue;
        };
        match winner {
            None => winner = Some((failure, *result)),
            Some((_, best)) if result_rank(*result) < result_rank(best) => {
                suppressed.push(winner.take().unwrap().0);
                winner = Some((failure, *result));
            }
            Some(_) => suppressed.push(failure),
        }
    }

    let (top, result) = winner?;
    let mut report = format!(
        "plugin [{}] requested skip with result {}: {}",
        top.subscriber,
        result.as_label(),
        skip_reason(&top.error),
    );
    if !suppressed.is_empty() {
        let others: Vec<String> = suppressed
            .iter()
            .map(|f| format!("plugin [{}] requested {}", f.subscriber, skip_reason(&f.error)))
            .collect();
        report.push_str(&format!("; suppressed: {}", others.join(", ")));
    }
    Some(SkipOutcome { result, report })
}

fn skip_reason(error: &PluginError) -> &str {
    match error {
        PluginError::SkipTest { reason, .. } => reason,
        PluginError::Failure { error } => error,
    }
}
