//! # Runtime configuration for the harness plumbing.
//!
//! Provides [`Config`], the settings shared by the message-forwarding layer.
//! The lifecycle state machine itself is configured per test through
//! [`RunnerSetting`](crate::runner::RunnerSetting); `Config` only carries the
//! process-wide knobs.

use std::time::Duration;

/// Process-wide configuration.
///
/// ## Field semantics
/// - `sweep_interval`: how often the forwarding-buffer sweeper drops messages
///   whose root test is no longer known
/// - `message_capacity_per_root`: bound on buffered messages per root test
///   (oldest entries are dropped with a warning on overflow)
#[derive(Clone, Debug)]
pub struct Config {
    /// Interval between forwarding-buffer sweeps.
    ///
    /// Buffered messages survive at most one sweep after their root test
    /// disappears from the active-test registry.
    pub sweep_interval: Duration,

    /// Maximum number of buffered messages per root test.
    ///
    /// Minimum value is 1 (clamped by the buffer).
    pub message_capacity_per_root: usize,
}

impl Config {
    /// Returns the per-root message capacity clamped to a minimum of 1.
    #[inline]
    pub fn message_capacity_clamped(&self) -> usize {
        self.message_capacity_per_root.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `sweep_interval = 11 min` (abandoned root tests linger at most one
    ///   extra interval)
    /// - `message_capacity_per_root = 128`
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(11 * 60),
            message_capacity_per_root: 128,
        }
    }
}
