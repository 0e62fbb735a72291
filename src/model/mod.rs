//! # Data model for tests, allocations, and devices.
//!
//! This module groups the entities the lifecycle controller operates on:
//! - [`TestInfo`], [`JobInfo`], [`Timer`] — test identity, mutable
//!   status/result state, and deadline timers
//! - [`TestStatus`], [`TestResult`], [`ResultWithCause`] — terminal-state
//!   model
//! - [`Allocation`], [`DeviceLocator`] — the immutable-per-version device
//!   assignment
//! - [`DeviceFeature`], [`DeviceInfo`], [`DeviceStatus`] — per-device
//!   capability/state snapshots

mod allocation;
mod device;
mod result;
mod test;

pub use allocation::{Allocation, DeviceLocator};
pub use device::{DeviceFeature, DeviceInfo, DeviceStatus};
pub use result::{ResultWithCause, TestResult, TestStatus};
pub use test::{JobInfo, TestInfo, TestLocator, Timer};
