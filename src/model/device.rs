//! # Per-device capability and state snapshots.
//!
//! A [`DeviceFeature`] is produced by the device-check step, one entry per
//! allocated device, index-aligned with the allocation's locator list.
//! Zipping locators with features yields [`DeviceInfo`] entries describing
//! the devices as seen by the running test.

use std::collections::BTreeMap;

use crate::model::allocation::DeviceLocator;

/// Coarse device availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Not assigned to any test.
    Idle,
    /// Executing a test.
    Busy,
}

/// Capability snapshot of a single device, produced by a device check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFeature {
    /// Device type names (e.g. platform variants) the device exposes.
    pub types: Vec<String>,
    /// Drivers the device supports.
    pub drivers: Vec<String>,
    /// Dimension key/value pairs advertised by the device.
    pub dimensions: BTreeMap<String, String>,
}

impl DeviceFeature {
    /// A feature snapshot with only dimensions set.
    pub fn with_dimensions(dimensions: BTreeMap<String, String>) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }
}

/// A device as seen by the currently running test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Where the device lives.
    pub locator: DeviceLocator,
    /// Availability; always `Busy` while allocated to a running test.
    pub status: DeviceStatus,
    /// Latest capability snapshot.
    pub feature: DeviceFeature,
}

impl DeviceInfo {
    /// Builds the info entry for a device allocated to a running test.
    pub fn for_running_test(locator: DeviceLocator, feature: DeviceFeature) -> Self {
        Self {
            locator,
            status: DeviceStatus::Busy,
            feature,
        }
    }
}
