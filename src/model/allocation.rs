//! # Device allocation: the set of devices assigned to a test.
//!
//! An [`Allocation`] is immutable per version. Refreshing device status never
//! mutates it in place; the tracker builds a new instance and swaps the
//! shared reference, so concurrent readers either see the old version or the
//! new one, never a mix.

use std::collections::BTreeMap;

/// Locator of a single device in a lab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLocator {
    /// Device id (serial or lab-assigned id).
    pub id: String,
    /// Hostname of the lab server controlling the device.
    pub host: String,
}

impl DeviceLocator {
    /// Creates a locator.
    pub fn new(id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
        }
    }
}

impl std::fmt::Display for DeviceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.host)
    }
}

/// The devices assigned to a test, with per-device dimension maps.
///
/// ### Invariants
/// - `dimensions.len() == devices.len()`, index-aligned
/// - Exactly one allocation is active per test at a time; it is replaced,
///   not mutated, when device status is refreshed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    test_id: String,
    devices: Vec<DeviceLocator>,
    dimensions: Vec<BTreeMap<String, String>>,
}

impl Allocation {
    /// Creates an allocation with empty dimension maps.
    pub fn new(test_id: impl Into<String>, devices: Vec<DeviceLocator>) -> Self {
        let dimensions = vec![BTreeMap::new(); devices.len()];
        Self {
            test_id: test_id.into(),
            devices,
            dimensions,
        }
    }

    /// Creates an allocation carrying refreshed per-device dimensions.
    ///
    /// `dimensions` must be index-aligned with `devices`.
    pub fn with_device_dimensions(
        test_id: impl Into<String>,
        devices: Vec<DeviceLocator>,
        dimensions: Vec<BTreeMap<String, String>>,
    ) -> Self {
        debug_assert_eq!(devices.len(), dimensions.len());
        Self {
            test_id: test_id.into(),
            devices,
            dimensions,
        }
    }

    /// Id of the test this allocation belongs to.
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// Ordered device locators.
    pub fn device_locators(&self) -> &[DeviceLocator] {
        &self.devices
    }

    /// Number of allocated devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// True if no devices are allocated.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Dimension map of the device at `index`, if any.
    pub fn dimensions_of(&self, index: usize) -> Option<&BTreeMap<String, String>> {
        self.dimensions.get(index)
    }

    /// Per-device dimension maps, index-aligned with the locators.
    pub fn dimensions(&self) -> &[BTreeMap<String, String>] {
        &self.dimensions
    }
}
