//! # Device status tracking: absorb a device check into the allocation.
//!
//! The tracker owns the shared snapshot read by the lifecycle and the
//! message router: the current allocation version plus the device
//! infos/features from the last check. A device check **replaces** the
//! snapshot wholesale — readers either see the previous version or the new
//! one, never a mix — and a failed validation leaves it untouched.
//!
//! ## Rules
//! - Single writer (the lifecycle's check-device step), multiple readers
//! - `len(features) == allocation.device_count()` or the update is rejected
//!   with a fatal error and no partial state
//! - Each device's dimensions come solely from its own feature snapshot
//!   (full replacement, no merge with prior dimensions)

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::TestError;
use crate::model::{Allocation, DeviceFeature, DeviceInfo};

/// One coherent view of the allocation and the last device check.
///
/// `device_infos`/`device_features` are `None` until the first successful
/// update. Readers take one snapshot per phase, not per access.
#[derive(Clone)]
pub struct DeviceSnapshot {
    /// Current allocation version.
    pub allocation: Arc<Allocation>,
    /// Device infos from the last check.
    pub device_infos: Option<Arc<[DeviceInfo]>>,
    /// Device features from the last check.
    pub device_features: Option<Arc<[DeviceFeature]>>,
}

/// Maintains the allocated devices' snapshot for one test.
pub struct DeviceStatusTracker {
    snapshot: RwLock<DeviceSnapshot>,
}

impl DeviceStatusTracker {
    /// Creates a tracker over the initial allocation.
    pub fn new(allocation: Arc<Allocation>) -> Self {
        Self {
            snapshot: RwLock::new(DeviceSnapshot {
                allocation,
                device_infos: None,
                device_features: None,
            }),
        }
    }

    /// Current snapshot (allocation + last check results).
    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Current allocation version.
    pub async fn allocation(&self) -> Arc<Allocation> {
        Arc::clone(&self.snapshot.read().await.allocation)
    }

    /// Absorbs a device-check result.
    ///
    /// Validates the feature count against the current allocation, derives
    /// the busy device infos, and swaps in a new allocation carrying each
    /// device's refreshed dimensions. On mismatch nothing changes and a
    /// fatal [`TestError::UnmatchedDeviceCount`] is returned.
    pub async fn update(&self, features: Vec<DeviceFeature>) -> Result<Arc<Allocation>, TestError> {
        let mut snapshot = self.snapshot.write().await;
        let allocated = snapshot.allocation.device_count();
        if allocated != features.len() {
            return Err(TestError::UnmatchedDeviceCount {
                allocated,
                checked: features.len(),
            });
        }

        let infos: Vec<DeviceInfo> = snapshot
            .allocation
            .device_locators()
            .iter()
            .zip(features.iter())
            .map(|(locator, feature)| DeviceInfo::for_running_test(locator.clone(), feature.clone()))
            .collect();
        let dimensions = features.iter().map(|f| f.dimensions.clone()).collect();
        let allocation = Arc::new(Allocation::with_device_dimensions(
            snapshot.allocation.test_id().to_string(),
            snapshot.allocation.device_locators().to_vec(),
            dimensions,
        ));

        tracing::debug!(
            test = snapshot.allocation.test_id(),
            devices = allocated,
            "device status updated",
        );

        snapshot.allocation = Arc::clone(&allocation);
        snapshot.device_infos = Some(infos.into());
        snapshot.device_features = Some(features.into());
        Ok(allocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceLocator;
    use std::collections::BTreeMap;

    fn two_device_allocation() -> Arc<Allocation> {
        Arc::new(Allocation::new(
            "t-1",
            vec![
                DeviceLocator::new("device-a", "lab-1"),
                DeviceLocator::new("device-b", "lab-1"),
            ],
        ))
    }

    fn feature(key: &str, value: &str) -> DeviceFeature {
        let mut dimensions = BTreeMap::new();
        dimensions.insert(key.to_string(), value.to_string());
        DeviceFeature::with_dimensions(dimensions)
    }

    #[tokio::test]
    async fn test_update_replaces_allocation_with_fresh_dimensions() {
        let tracker = DeviceStatusTracker::new(two_device_allocation());
        let old = tracker.allocation().await;

        let updated = tracker
            .update(vec![feature("model", "m1"), feature("model", "m2")])
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&old, &updated));
        assert_eq!(updated.device_count(), 2);
        assert_eq!(updated.dimensions_of(0).unwrap()["model"], "m1");
        assert_eq!(updated.dimensions_of(1).unwrap()["model"], "m2");

        let snapshot = tracker.snapshot().await;
        assert_eq!(snapshot.device_infos.as_ref().unwrap().len(), 2);
        assert_eq!(
            snapshot.device_infos.unwrap()[1].locator,
            DeviceLocator::new("device-b", "lab-1")
        );
    }

    #[tokio::test]
    async fn test_dimensions_fully_replaced_not_merged() {
        let tracker = DeviceStatusTracker::new(two_device_allocation());
        tracker
            .update(vec![feature("old", "1"), feature("old", "2")])
            .await
            .unwrap();
        let updated = tracker
            .update(vec![feature("new", "1"), feature("new", "2")])
            .await
            .unwrap();

        assert!(updated.dimensions_of(0).unwrap().get("old").is_none());
        assert_eq!(updated.dimensions_of(0).unwrap()["new"], "1");
    }

    #[tokio::test]
    async fn test_mismatched_count_is_fatal_and_leaves_state_untouched() {
        let tracker = DeviceStatusTracker::new(two_device_allocation());
        let before = tracker.allocation().await;

        let err = tracker.update(vec![feature("model", "m1")]).await.unwrap_err();
        assert_eq!(
            err,
            TestError::UnmatchedDeviceCount {
                allocated: 2,
                checked: 1
            }
        );

        let after = tracker.snapshot().await;
        assert!(Arc::ptr_eq(&before, &after.allocation));
        assert!(after.device_infos.is_none());
    }
}
