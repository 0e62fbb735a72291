//! # Test message payload.
//!
//! A message is a flat string map addressed to a test. Nested/sub-test
//! messages are grouped under the top-level (root) test id for buffering, so
//! a message stays deliverable even while only the root test is known to the
//! harness.

use std::collections::BTreeMap;

/// A message addressed to a (possibly nested) test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestMessage {
    /// Top-level test id the message is grouped under.
    pub root_test_id: String,
    /// The destination test id; equals `root_test_id` for top-level tests.
    pub test_id: String,
    /// Message payload.
    pub properties: BTreeMap<String, String>,
}

impl TestMessage {
    /// Creates a message addressed to a top-level test.
    pub fn new(root_test_id: impl Into<String>) -> Self {
        let root: String = root_test_id.into();
        Self {
            test_id: root.clone(),
            root_test_id: root,
            properties: BTreeMap::new(),
        }
    }

    /// Addresses the message to a nested test under the same root.
    pub fn with_test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = test_id.into();
        self
    }

    /// Attaches one payload entry.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
