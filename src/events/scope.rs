//! # Event delivery scopes.
//!
//! A scope is one of the ordered buses a lifecycle event travels through.
//! Each scope owns an independent subscriber registry and an independent
//! failure collector, so one scope's misbehaving subscriber cannot corrupt
//! delivery in another.
//!
//! ## Orderings
//! Before the driver runs, events flow outermost-last:
//! `ClassInternal → GlobalInternal → InternalPlugin → ApiPlugin → ExternalPlugin`.
//! After the driver, the exact reverse — the onion/middleware convention
//! where the outermost layer wraps the innermost.
//!
//! `TestMessage` is a separate bus for inbound test messages; it takes part
//! in neither ordering.

/// One of the ordered event-delivery buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    /// Runner-internal subscribers registered by the lifecycle itself.
    ClassInternal,
    /// Process-wide infrastructure subscribers shared across runners.
    GlobalInternal,
    /// Plugins shipped with the harness.
    InternalPlugin,
    /// Plugins registered through the client API.
    ApiPlugin,
    /// Dynamically provided user plugins.
    ExternalPlugin,
    /// Inbound test messages; separate from the lifecycle orderings.
    TestMessage,
}

impl EventScope {
    /// Total number of scopes.
    pub(crate) const COUNT: usize = 6;

    /// Delivery order for events posted before the driver has run
    /// (`TestStarting`, `TestStarted`).
    pub const BEFORE_DRIVER: [EventScope; 5] = [
        EventScope::ClassInternal,
        EventScope::GlobalInternal,
        EventScope::InternalPlugin,
        EventScope::ApiPlugin,
        EventScope::ExternalPlugin,
    ];

    /// Delivery order for events posted after the driver has run
    /// (`TestEnding`, `TestEnded`); the exact reverse of
    /// [`BEFORE_DRIVER`](Self::BEFORE_DRIVER).
    pub const AFTER_DRIVER: [EventScope; 5] = [
        EventScope::ExternalPlugin,
        EventScope::ApiPlugin,
        EventScope::InternalPlugin,
        EventScope::GlobalInternal,
        EventScope::ClassInternal,
    ];

    /// The scopes whose captured failures are polled for skip requests.
    ///
    /// `ClassInternal` and `GlobalInternal` host infrastructure, not user
    /// code; their failures are logged but never turn into skip decisions.
    pub const PLUGIN_SCOPES: [EventScope; 3] = [
        EventScope::InternalPlugin,
        EventScope::ApiPlugin,
        EventScope::ExternalPlugin,
    ];

    /// True for the plugin-originated scopes.
    pub fn is_plugin(self) -> bool {
        Self::PLUGIN_SCOPES.contains(&self)
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            EventScope::ClassInternal => "class_internal",
            EventScope::GlobalInternal => "global_internal",
            EventScope::InternalPlugin => "internal_plugin",
            EventScope::ApiPlugin => "api_plugin",
            EventScope::ExternalPlugin => "external_plugin",
            EventScope::TestMessage => "test_message",
        }
    }

    /// Dense index for per-scope storage.
    pub(crate) fn index(self) -> usize {
        match self {
            EventScope::ClassInternal => 0,
            EventScope::GlobalInternal => 1,
            EventScope::InternalPlugin => 2,
            EventScope::ApiPlugin => 3,
            EventScope::ExternalPlugin => 4,
            EventScope::TestMessage => 5,
        }
    }
}
