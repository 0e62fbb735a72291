//! # ScopedDispatcher: ordered event delivery with per-scope failure capture.
//!
//! Delivers one event to the subscribers of each requested scope, strictly
//! in the given scope order and, within a scope, in registration order. A
//! subscriber error or panic is **captured** into that scope's collector —
//! never thrown — so one scope's failure cannot corrupt another scope's
//! delivery, and a failure early in a scope cannot starve the subscribers
//! after it.
//!
//! ## Diagram
//! ```text
//!  post(&event, &EventScope::BEFORE_DRIVER)
//!      │
//!      ├─► ClassInternal   [sub, sub, ...] ──failures──► collector[ClassInternal]
//!      ├─► GlobalInternal  [sub, ...]      ──failures──► collector[GlobalInternal]
//!      ├─► InternalPlugin  [sub, ...]      ──failures──► collector[InternalPlugin]
//!      ├─► ApiPlugin       [sub, ...]      ──failures──► collector[ApiPlugin]
//!      └─► ExternalPlugin  [sub, ...]      ──failures──► collector[ExternalPlugin]
//!
//!  poll_plugin_failures() drains the three plugin collectors only.
//! ```
//!
//! ## Rules
//! - Delivery is sequential and awaited; ordering is exact, not best-effort
//! - Panics are caught (`catch_unwind`) and recorded like failures
//! - Collectors are per-dispatcher state; one dispatcher per test lifecycle

use std::sync::{Arc, Mutex};

use futures::FutureExt;

use crate::events::event::TestEvent;
use crate::events::scope::EventScope;
use crate::subscribers::{PluginError, TestSubscriber};

/// A subscriber failure captured during delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFailure {
    /// Scope the failing subscriber was registered in.
    pub scope: EventScope,
    /// Name of the failing subscriber.
    pub subscriber: &'static str,
    /// What went wrong (skip request or unexpected failure).
    pub error: PluginError,
}

/// One scope's subscriber registry and failure collector.
#[derive(Default)]
struct ScopeBus {
    subscribers: Mutex<Vec<Arc<dyn TestSubscriber>>>,
    failures: Mutex<Vec<CapturedFailure>>,
}

/// Ordered, failure-isolated event delivery across scopes.
pub struct ScopedDispatcher {
    scopes: [ScopeBus; EventScope::COUNT],
}

impl ScopedDispatcher {
    /// Creates a dispatcher with empty registries.
    pub fn new() -> Self {
        Self {
            scopes: std::array::from_fn(|_| ScopeBus::default()),
        }
    }

    /// Registers a subscriber in the given scope.
    ///
    /// Subscribers within a scope are delivered in registration order. There
    /// is no removal: a registry lives exactly as long as its lifecycle.
    pub fn register(&self, scope: EventScope, subscriber: Arc<dyn TestSubscriber>) {
        self.scopes[scope.index()]
            .subscribers
            .lock()
            .unwrap()
            .push(subscriber);
    }

    /// Number of subscribers registered in the given scope.
    pub fn subscriber_count(&self, scope: EventScope) -> usize {
        self.scopes[scope.index()].subscribers.lock().unwrap().len()
    }

    /// Delivers `event` to each scope in `scopes`, strictly in the given
    /// order. Subscriber errors and panics are captured per scope and
    /// retrievable via [`poll_failures`](Self::poll_failures).
    pub async fn post(&self, event: &TestEvent, scopes: &[EventScope]) {
        for &scope in scopes {
            let subscribers: Vec<Arc<dyn TestSubscriber>> = {
                self.scopes[scope.index()]
                    .subscribers
                    .lock()
                    .unwrap()
                    .clone()
            };
            for subscriber in subscribers {
                let delivery = std::panic::AssertUnwindSafe(subscriber.on_event(event));
                match delivery.catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::debug!(
                            scope = scope.as_label(),
                            subscriber = subscriber.name(),
                            error = %error,
                            "subscriber failed",
                        );
                        self.capture(scope, subscriber.name(), error);
                    }
                    Err(panic) => {
                        let error = PluginError::Failure {
                            error: format!("subscriber panicked: {}", panic_message(&panic)),
                        };
                        tracing::warn!(
                            scope = scope.as_label(),
                            subscriber = subscriber.name(),
                            error = %error,
                            "subscriber panicked",
                        );
                        self.capture(scope, subscriber.name(), error);
                    }
                }
            }
        }
    }

    /// Drains the captured failures of one scope, in capture order.
    pub fn poll_failures(&self, scope: EventScope) -> Vec<CapturedFailure> {
        std::mem::take(&mut *self.scopes[scope.index()].failures.lock().unwrap())
    }

    /// Drains the captured failures of the plugin scopes, in scope order
    /// `InternalPlugin → ApiPlugin → ExternalPlugin`, then capture order.
    ///
    /// Infrastructure scopes (`ClassInternal`, `GlobalInternal`) are not
    /// included: their failures never become skip decisions.
    pub fn poll_plugin_failures(&self) -> Vec<CapturedFailure> {
        let mut failures = Vec::new();
        for scope in EventScope::PLUGIN_SCOPES {
            failures.extend(self.poll_failures(scope));
        }
        failures
    }

    fn capture(&self, scope: EventScope, subscriber: &'static str, error: PluginError) {
        self.scopes[scope.index()]
            .failures
            .lock()
            .unwrap()
            .push(CapturedFailure {
                scope,
                subscriber,
                error,
            });
    }
}

impl Default for ScopedDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::model::{Allocation, JobInfo, TestInfo, TestLocator, TestResult, Timer};
    use async_trait::async_trait;

    struct Recorder {
        label: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
        outcome: Option<PluginError>,
    }

    #[async_trait]
    impl TestSubscriber for Recorder {
        async fn on_event(&self, _event: &TestEvent) -> Result<(), PluginError> {
            self.order.lock().unwrap().push(self.label);
            match &self.outcome {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn name(&self) -> &'static str {
            self.label
        }
    }

    struct Panicker;

    #[async_trait]
    impl TestSubscriber for Panicker {
        async fn on_event(&self, _event: &TestEvent) -> Result<(), PluginError> {
            panic!("boom");
        }

        fn name(&self) -> &'static str {
            "panicker"
        }
    }

    fn event() -> TestEvent {
        let job = JobInfo::new("job-1", Timer::unlimited());
        let test = TestInfo::new(
            TestLocator {
                id: "t-1".into(),
                name: "demo".into(),
                job_id: "job-1".into(),
            },
            job,
            Timer::unlimited(),
        );
        TestEvent::new(
            EventKind::TestStarting,
            test,
            Arc::new(Allocation::new("t-1", vec![])),
        )
    }

    fn recorder(
        label: &'static str,
        order: &Arc<Mutex<Vec<&'static str>>>,
        outcome: Option<PluginError>,
    ) -> Arc<Recorder> {
        Arc::new(Recorder {
            label,
            order: Arc::clone(order),
            outcome,
        })
    }

    #[tokio::test]
    async fn test_forward_and_reverse_orderings_mirror() {
        let dispatcher = ScopedDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(EventScope::ClassInternal, recorder("class", &order, None));
        dispatcher.register(EventScope::GlobalInternal, recorder("global", &order, None));
        dispatcher.register(EventScope::InternalPlugin, recorder("internal", &order, None));
        dispatcher.register(EventScope::ApiPlugin, recorder("api", &order, None));
        dispatcher.register(EventScope::ExternalPlugin, recorder("external", &order, None));

        dispatcher.post(&event(), &EventScope::BEFORE_DRIVER).await;
        let forward = std::mem::take(&mut *order.lock().unwrap());
        assert_eq!(forward, vec!["class", "global", "internal", "api", "external"]);

        dispatcher.post(&event(), &EventScope::AFTER_DRIVER).await;
        let backward = std::mem::take(&mut *order.lock().unwrap());
        let mut expected = forward;
        expected.reverse();
        assert_eq!(backward, expected);
    }

    #[tokio::test]
    async fn test_failure_in_one_scope_does_not_block_others() {
        let dispatcher = ScopedDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(EventScope::ExternalPlugin, Arc::new(Panicker));
        dispatcher.register(EventScope::ExternalPlugin, recorder("after-panic", &order, None));
        dispatcher.register(EventScope::ApiPlugin, recorder("api", &order, None));
        dispatcher.register(EventScope::ClassInternal, recorder("class", &order, None));

        dispatcher.post(&event(), &EventScope::AFTER_DRIVER).await;

        // The panicking subscriber is first in delivery order, yet everyone
        // else still ran.
        assert_eq!(
            *order.lock().unwrap(),
            vec!["after-panic", "api", "class"]
        );
        let failures = dispatcher.poll_failures(EventScope::ExternalPlugin);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].subscriber, "panicker");
    }

    #[tokio::test]
    async fn test_poll_plugin_failures_drains_plugin_scopes_only() {
        let dispatcher = ScopedDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let failure = PluginError::Failure {
            error: "nope".into(),
        };
        dispatcher.register(
            EventScope::GlobalInternal,
            recorder("infra", &order, Some(failure.clone())),
        );
        dispatcher.register(
            EventScope::InternalPlugin,
            recorder("plugin", &order, Some(failure.clone())),
        );

        dispatcher.post(&event(), &EventScope::BEFORE_DRIVER).await;

        let plugin_failures = dispatcher.poll_plugin_failures();
        assert_eq!(plugin_failures.len(), 1);
        assert_eq!(plugin_failures[0].subscriber, "plugin");
        // A second poll is empty (drain semantics).
        assert!(dispatcher.poll_plugin_failures().is_empty());
        // The infrastructure failure is still in its own collector.
        assert_eq!(dispatcher.poll_failures(EventScope::GlobalInternal).len(), 1);
    }

    #[tokio::test]
    async fn test_skip_request_is_captured_not_thrown() {
        let dispatcher = ScopedDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let skip = PluginError::SkipTest {
            result: TestResult::Pass,
            reason: "already covered".into(),
        };
        dispatcher.register(EventScope::ApiPlugin, recorder("skipper", &order, Some(skip)));

        dispatcher.post(&event(), &EventScope::BEFORE_DRIVER).await;

        let failures = dispatcher.poll_plugin_failures();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].error.is_skip());
    }
}
