//! # Lifecycle events: scopes, payloads, and the scoped dispatcher.
//!
//! This module groups the event **data model** and the **scoped dispatcher**
//! used to deliver lifecycle events to subscribers.
//!
//! ## Contents
//! - [`EventScope`] — the ordered delivery scopes and their canonical
//!   before/after-driver orderings
//! - [`EventKind`], [`TestEvent`] — event classification and payload
//! - [`ScopedDispatcher`], [`CapturedFailure`] — ordered delivery with
//!   per-scope failure capture
//! - [`SkipOutcome`], [`merge_skip_requests`] — deterministic merge of
//!   plugin skip requests into one result + cause
//!
//! See `runner/lifecycle.rs` for how the phases drive event posting.

mod dispatcher;
mod event;
mod scope;
mod skip;

pub use dispatcher::{CapturedFailure, ScopedDispatcher};
pub use event::{EventKind, TestEvent};
pub use scope::EventScope;
pub use skip::{merge_skip_requests, SkipOutcome};
