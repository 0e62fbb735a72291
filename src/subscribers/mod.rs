//! # Event subscribers for the test lifecycle.
//!
//! This module provides the [`TestSubscriber`] trait, the [`PluginError`]
//! type subscribers use to signal failures and skip requests, and a built-in
//! [`LogWriter`] (feature `logging`).
//!
//! Subscribers are registered on one of the ordered scopes of the
//! [`ScopedDispatcher`](crate::events::ScopedDispatcher); delivery order and
//! failure isolation are the dispatcher's job, not the subscriber's.

mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use subscribe::{PluginError, TestSubscriber};

#[cfg(feature = "logging")]
pub use log::LogWriter;
