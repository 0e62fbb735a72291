//! # Test message routing and buffering.
//!
//! Inbound test messages arrive on RPC threads with no knowledge of the
//! lifecycle's timing; this module decouples the two.
//!
//! ## Contents
//! - [`TestMessage`] — the message payload
//! - [`MessageRouter`] — per-test cache-then-flush delivery onto the
//!   `TestMessage` event scope
//! - [`ForwardingBuffer`] — cross-test buffer for messages whose destination
//!   test is not yet discoverable, swept periodically against an
//!   [`ActiveTestRegistry`]
//! - [`ActiveTests`] — a simple registry implementation for harness callers
//!
//! ## Flow
//! ```text
//! inbound delivery ──► ForwardingBuffer (test unknown)      sweeper task
//!        │                    │   ▲                        (fixed interval,
//!        │                    ▼   └── drop unknown roots ◄── registry check)
//!        └──────────► MessageRouter ── buffered until on_test_starting()
//!                           │
//!                           ▼ live
//!                  ScopedDispatcher::post(.., TestMessage scope)
//! ```

mod buffer;
mod message;
mod router;

pub use buffer::{ActiveTestRegistry, ActiveTests, ForwardingBuffer};
pub use message::TestMessage;
pub use router::MessageRouter;
