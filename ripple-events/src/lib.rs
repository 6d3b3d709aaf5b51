//! Synchronous publish/subscribe channel for ripple models.
//!
//! Every model instance owns one [`EventChannel`]. Listeners are registered
//! per event name and fire in subscription order, synchronously, inside the
//! [`EventChannel::publish`] call. Nothing is deferred.
//!
//! # Re-entrancy
//!
//! `publish` takes a snapshot of the listener list before dispatching.
//! While dispatching:
//! - a listener removed by an earlier listener is skipped,
//! - a listener added by an earlier listener first fires on the next publish,
//! - a one-shot listener is unregistered before it runs, so a nested publish
//!   of the same event cannot fire it twice.

mod channel;

pub use channel::{EventChannel, Listener, ListenerId};
