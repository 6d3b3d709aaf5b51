//! Promise-thread engine for ripple models.
//!
//! A model can be loaded and saved many times over its life. Each round runs
//! on its own *thread*, identified by a [`ThreadId`](ripple_types::ThreadId).
//! Callbacks are tagged with the thread that was current when they were
//! attached, and only ever fire for that thread's outcome:
//!
//! - callbacks attached before finalization fire, in attach order, inside the
//!   `settle` call that finalizes their thread,
//! - callbacks attached after finalization fire immediately inside the
//!   attaching call, with the original payload,
//! - callbacks for a thread that is never finalized (an abandoned round)
//!   simply never fire.
//!
//! Finalization is terminal and idempotent per thread.

mod threads;

pub use threads::{Callback, PromiseThreads, Settlement};
