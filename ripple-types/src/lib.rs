//! Core type definitions for ripple models.
//!
//! This crate defines the small, dependency-light vocabulary shared by the
//! event channel, the promise-thread engine and the model layer:
//! - [`ThreadId`]: opaque, strictly increasing promise-thread identifier
//! - [`Outcome`]: how a thread was finalized
//! - [`CallbackKind`]: which outcomes a queued callback reacts to
//!
//! Usage errors (bad filter/sort/add arguments, unknown operations) are
//! reported through [`Error`]. Failures reported by services are not errors
//! in this sense; the model layer records them as data.

mod outcome;
mod thread;

pub use outcome::{CallbackKind, Outcome};
pub use thread::ThreadId;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by invalid calls into a model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid filter value provided: {0}")]
    InvalidFilter(String),

    #[error("invalid sort value provided: {0}")]
    InvalidSort(String),

    #[error("invalid object added to collection: {0}")]
    InvalidAddition(String),

    #[error("index {index} out of range for collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("operation `{0}` has no parent implementation")]
    MissingParentOperation(String),

    #[error("operation `{0}` did not return an instance")]
    NotAnInstance(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
