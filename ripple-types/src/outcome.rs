//! Finalization outcomes and callback kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of a finalized thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The thread completed successfully.
    Resolved,
    /// The thread failed.
    Rejected,
}

impl Outcome {
    /// Returns `true` for [`Outcome::Resolved`].
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Returns `true` for [`Outcome::Rejected`].
    #[must_use]
    pub const fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved => f.write_str("resolved"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// The kind of a queued thread callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackKind {
    Success,
    Fail,
    Always,
    Progress,
}

impl CallbackKind {
    /// Whether a callback of this kind fires for a thread in the given state.
    ///
    /// `None` means the thread is not final yet; only progress callbacks
    /// react to that.
    #[must_use]
    pub const fn fires_on(self, state: Option<Outcome>) -> bool {
        match (self, state) {
            (Self::Success, Some(Outcome::Resolved))
            | (Self::Fail, Some(Outcome::Rejected))
            | (Self::Always, Some(_))
            | (Self::Progress, None) => true,
            _ => false,
        }
    }
}
