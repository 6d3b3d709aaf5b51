//! Promise-thread identifiers.
//!
//! Every load/save round of a model runs on its own thread index. Indices
//! start at one and only ever grow, so a stale index can never be confused
//! with a newer round.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one promise-thread of a model instance.
///
/// There is no public constructor besides [`ThreadId::FIRST`] and
/// [`ThreadId::next`]; indices are handed out by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(u64);

impl ThreadId {
    /// The index every fresh instance starts on.
    pub const FIRST: Self = Self(1);

    /// Returns the index that follows this one.
    ///
    /// # Panics
    ///
    /// Panics once the `u64` index space is used up, since handing out the
    /// last index again would let a stale round settle a newer one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self.checked_next() {
            Some(next) => next,
            None => panic!("promise-thread index space exhausted"),
        }
    }

    /// Returns the index that follows this one, or `None` after the last.
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }

    /// Returns the raw ordinal.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
