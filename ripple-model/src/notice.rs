//! Payloads carried by model events.

use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Names of the events published by entities and collections.
pub mod events {
    /// A clone was made; the payload is the new instance.
    pub const CLONED: &str = "cloned";
    /// A thread was resolved.
    pub const RESOLVED: &str = "resolved";
    /// A thread was rejected.
    pub const REJECTED: &str = "rejected";
    /// Progress was reported on a pending thread.
    pub const NOTIFIED: &str = "notified";
    /// A thread was resolved or rejected, or a collection merged its
    /// staged items.
    pub const FINALIZED: &str = "finalized";
    /// A new thread was opened.
    pub const UNFINALIZED: &str = "unfinalized";
}

/// The value handed to event listeners.
#[derive(Clone)]
pub enum Notice {
    /// Plain data (`Value::Null` when the event carries nothing).
    Data(Value),
    /// A model instance, e.g. the result of a clone.
    Instance(Rc<dyn Any>),
}

impl Notice {
    /// Wraps a model instance.
    pub fn instance<T: 'static>(instance: T) -> Self {
        Self::Instance(Rc::new(instance))
    }

    /// The data payload, if this notice carries data.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::Instance(_) => None,
        }
    }

    /// The carried instance, if it is a `T`.
    #[must_use]
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Instance(instance) => instance.downcast_ref::<T>(),
            Self::Data(_) => None,
        }
    }
}

impl From<Value> for Notice {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl fmt::Debug for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}
