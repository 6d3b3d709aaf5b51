//! Reactive data models for ripple.
//!
//! - [`Entity`] is the base model: status flags, error slots, an
//!   [`EventChannel`](ripple_events::EventChannel) and a set of promise
//!   threads that keep callbacks of one load round from firing for another.
//! - [`ModelType`] and [`Extension`] derive new model types from existing
//!   ones, with explicit [`Parent`] delegation for overridden operations.
//! - [`Collection`] holds child models ([`ChildModel`]) and adds lazy
//!   wrapping, selection, reversible filter/sort, staged additions and
//!   serialized read/update rounds against injected [`Service`]s.
//!
//! Everything is single-threaded: handles are `Rc`-based and callbacks run
//! synchronously on the caller's stack.

mod child;
mod collection;
mod entity;
mod extend;
mod notice;

pub use child::{ChildModel, Document, Field, PayloadSource};
pub use collection::{
    compare_values, AddInput, Added, Collection, CollectionBuilder, FilterSpec, Member, Record,
    Reply, Selector, Service, SortKey, SortOptions, SortSpec, COLLECTION_TYPE_NAME,
};
pub use entity::{errors, Arguments, Entity, Status, BASE_TYPE_NAME, CLONE};
pub use extend::{
    Extension, ModelType, Operation, Output, Override, Parent, Property, DEFAULT_TYPE_NAME,
};
pub use notice::{events, Notice};

pub use ripple_events::ListenerId;
pub use ripple_promise::Settlement;
pub use ripple_types::{CallbackKind, Error, Outcome, Result, ThreadId};
