//! Collections of child models.
//!
//! A [`Collection`] keeps its authoritative data as an ordered list of
//! [`Record`]s (raw payloads or already-wrapped members) and wraps them into
//! [`Member`]s lazily. On top of that it tracks selection, reversible
//! filter/sort transforms, staged additions, and serialized read/update
//! rounds driven through the entity's promise threads.

mod member;
mod select;
mod service;
mod staging;
mod transform;

pub use member::{Member, Record};
pub use select::Selector;
pub use service::{Reply, Service};
pub use staging::{AddInput, Added};
pub use transform::{compare_values, FilterSpec, SortKey, SortOptions, SortSpec};

use crate::child::ChildModel;
use crate::entity::{base_operations, Entity, BASE_TYPE_NAME, CLONE};
use crate::extend::{Extension, ModelType, Output, Parent};
use crate::notice::{events, Notice};
use ripple_types::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use tracing::trace;
use transform::{ActiveFilter, ActiveSort};

/// Name of the root collection type.
pub const COLLECTION_TYPE_NAME: &str = "Collection";

struct State<M: ChildModel> {
    records: Vec<Record<M>>,
    staged: Vec<Member<M>>,
    snapshot: Option<Vec<Record<M>>>,
    cache: Option<Vec<Member<M>>>,
    selection: Vec<bool>,
    selected_count: usize,
    all_selected: bool,
    none_selected: bool,
    active_filter: Option<ActiveFilter<M>>,
    active_sort: Option<ActiveSort<M>>,
    last_read: Option<Value>,
}

impl<M: ChildModel> State<M> {
    fn new(records: Vec<Record<M>>) -> Self {
        let mut state = Self {
            records,
            staged: Vec::new(),
            snapshot: None,
            cache: None,
            selection: Vec::new(),
            selected_count: 0,
            all_selected: false,
            none_selected: true,
            active_filter: None,
            active_sort: None,
            last_read: None,
        };
        state.invalidate();
        state
    }

    /// Drops the materialized cache and realigns selection with `records`.
    fn invalidate(&mut self) {
        self.cache = None;
        self.selection = self.records.iter().map(Record::is_selected).collect();
        self.selected_count = self.selection.iter().filter(|s| **s).count();
        self.refresh_aggregates();
    }

    fn refresh_aggregates(&mut self) {
        let len = self.records.len();
        self.all_selected = len > 0 && self.selected_count == len;
        self.none_selected = self.selected_count == 0;
    }
}

struct CollectionInner<M: ChildModel> {
    base: Entity,
    kind: Rc<ModelType<Collection<M>>>,
    state: RefCell<State<M>>,
    read_service: Option<Rc<dyn Service>>,
    update_service: Option<Rc<dyn Service>>,
}

/// An ordered set of child models with selection, filter/sort and
/// read/update orchestration.
///
/// Like [`Entity`], a `Collection` is a shared handle; [`Clone`] yields
/// another handle to the same instance and [`Collection::duplicate`] makes a
/// model-level copy. The underlying entity (threads, events, status) is
/// reachable through `Deref`.
pub struct Collection<M: ChildModel> {
    inner: Rc<CollectionInner<M>>,
}

impl<M: ChildModel> Collection<M> {
    /// The root collection type.
    ///
    /// It derives from a `"Base"` table carrying the built-in entity
    /// operations; its own `"clone"` delegates to the base clone and then
    /// copies the collection state. `len`, `data`, `read`, `update`,
    /// `refresh`, `finalize` and `end` are invocable by name as well.
    #[must_use]
    pub fn base_type() -> ModelType<Self> {
        let base = ModelType::new(BASE_TYPE_NAME).extend(base_operations(Self::base).operation(
            CLONE,
            |collection: &Self, _: &[Value]| Ok(Output::Instance(collection.clone_instance())),
        ));
        base.extend(
            Extension::named(COLLECTION_TYPE_NAME)
                .override_with(CLONE, |collection: &Self, parent: &Parent<Self>, args: &[Value]| {
                    let copy = parent
                        .call(collection, args)?
                        .into_instance()
                        .ok_or_else(|| Error::NotAnInstance(CLONE.to_string()))?;
                    collection.copy_state_into(&copy);
                    Ok(Output::Instance(copy))
                })
                .operation("len", |collection: &Self, _: &[Value]| {
                    Ok(Value::from(collection.len()))
                })
                .operation("data", |collection: &Self, _: &[Value]| {
                    Ok(Value::Array(collection.data()))
                })
                .operation("read", |collection: &Self, args: &[Value]| {
                    collection.read(optional_arg(args));
                    Ok(Value::Null)
                })
                .operation("update", |collection: &Self, args: &[Value]| {
                    collection.update(optional_arg(args));
                    Ok(Value::Null)
                })
                .operation("refresh", |collection: &Self, _: &[Value]| {
                    collection.refresh();
                    Ok(Value::Null)
                })
                .operation("finalize", |collection: &Self, args: &[Value]| {
                    collection.finalize(optional_arg(args).unwrap_or(Value::Null));
                    Ok(Value::Null)
                })
                .operation("end", |collection: &Self, args: &[Value]| {
                    collection.end(args.first().and_then(Value::as_bool).unwrap_or(false));
                    Ok(Value::Null)
                }),
        )
    }

    /// Creates a collection, loaded if `data` is non-empty.
    #[must_use]
    pub fn new(data: Option<Vec<Value>>) -> Self {
        Self::construct(data, false)
    }

    /// Creates a collection, flagging whether it is being built as a clone.
    #[must_use]
    pub fn construct(data: Option<Vec<Value>>, for_clone: bool) -> Self {
        let builder = Self::builder().for_clone(for_clone);
        match data {
            Some(data) => builder.data(data).build(),
            None => builder.build(),
        }
    }

    /// Starts configuring a collection.
    #[must_use]
    pub fn builder() -> CollectionBuilder<M> {
        CollectionBuilder::default()
    }

    fn from_inner(inner: Rc<CollectionInner<M>>) -> Self {
        Self { inner }
    }

    /// The underlying entity.
    #[must_use]
    pub fn base(&self) -> &Entity {
        &self.inner.base
    }

    /// The model type of this collection.
    #[must_use]
    pub fn kind(&self) -> &Rc<ModelType<Self>> {
        &self.inner.kind
    }

    /// The model type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.inner.kind.name()
    }

    /// Invokes an operation from this collection's type table.
    pub fn invoke(&self, operation: &str, args: &[Value]) -> Result<Output<Self>> {
        let kind = Rc::clone(&self.inner.kind);
        kind.invoke(self, operation, args)
    }

    /// Looks up a constant property of this collection's type.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Value> {
        self.inner.kind.value(key).cloned()
    }

    /// Returns true if both handles point at the same collection.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of items in the current (possibly transformed) data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.borrow().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current data as payloads.
    #[must_use]
    pub fn data(&self) -> Vec<Value> {
        self.inner
            .state
            .borrow()
            .records
            .iter()
            .map(Record::payload)
            .collect()
    }

    /// Current data deserialized into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.data()
            .into_iter()
            .map(|payload| serde_json::from_value(payload).map_err(Into::into))
            .collect()
    }

    /// Staged items waiting for [`Collection::finalize`].
    #[must_use]
    pub fn staged(&self) -> Vec<Member<M>> {
        self.inner.state.borrow().staged.clone()
    }

    /// Returns true while a filter or sort transform is active.
    #[must_use]
    pub fn is_transformed(&self) -> bool {
        self.inner.state.borrow().snapshot.is_some()
    }

    /// Returns true if a filter is remembered for reapplication.
    #[must_use]
    pub fn has_filter(&self) -> bool {
        self.inner.state.borrow().active_filter.is_some()
    }

    /// Returns true if a sort is remembered for reapplication.
    #[must_use]
    pub fn has_sort(&self) -> bool {
        self.inner.state.borrow().active_sort.is_some()
    }

    /// Replaces the data wholesale.
    ///
    /// Any active transform is ended first (keeping the remembered filter and
    /// sort), then the remembered filter and the remembered sort are applied
    /// again, in that order.
    pub fn set<I, T>(&self, data: I) -> &Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Record<M>>,
    {
        self.end(true);
        let records: Vec<Record<M>> = data.into_iter().map(Into::into).collect();
        let non_empty = !records.is_empty();
        let (filter, sort) = {
            let mut state = self.inner.state.borrow_mut();
            state.records = records;
            state.invalidate();
            (state.active_filter.clone(), state.active_sort.clone())
        };
        self.inner.base.update_status(|status| {
            status.loaded = status.loaded || non_empty;
        });
        trace!(len = self.len(), "collection data replaced");

        if let Some(filter) = filter {
            self.apply_filter(filter);
        }
        if let Some(sort) = sort {
            self.apply_sort(sort);
        }
        self
    }

    /// Creates a new collection of the same type through the type's
    /// `"clone"` operation.
    ///
    /// The root collection clone copies construction arguments, data, staged
    /// items, snapshot and selection. Threads, listeners, errors and
    /// remembered transforms are not carried over. [`events::CLONED`] is
    /// published with the new collection before its state is copied.
    pub fn duplicate(&self) -> Result<Self> {
        self.invoke(CLONE, &[])?
            .into_instance()
            .ok_or_else(|| Error::NotAnInstance(CLONE.to_string()))
    }

    /// An empty collection of the same type and services carrying a copy of
    /// the construction arguments.
    fn clone_instance(&self) -> Self {
        let clone = Self::from_inner(Rc::new(CollectionInner {
            base: self.inner.base.fresh_copy(),
            kind: Rc::clone(&self.inner.kind),
            state: RefCell::new(State::new(Vec::new())),
            read_service: self.inner.read_service.clone(),
            update_service: self.inner.update_service.clone(),
        }));
        self.inner
            .base
            .publish(events::CLONED, Notice::instance(clone.clone()));
        clone
    }

    fn copy_state_into(&self, clone: &Self) {
        let state = {
            let source = self.inner.state.borrow();
            let detach = |records: &[Record<M>]| -> Vec<Record<M>> {
                records.iter().map(|r| Record::Raw(r.payload())).collect()
            };
            State {
                records: detach(&source.records),
                staged: Vec::new(),
                snapshot: source.snapshot.as_deref().map(detach),
                cache: None,
                selection: source.selection.clone(),
                selected_count: source.selected_count,
                all_selected: source.all_selected,
                none_selected: source.none_selected,
                active_filter: None,
                active_sort: None,
                last_read: None,
            }
        };
        let staged: Vec<Value> = self.staged().iter().map(Member::payload).collect();
        *clone.inner.state.borrow_mut() = state;

        let offset = clone.len();
        let staged = staged
            .into_iter()
            .enumerate()
            .map(|(i, payload)| {
                let member = Member::new(M::from_payload(payload));
                member.bind(&clone.inner, offset + i);
                member
            })
            .collect();
        clone.inner.state.borrow_mut().staged = staged;
    }
}

fn optional_arg(args: &[Value]) -> Option<Value> {
    args.first().filter(|arg| !arg.is_null()).cloned()
}

impl<M: ChildModel> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M: ChildModel> Deref for Collection<M> {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.inner.base
    }
}

impl<M: ChildModel> fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Collection")
            .field("type", &self.type_name())
            .field("len", &state.records.len())
            .field("staged", &state.staged.len())
            .field("transformed", &state.snapshot.is_some())
            .field("selected", &state.selected_count)
            .field("base", &self.inner.base)
            .finish()
    }
}

/// Construction-time configuration of a [`Collection`].
pub struct CollectionBuilder<M: ChildModel> {
    kind: Option<Rc<ModelType<Collection<M>>>>,
    data: Option<Vec<Value>>,
    for_clone: bool,
    read_service: Option<Rc<dyn Service>>,
    update_service: Option<Rc<dyn Service>>,
}

impl<M: ChildModel> Default for CollectionBuilder<M> {
    fn default() -> Self {
        Self {
            kind: None,
            data: None,
            for_clone: false,
            read_service: None,
            update_service: None,
        }
    }
}

impl<M: ChildModel> CollectionBuilder<M> {
    /// Uses a derived collection type instead of the root one.
    #[must_use]
    pub fn kind(mut self, kind: impl Into<Rc<ModelType<Collection<M>>>>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Initial raw data.
    #[must_use]
    pub fn data(mut self, data: Vec<Value>) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn for_clone(mut self, for_clone: bool) -> Self {
        self.for_clone = for_clone;
        self
    }

    /// The service used by `read` and `refresh`.
    #[must_use]
    pub fn read_service(mut self, service: impl Service + 'static) -> Self {
        self.read_service = Some(Rc::new(service));
        self
    }

    /// The service used by `update`.
    #[must_use]
    pub fn update_service(mut self, service: impl Service + 'static) -> Self {
        self.update_service = Some(Rc::new(service));
        self
    }

    #[must_use]
    pub fn build(self) -> Collection<M> {
        let kind = self
            .kind
            .unwrap_or_else(|| Rc::new(Collection::<M>::base_type()));
        let base = Entity::with_type(
            Entity::base_type().extend(Extension::named(kind.name())),
            self.data.clone().map(Value::Array),
            self.for_clone,
        );
        let records: Vec<Record<M>> = self
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Record::Raw)
            .collect();
        let loaded = !records.is_empty();
        base.update_status(|status| status.loaded = loaded);

        Collection::from_inner(Rc::new(CollectionInner {
            base,
            kind,
            state: RefCell::new(State::new(records)),
            read_service: self.read_service,
            update_service: self.update_service,
        }))
    }
}
