use super::{Collection, CollectionInner};
use crate::child::{ChildModel, Field, PayloadSource};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

struct MemberInner<M: ChildModel> {
    model: M,
    selected: Cell<bool>,
    slot: Cell<usize>,
    owner: RefCell<Weak<CollectionInner<M>>>,
}

/// A child model wrapped for membership in a collection.
///
/// Members carry a selected flag, their position in the owning collection
/// and a weak back-reference to it. Cloning a `Member` clones the handle.
pub struct Member<M: ChildModel> {
    inner: Rc<MemberInner<M>>,
}

impl<M: ChildModel> Member<M> {
    /// Wraps a model that does not belong to any collection yet.
    #[must_use]
    pub fn new(model: M) -> Self {
        Self {
            inner: Rc::new(MemberInner {
                model,
                selected: Cell::new(false),
                slot: Cell::new(0),
                owner: RefCell::new(Weak::new()),
            }),
        }
    }

    /// Builds the model from a payload and wraps it.
    #[must_use]
    pub fn from_payload(payload: Value) -> Self {
        Self::new(M::from_payload(payload))
    }

    #[must_use]
    pub fn model(&self) -> &M {
        &self.inner.model
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.inner.selected.get()
    }

    /// Position this member was last bound to in its owner.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.inner.slot.get()
    }

    /// The owning collection, if it is still alive.
    #[must_use]
    pub fn owner(&self) -> Option<Collection<M>> {
        self.inner.owner.borrow().upgrade().map(Collection::from_inner)
    }

    /// Returns true if both handles wrap the same model instance.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Sets the selected flag and records it in the owner's selection.
    ///
    /// With `bulk` set, the owner's `all_selected`/`none_selected` flags are
    /// left for the caller to recompute.
    pub fn select(&self, value: bool, bulk: bool) -> &Self {
        let previous = self.inner.selected.replace(value);
        let owner = self.inner.owner.borrow().upgrade();
        if let Some(owner) = owner {
            owner.record_selection(self.slot(), previous, value, bulk);
        }
        self
    }

    /// Reads a field through the model.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        self.inner.model.field(name)
    }

    /// Reads a dotted path: the first segment through [`Member::field`], the
    /// rest by walking into the JSON value. Missing segments yield `Null`.
    #[must_use]
    pub fn value_at(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let Some(first) = segments.next().filter(|s| !s.is_empty()) else {
            return Value::Null;
        };
        let mut value = self.field(first).map_or(Value::Null, |f| f.read());
        for segment in segments {
            value = match value {
                Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
                Value::Array(mut items) => match segment.parse::<usize>() {
                    Ok(index) if index < items.len() => items.swap_remove(index),
                    _ => Value::Null,
                },
                _ => Value::Null,
            };
        }
        value
    }

    /// The model's payload.
    #[must_use]
    pub fn payload(&self) -> Value {
        self.inner.model.payload()
    }

    pub(super) fn bind(&self, owner: &Rc<CollectionInner<M>>, slot: usize) {
        *self.inner.owner.borrow_mut() = Rc::downgrade(owner);
        self.inner.slot.set(slot);
    }

    pub(super) fn set_selected_flag(&self, value: bool) {
        self.inner.selected.set(value);
    }
}

impl<M: ChildModel> Clone for Member<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M: ChildModel> Deref for Member<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.inner.model
    }
}

impl<M: ChildModel> PayloadSource for Member<M> {
    fn payload(&self) -> Value {
        self.inner.model.payload()
    }
}

impl<M: ChildModel> fmt::Debug for Member<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("slot", &self.slot())
            .field("selected", &self.is_selected())
            .field("payload", &self.payload())
            .finish()
    }
}

/// One item of a collection's authoritative data.
pub enum Record<M: ChildModel> {
    /// A payload not wrapped yet.
    Raw(Value),
    /// An already-wrapped member, reused as-is when materializing.
    Member(Member<M>),
}

impl<M: ChildModel> Record<M> {
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Raw(payload) => payload.clone(),
            Self::Member(member) => member.payload(),
        }
    }

    #[must_use]
    pub fn as_member(&self) -> Option<&Member<M>> {
        match self {
            Self::Raw(_) => None,
            Self::Member(member) => Some(member),
        }
    }

    pub(super) fn is_selected(&self) -> bool {
        self.as_member().is_some_and(Member::is_selected)
    }
}

impl<M: ChildModel> Clone for Record<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Raw(payload) => Self::Raw(payload.clone()),
            Self::Member(member) => Self::Member(member.clone()),
        }
    }
}

impl<M: ChildModel> From<Value> for Record<M> {
    fn from(payload: Value) -> Self {
        Self::Raw(payload)
    }
}

impl<M: ChildModel> From<Member<M>> for Record<M> {
    fn from(member: Member<M>) -> Self {
        Self::Member(member)
    }
}

impl<M: ChildModel> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(payload) => f.debug_tuple("Raw").field(payload).finish(),
            Self::Member(member) => f.debug_tuple("Member").field(member).finish(),
        }
    }
}

// ── Materialization ──────────────────────────────────────────────

impl<M: ChildModel> Collection<M> {
    /// Returns every item wrapped as a [`Member`], in order.
    ///
    /// Wrapping happens once per data change: raw payloads become new
    /// resolved models, already-wrapped members are reused, and every member
    /// is bound to this collection at its position.
    pub fn get(&self) -> Vec<Member<M>> {
        if let Some(cache) = &self.inner.state.borrow().cache {
            return cache.clone();
        }

        let (records, selection) = {
            let state = self.inner.state.borrow();
            (state.records.clone(), state.selection.clone())
        };
        let members: Vec<Member<M>> = records
            .into_iter()
            .enumerate()
            .map(|(slot, record)| {
                let member = match record {
                    Record::Raw(payload) => {
                        let model = M::from_payload(payload);
                        model.resolve();
                        let member = Member::new(model);
                        member.set_selected_flag(selection.get(slot).copied().unwrap_or(false));
                        member
                    }
                    Record::Member(member) => member,
                };
                member.bind(&self.inner, slot);
                member
            })
            .collect();

        self.inner.state.borrow_mut().cache = Some(members.clone());
        members
    }

    /// Alias of [`Collection::get`].
    pub fn materialize(&self) -> Vec<Member<M>> {
        self.get()
    }

    /// Calls `callback` with every member and its index.
    pub fn each<F>(&self, mut callback: F) -> &Self
    where
        F: FnMut(&Member<M>, usize),
    {
        for (index, member) in self.get().iter().enumerate() {
            callback(member, index);
        }
        self
    }

    /// Maps every member and its index.
    pub fn map<T, F>(&self, mut callback: F) -> Vec<T>
    where
        F: FnMut(&Member<M>, usize) -> T,
    {
        self.get()
            .iter()
            .enumerate()
            .map(|(index, member)| callback(member, index))
            .collect()
    }

    /// Collects the accessor fields named in `fields` from every member.
    ///
    /// Plain (non-accessor) fields are skipped; a member without any matching
    /// accessor yields `None`.
    pub fn pluck<S: AsRef<str>>(&self, fields: &[S]) -> Vec<Option<Map<String, Value>>> {
        self.map(|member, _| {
            let mut plucked: Option<Map<String, Value>> = None;
            for name in fields {
                let name = name.as_ref();
                if let Some(field @ Field::Accessor(_)) = member.field(name) {
                    plucked
                        .get_or_insert_with(Map::new)
                        .insert(name.to_string(), field.read());
                }
            }
            plucked
        })
    }

    /// Distinct values of `field` across all members, in first-seen order.
    ///
    /// Sequence values contribute each element; objects are compared by
    /// their serialized form; null and missing values are skipped.
    pub fn unique(&self, field: &str) -> Vec<Value> {
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        if field.is_empty() {
            return distinct;
        }
        let mut admit = |value: Value| {
            if value.is_null() {
                return;
            }
            if seen.insert(value.to_string()) {
                distinct.push(value);
            }
        };
        self.each(|member, _| match member.value_at(field) {
            Value::Array(items) => items.into_iter().for_each(&mut admit),
            value => admit(value),
        });
        distinct
    }
}
