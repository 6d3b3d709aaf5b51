use super::{Collection, Member, Record};
use crate::child::{ChildModel, PayloadSource};
use crate::notice::{events, Notice};
use ripple_types::{Error, Result};
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::debug;

/// Argument of [`Collection::add`].
pub enum AddInput<M: ChildModel> {
    /// Raw data: `null` stages one blank item, a sequence stages one item per
    /// element, an object stages one item. Anything else is rejected.
    Value(Value),
    /// An already-wrapped member, staged as-is.
    Member(Member<M>),
    /// A bare child model.
    Model(M),
    /// A single-item container whose payload becomes one staged item.
    Container(Rc<dyn PayloadSource>),
    /// Another collection, flattened into its members.
    Collection(Collection<M>),
}

impl<M: ChildModel> From<Value> for AddInput<M> {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl<M: ChildModel> From<Option<Value>> for AddInput<M> {
    fn from(value: Option<Value>) -> Self {
        Self::Value(value.unwrap_or(Value::Null))
    }
}

impl<M: ChildModel> From<Member<M>> for AddInput<M> {
    fn from(member: Member<M>) -> Self {
        Self::Member(member)
    }
}

impl<M: ChildModel> From<Collection<M>> for AddInput<M> {
    fn from(collection: Collection<M>) -> Self {
        Self::Collection(collection)
    }
}

impl<M: ChildModel> From<Rc<dyn PayloadSource>> for AddInput<M> {
    fn from(container: Rc<dyn PayloadSource>) -> Self {
        Self::Container(container)
    }
}

/// What [`Collection::add`] staged.
#[derive(Debug)]
pub enum Added<M: ChildModel> {
    /// The input was a single item.
    One(Member<M>),
    /// The input was a sequence or a collection.
    Many(Vec<Member<M>>),
}

impl<M: ChildModel> Added<M> {
    #[must_use]
    pub fn into_vec(self) -> Vec<Member<M>> {
        match self {
            Self::One(member) => vec![member],
            Self::Many(members) => members,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(members) => members.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn first(&self) -> Option<&Member<M>> {
        match self {
            Self::One(member) => Some(member),
            Self::Many(members) => members.first(),
        }
    }
}

impl<M: ChildModel> Collection<M> {
    /// Stages new items, replacing anything staged earlier.
    ///
    /// Members created here are bound to the slot they will occupy once
    /// [`Collection::finalize`] merges them. Already-wrapped members, including
    /// those taken from another collection, keep their current owner.
    pub fn add(&self, input: impl Into<AddInput<M>>) -> Result<Added<M>> {
        let (many, fresh, members): (bool, bool, Vec<Member<M>>) = match input.into() {
            AddInput::Value(Value::Null) => {
                (false, true, vec![Member::from_payload(Value::Object(Map::new()))])
            }
            AddInput::Value(Value::Array(items)) => {
                (true, true, items.into_iter().map(Member::from_payload).collect())
            }
            AddInput::Value(object @ Value::Object(_)) => {
                (false, true, vec![Member::from_payload(object)])
            }
            AddInput::Value(other) => return Err(Error::InvalidAddition(other.to_string())),
            AddInput::Member(member) => (false, false, vec![member]),
            AddInput::Model(model) => (false, true, vec![Member::new(model)]),
            AddInput::Container(container) => {
                (false, true, vec![Member::from_payload(container.payload())])
            }
            AddInput::Collection(other) => (true, false, other.get()),
        };

        let offset = self.len();
        if fresh {
            for (i, member) in members.iter().enumerate() {
                member.bind(&self.inner, offset + i);
            }
        }
        debug!(count = members.len(), offset, fresh, "staged additions");
        self.inner.state.borrow_mut().staged = members.clone();

        Ok(if many {
            Added::Many(members)
        } else {
            match members.into_iter().next() {
                Some(member) => Added::One(member),
                None => Added::Many(Vec::new()),
            }
        })
    }

    /// Merges staged items into the data and publishes
    /// [`events::FINALIZED`] with `data`.
    ///
    /// Does nothing when nothing is staged. `loaded` is reset afterwards.
    pub fn finalize(&self, data: Value) -> &Self {
        let staged = std::mem::take(&mut self.inner.state.borrow_mut().staged);
        if staged.is_empty() {
            return self;
        }

        let mut records = self.inner.state.borrow().records.clone();
        records.extend(staged.into_iter().map(Record::Member));
        self.set(records);
        self.inner.base.update_status(|status| status.loaded = false);
        self.inner.base.publish(events::FINALIZED, Notice::Data(data));
        self
    }
}
