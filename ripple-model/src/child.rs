use crate::entity::Entity;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Anything that can hand out its data as a JSON payload.
pub trait PayloadSource {
    fn payload(&self) -> Value;
}

/// A field exposed by a child model.
#[derive(Clone)]
pub enum Field {
    /// A plain value.
    Value(Value),
    /// A zero-argument accessor computing the value on demand.
    Accessor(Rc<dyn Fn() -> Value>),
}

impl Field {
    /// Wraps an accessor.
    pub fn accessor<F>(accessor: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        Self::Accessor(Rc::new(accessor))
    }

    /// Returns the field's value, invoking the accessor if there is one.
    #[must_use]
    pub fn read(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Accessor(accessor) => accessor(),
        }
    }

    #[must_use]
    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor(_))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Accessor(_) => f.write_str("Accessor(..)"),
        }
    }
}

/// The single-record model a collection wraps each of its items in.
///
/// Collections never look inside a child other than through this trait.
pub trait ChildModel: PayloadSource + 'static {
    /// Builds a child from one raw item.
    fn from_payload(payload: Value) -> Self
    where
        Self: Sized;

    /// Marks pre-loaded data as loaded.
    fn resolve(&self);

    /// Looks up a field by name.
    fn field(&self, name: &str) -> Option<Field>;
}

/// A general-purpose child model backed by a JSON object.
///
/// Every top-level key of the object is exposed as an accessor field.
#[derive(Clone)]
pub struct Document {
    entity: Entity,
    data: Rc<RefCell<Value>>,
}

impl Document {
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            entity: Entity::new(Some(data.clone())),
            data: Rc::new(RefCell::new(data)),
        }
    }

    /// The entity tracking this document's lifecycle.
    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Reads a top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.borrow().get(key).cloned()
    }

    /// Writes a top-level key. Non-object documents are replaced by an object.
    pub fn set(&self, key: &str, value: Value) {
        let mut data = self.data.borrow_mut();
        if !data.is_object() {
            *data = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = &mut *data {
            map.insert(key.to_string(), value);
        }
    }
}

impl PayloadSource for Document {
    fn payload(&self) -> Value {
        self.data.borrow().clone()
    }
}

impl ChildModel for Document {
    fn from_payload(payload: Value) -> Self {
        Self::new(payload)
    }

    fn resolve(&self) {
        self.entity.resolve(None, self.payload());
    }

    fn field(&self, name: &str) -> Option<Field> {
        if self.data.borrow().get(name).is_none() {
            return None;
        }
        let data = Rc::clone(&self.data);
        let key = name.to_string();
        Some(Field::accessor(move || {
            data.borrow().get(&key).cloned().unwrap_or(Value::Null)
        }))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("data", &self.data.borrow())
            .field("status", &self.entity.status())
            .finish()
    }
}
