//! Model types and the extension mechanism.
//!
//! A [`ModelType`] is a named table of operations and constant properties
//! for one receiver type (`Entity`, `Collection<M>`, ...). Deriving a new
//! type is explicit: [`ModelType::extend`] copies the parent's table and
//! applies an [`Extension`] on top of it.
//!
//! An override that needs the replaced implementation is registered with
//! [`Extension::override_with`]. The builder captures the parent's operation
//! at extend time and hands it to the override as a [`Parent`] argument on
//! every call, so delegation is scoped to that one invocation and nests
//! naturally across several levels of derivation.
//!
//! Operations return an [`Output`]: either a plain value or a new receiver,
//! which is how the built-in `"clone"` operation hands back its copy.

use ripple_types::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// An operation in a model type's table.
pub type Operation<R> = Rc<dyn Fn(&R, &[Value]) -> Result<Output<R>>>;

/// An operation that receives the implementation it replaces.
pub type Override<R> = Rc<dyn Fn(&R, &Parent<R>, &[Value]) -> Result<Output<R>>>;

type PreExtend<R> = Rc<dyn Fn(Extension<R>) -> Extension<R>>;

/// Name given to derived types that do not name themselves.
pub const DEFAULT_TYPE_NAME: &str = "Class";

/// What an operation produced.
pub enum Output<R> {
    Value(Value),
    /// A new receiver, e.g. the copy made by `"clone"`.
    Instance(R),
}

impl<R> Output<R> {
    /// The plain value, if this is one.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Instance(_) => None,
        }
    }

    /// The new receiver, if this is one.
    #[must_use]
    pub fn into_instance(self) -> Option<R> {
        match self {
            Self::Value(_) => None,
            Self::Instance(instance) => Some(instance),
        }
    }
}

impl<R> From<Value> for Output<R> {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl<R> fmt::Debug for Output<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// Handle to the ancestor implementation of an overridden operation.
pub struct Parent<R> {
    name: String,
    operation: Option<Operation<R>>,
}

impl<R> Parent<R> {
    /// Calls the ancestor implementation.
    pub fn call(&self, receiver: &R, args: &[Value]) -> Result<Output<R>> {
        match &self.operation {
            Some(operation) => operation(receiver, args),
            None => Err(Error::MissingParentOperation(self.name.clone())),
        }
    }

    /// Returns true if there is an ancestor implementation to delegate to.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.operation.is_some()
    }
}

/// One entry of an [`Extension`].
pub enum Property<R> {
    /// A constant, replacing any operation or value of the same name.
    Value(Value),
    /// An operation, replacing any previous one of the same name.
    Operation(Operation<R>),
    /// An operation that may delegate to the one it replaces.
    Override(Override<R>),
}

/// Property bag applied by [`ModelType::extend`].
pub struct Extension<R> {
    name: Option<String>,
    properties: Vec<(String, Property<R>)>,
}

impl<R: 'static> Extension<R> {
    /// Creates an anonymous extension; the derived type is named `"Class"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            properties: Vec::new(),
        }
    }

    /// Creates an extension producing a type called `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            properties: Vec::new(),
        }
    }

    /// Adds a constant property.
    #[must_use]
    pub fn value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.push((key.into(), Property::Value(value)));
        self
    }

    /// Adds or replaces an operation.
    ///
    /// The closure may return a plain [`Value`] or a full [`Output`].
    #[must_use]
    pub fn operation<F, T>(mut self, key: impl Into<String>, operation: F) -> Self
    where
        F: Fn(&R, &[Value]) -> Result<T> + 'static,
        T: Into<Output<R>>,
    {
        let operation: Operation<R> =
            Rc::new(move |receiver: &R, args: &[Value]| operation(receiver, args).map(Into::into));
        self.properties.push((key.into(), Property::Operation(operation)));
        self
    }

    /// Overrides an operation, receiving the parent implementation.
    #[must_use]
    pub fn override_with<F, T>(mut self, key: impl Into<String>, operation: F) -> Self
    where
        F: Fn(&R, &Parent<R>, &[Value]) -> Result<T> + 'static,
        T: Into<Output<R>>,
    {
        let operation: Override<R> = Rc::new(move |receiver: &R, parent: &Parent<R>, args: &[Value]| {
            operation(receiver, parent, args).map(Into::into)
        });
        self.properties.push((key.into(), Property::Override(operation)));
        self
    }

    /// Adds a raw property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, property: Property<R>) -> Self {
        self.properties.push((key.into(), property));
        self
    }

    /// The name the derived type will carry, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Keys in the order they will be applied.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(key, _)| key.as_str())
    }
}

impl<R: 'static> Default for Extension<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// A named operation table for receivers of type `R`.
pub struct ModelType<R> {
    name: String,
    operations: BTreeMap<String, Operation<R>>,
    values: BTreeMap<String, Value>,
    pre_extend: Option<PreExtend<R>>,
}

impl<R: 'static> ModelType<R> {
    /// Creates a root type with an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operations: BTreeMap::new(),
            values: BTreeMap::new(),
            pre_extend: None,
        }
    }

    /// Installs a hook that rewrites every extension applied to this type
    /// or to any type derived from it.
    #[must_use]
    pub fn with_pre_extend<F>(mut self, hook: F) -> Self
    where
        F: Fn(Extension<R>) -> Extension<R> + 'static,
    {
        self.pre_extend = Some(Rc::new(hook));
        self
    }

    /// The type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an operation.
    #[must_use]
    pub fn operation(&self, key: &str) -> Option<Operation<R>> {
        self.operations.get(key).cloned()
    }

    /// Returns true if the table has an operation called `key`.
    #[must_use]
    pub fn has_operation(&self, key: &str) -> bool {
        self.operations.contains_key(key)
    }

    /// Looks up a constant property.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Operation names, sorted.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    /// Invokes `key` on `receiver`.
    pub fn invoke(&self, receiver: &R, key: &str, args: &[Value]) -> Result<Output<R>> {
        let operation = self
            .operation(key)
            .ok_or_else(|| Error::UnknownOperation(key.to_string()))?;
        operation(receiver, args)
    }

    /// Derives a new type from this one.
    ///
    /// The new table starts as a copy of this one. Constants and plain
    /// operations replace same-named entries; overrides are wrapped so that
    /// each call receives this type's implementation as its [`Parent`].
    #[must_use]
    pub fn extend(&self, extension: Extension<R>) -> Self {
        let extension = match &self.pre_extend {
            Some(hook) => hook(extension),
            None => extension,
        };
        let mut derived = Self {
            name: extension
                .name
                .unwrap_or_else(|| DEFAULT_TYPE_NAME.to_string()),
            operations: self.operations.clone(),
            values: self.values.clone(),
            pre_extend: self.pre_extend.clone(),
        };

        for (key, property) in extension.properties {
            match property {
                Property::Value(value) => {
                    derived.operations.remove(&key);
                    derived.values.insert(key, value);
                }
                Property::Operation(operation) => {
                    derived.values.remove(&key);
                    derived.operations.insert(key, operation);
                }
                Property::Override(operation) => {
                    let parent = Parent {
                        name: key.clone(),
                        operation: self.operations.get(&key).cloned(),
                    };
                    let wrapped: Operation<R> =
                        Rc::new(move |receiver: &R, args: &[Value]| operation(receiver, &parent, args));
                    derived.values.remove(&key);
                    derived.operations.insert(key, wrapped);
                }
            }
        }
        derived
    }
}

impl<R> fmt::Debug for ModelType<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .field("values", &self.values)
            .field("pre_extend", &self.pre_extend.is_some())
            .finish()
    }
}
