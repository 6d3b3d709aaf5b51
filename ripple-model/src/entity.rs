use crate::extend::{Extension, ModelType, Output};
use crate::notice::{events, Notice};
use ripple_events::{EventChannel, ListenerId};
use ripple_promise::{PromiseThreads, Settlement};
use ripple_types::{CallbackKind, Error, Outcome, Result, ThreadId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Well-known error slots.
pub mod errors {
    /// Set when a read service fails or refuses a request.
    pub const READ: &str = "read";
    /// Set when an update service fails, refuses a request, or is missing.
    pub const UPDATE: &str = "update";
}

/// Name of the root entity type.
pub const BASE_TYPE_NAME: &str = "Base";

/// Key of the built-in clone operation.
pub const CLONE: &str = "clone";

thread_local! {
    static BASE_TYPE: Rc<ModelType<Entity>> = Rc::new(Entity::base_type());
}

/// The built-in operations shared by every receiver that exposes an
/// [`Entity`]: `resolve`, `reject` and `notify` take `[data, thread?]`,
/// `is_final` takes `[thread?]`, `unfinalize` returns the new thread index.
///
/// `clone` is left to the receiver, which knows how to copy itself.
pub(crate) fn base_operations<R: 'static>(entity: fn(&R) -> &Entity) -> Extension<R> {
    Extension::named(BASE_TYPE_NAME)
        .operation("resolve", move |receiver: &R, args: &[Value]| {
            entity(receiver).resolve(thread_arg(args.get(1))?, data_arg(args));
            Ok(Value::Null)
        })
        .operation("reject", move |receiver: &R, args: &[Value]| {
            entity(receiver).reject(thread_arg(args.get(1))?, data_arg(args));
            Ok(Value::Null)
        })
        .operation("notify", move |receiver: &R, args: &[Value]| {
            entity(receiver).notify(thread_arg(args.get(1))?, data_arg(args));
            Ok(Value::Null)
        })
        .operation("is_final", move |receiver: &R, args: &[Value]| {
            Ok(Value::Bool(entity(receiver).is_final(thread_arg(args.first())?)))
        })
        .operation("unfinalize", move |receiver: &R, _: &[Value]| {
            Ok(Value::from(entity(receiver).unfinalize().get()))
        })
}

fn data_arg(args: &[Value]) -> Value {
    args.first().cloned().unwrap_or(Value::Null)
}

fn thread_arg(arg: Option<&Value>) -> Result<Option<ThreadId>> {
    match arg {
        None | Some(Value::Null) => Ok(None),
        Some(index) => Ok(Some(serde_json::from_value(index.clone())?)),
    }
}

fn as_entity(entity: &Entity) -> &Entity {
    entity
}

/// The arguments an instance was constructed with. Clones reuse them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    pub data: Option<Value>,
    pub for_clone: bool,
}

/// Lifecycle flags derived from the latest resolve/reject/read/update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub loaded: bool,
    pub success: bool,
    pub failed: bool,
    pub busy: bool,
}

struct EntityInner {
    kind: Rc<ModelType<Entity>>,
    arguments: RefCell<Arguments>,
    status: Cell<Status>,
    errors: RefCell<BTreeMap<String, Value>>,
    events: EventChannel<Notice>,
    threads: PromiseThreads<Value>,
}

/// A model instance with an event channel and promise threads.
///
/// `Entity` is a shared handle: cloning it with [`Clone`] yields another
/// handle to the same instance. Use [`Entity::duplicate`] for the model-level
/// clone.
#[derive(Clone)]
pub struct Entity {
    inner: Rc<EntityInner>,
}

impl Entity {
    /// The root type every entity type derives from, with the built-in
    /// operations already in its table.
    #[must_use]
    pub fn base_type() -> ModelType<Self> {
        ModelType::new(BASE_TYPE_NAME).extend(base_operations(as_entity).operation(
            CLONE,
            |entity: &Self, _: &[Value]| Ok(Output::Instance(entity.clone_instance())),
        ))
    }

    /// Creates a base entity.
    #[must_use]
    pub fn new(data: Option<Value>) -> Self {
        Self::construct(data, false)
    }

    /// Creates a base entity, flagging whether it is being built as a clone.
    #[must_use]
    pub fn construct(data: Option<Value>, for_clone: bool) -> Self {
        Self::with_type(BASE_TYPE.with(Rc::clone), data, for_clone)
    }

    /// Creates an entity of the given type.
    pub fn with_type(
        kind: impl Into<Rc<ModelType<Self>>>,
        data: Option<Value>,
        for_clone: bool,
    ) -> Self {
        Self {
            inner: Rc::new(EntityInner {
                kind: kind.into(),
                arguments: RefCell::new(Arguments { data, for_clone }),
                status: Cell::new(Status::default()),
                errors: RefCell::new(BTreeMap::new()),
                events: EventChannel::new(),
                threads: PromiseThreads::new(),
            }),
        }
    }

    /// The model type of this instance.
    #[must_use]
    pub fn kind(&self) -> &Rc<ModelType<Self>> {
        &self.inner.kind
    }

    /// The model type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.inner.kind.name()
    }

    /// The construction arguments.
    #[must_use]
    pub fn arguments(&self) -> Arguments {
        self.inner.arguments.borrow().clone()
    }

    /// Returns true if both handles point at the same instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invokes an operation from this entity's type table.
    pub fn invoke(&self, operation: &str, args: &[Value]) -> Result<Output<Self>> {
        let kind = Rc::clone(&self.inner.kind);
        kind.invoke(self, operation, args)
    }

    /// Looks up a constant property of this entity's type.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Value> {
        self.inner.kind.value(key).cloned()
    }

    /// Creates a new instance of the same type by invoking the type's
    /// `"clone"` operation, so derived types can override it.
    ///
    /// The built-in clone copies the construction arguments and nothing
    /// else: no finals, no queued callbacks, no listeners, no errors. It
    /// publishes [`events::CLONED`] with the new instance.
    pub fn duplicate(&self) -> Result<Self> {
        self.invoke(CLONE, &[])?
            .into_instance()
            .ok_or_else(|| Error::NotAnInstance(CLONE.to_string()))
    }

    fn clone_instance(&self) -> Self {
        let clone = self.fresh_copy();
        self.publish(events::CLONED, Notice::instance(clone.clone()));
        clone
    }

    pub(crate) fn fresh_copy(&self) -> Self {
        let clone = Self::with_type(Rc::clone(&self.inner.kind), None, true);
        *clone.inner.arguments.borrow_mut() = self.arguments();
        clone
    }

    // ── Status & errors ──────────────────────────────────────────

    /// Current lifecycle flags.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.status().loaded
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.status().busy
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status().success
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.status().failed
    }

    /// The value recorded in error slot `slot`, if any.
    #[must_use]
    pub fn error(&self, slot: &str) -> Option<Value> {
        self.inner.errors.borrow().get(slot).cloned()
    }

    /// All recorded errors.
    #[must_use]
    pub fn errors(&self) -> BTreeMap<String, Value> {
        self.inner.errors.borrow().clone()
    }

    pub(crate) fn record_error(&self, slot: &str, error: Value) {
        self.inner.errors.borrow_mut().insert(slot.to_string(), error);
    }

    pub(crate) fn clear_error(&self, slot: &str) {
        self.inner.errors.borrow_mut().remove(slot);
    }

    pub(crate) fn update_status(&self, change: impl FnOnce(&mut Status)) {
        let mut status = self.inner.status.get();
        change(&mut status);
        self.inner.status.set(status);
    }

    // ── Events ───────────────────────────────────────────────────

    /// Listens to `event` until unsubscribed.
    pub fn subscribe<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Notice) -> bool + 'static,
    {
        self.inner.events.subscribe(event, listener)
    }

    /// Listens to the next `event` only.
    pub fn subscribe_once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Notice) -> bool + 'static,
    {
        self.inner.events.subscribe_once(event, listener)
    }

    /// Removes one listener, or every listener of `event` when `None`.
    pub fn unsubscribe(&self, event: &str, listener: Option<ListenerId>) -> &Self {
        self.inner.events.unsubscribe(event, listener);
        self
    }

    /// Publishes `event`; true when every listener returned true.
    pub fn publish(&self, event: &str, payload: impl Into<Notice>) -> bool {
        self.inner.events.publish(event, &payload.into())
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.events.listener_count(event)
    }

    // ── Promise threads ──────────────────────────────────────────

    /// The thread callbacks are currently attached to.
    #[must_use]
    pub fn current_thread(&self) -> ThreadId {
        self.inner.threads.current()
    }

    /// Whether `thread` (default: current) has been resolved or rejected.
    #[must_use]
    pub fn is_final(&self, thread: Option<ThreadId>) -> bool {
        self.inner
            .threads
            .is_final(thread.unwrap_or_else(|| self.current_thread()))
    }

    /// The final record of `thread`, if it is final.
    #[must_use]
    pub fn settlement(&self, thread: ThreadId) -> Option<Settlement<Value>> {
        self.inner.threads.settlement(thread)
    }

    /// Marks `thread` (default: current) as resolved with `data`.
    ///
    /// A no-op once the thread is final.
    pub fn resolve(&self, thread: Option<ThreadId>, data: Value) -> &Self {
        self.finish(thread, Outcome::Resolved, data)
    }

    /// Marks `thread` (default: current) as rejected with `data`.
    ///
    /// A no-op once the thread is final.
    pub fn reject(&self, thread: Option<ThreadId>, data: Value) -> &Self {
        self.finish(thread, Outcome::Rejected, data)
    }

    /// Runs the progress callbacks of a pending `thread` (default: current).
    pub fn notify(&self, thread: Option<ThreadId>, data: Value) -> &Self {
        let thread = thread.unwrap_or_else(|| self.current_thread());
        if self.inner.threads.notify(thread, &data) {
            self.publish(events::NOTIFIED, data);
        }
        self
    }

    /// Opens a new thread and returns its index, resetting `loaded`,
    /// `success` and `failed`.
    pub fn unfinalize(&self) -> ThreadId {
        self.update_status(|status| {
            status.loaded = false;
            status.success = false;
            status.failed = false;
        });
        self.publish(events::UNFINALIZED, Value::Null);
        self.inner.threads.advance()
    }

    /// Attaches success and fail callbacks to the current thread.
    ///
    /// If the thread is already final the matching callback runs before this
    /// call returns.
    pub fn then<S, F>(&self, success: S, fail: F) -> &Self
    where
        S: Fn(&Value) + 'static,
        F: Fn(&Value) + 'static,
    {
        self.attach(CallbackKind::Success, success);
        self.attach(CallbackKind::Fail, fail)
    }

    /// Attaches a callback for a successful outcome of the current thread.
    pub fn success<S>(&self, callback: S) -> &Self
    where
        S: Fn(&Value) + 'static,
    {
        self.attach(CallbackKind::Success, callback)
    }

    /// Attaches a callback for a failed outcome of the current thread.
    pub fn fail<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Value) + 'static,
    {
        self.attach(CallbackKind::Fail, callback)
    }

    /// Attaches a progress callback to the current thread.
    pub fn progress<P>(&self, callback: P) -> &Self
    where
        P: Fn(&Value) + 'static,
    {
        self.attach(CallbackKind::Progress, callback)
    }

    /// Attaches a callback for either outcome of the current thread.
    pub fn always<A>(&self, callback: A) -> &Self
    where
        A: Fn(&Value) + 'static,
    {
        self.attach(CallbackKind::Always, callback)
    }

    pub(crate) fn always_on<A>(&self, thread: ThreadId, callback: A)
    where
        A: Fn(&Value) + 'static,
    {
        self.inner
            .threads
            .attach_to(thread, CallbackKind::Always, Rc::new(callback));
    }

    fn attach<C>(&self, kind: CallbackKind, callback: C) -> &Self
    where
        C: Fn(&Value) + 'static,
    {
        self.inner.threads.attach(kind, Rc::new(callback));
        self
    }

    fn finish(&self, thread: Option<ThreadId>, outcome: Outcome, data: Value) -> &Self {
        let thread = thread.unwrap_or_else(|| self.current_thread());
        if self.inner.threads.is_final(thread) {
            return self;
        }
        self.update_status(|status| {
            status.loaded = true;
            status.success = outcome.is_resolved();
            status.failed = outcome.is_rejected();
            status.busy = false;
        });
        debug!(kind = self.type_name(), %thread, %outcome, "finalizing thread");
        self.inner.threads.settle(thread, outcome, data.clone());

        let event = match outcome {
            Outcome::Resolved => events::RESOLVED,
            Outcome::Rejected => events::REJECTED,
        };
        let notice = Notice::Data(data);
        self.inner.events.publish(event, &notice);
        self.inner.events.publish(events::FINALIZED, &notice);
        self
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.type_name())
            .field("status", &self.status())
            .field("threads", &self.inner.threads)
            .field("events", &self.inner.events)
            .finish()
    }
}
