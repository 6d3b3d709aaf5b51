use super::{Collection, CollectionInner, Record};
use crate::child::ChildModel;
use crate::entity::errors;
use ripple_types::ThreadId;
use serde_json::{Map, Value};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// A read or update backend.
///
/// `call` starts a request and returns immediately; the outcome is reported
/// later (or right away) through exactly one of the [`Reply`] callbacks.
/// Returning `false` means the request was refused and no reply will come.
pub trait Service {
    fn call(&self, data: Option<&Value>, reply: Reply) -> bool;
}

impl<F> Service for F
where
    F: Fn(Option<&Value>, Reply) -> bool,
{
    fn call(&self, data: Option<&Value>, reply: Reply) -> bool {
        self(data, reply)
    }
}

/// The completion handle handed to a [`Service`].
#[derive(Clone)]
pub struct Reply {
    on_success: Rc<dyn Fn(Value)>,
    on_fail: Rc<dyn Fn(Value)>,
}

impl Reply {
    /// Builds a reply from two completion callbacks.
    pub fn new<S, F>(on_success: S, on_fail: F) -> Self
    where
        S: Fn(Value) + 'static,
        F: Fn(Value) + 'static,
    {
        Self {
            on_success: Rc::new(on_success),
            on_fail: Rc::new(on_fail),
        }
    }

    /// Reports success with the service's payload.
    pub fn succeed(&self, payload: Value) {
        (self.on_success)(payload);
    }

    /// Reports failure with an error payload.
    pub fn fail(&self, error: Value) {
        (self.on_fail)(error);
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reply(..)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Round {
    Read,
    Update,
}

impl Round {
    fn error_slot(self) -> &'static str {
        match self {
            Self::Read => errors::READ,
            Self::Update => errors::UPDATE,
        }
    }
}

/// Turns a read payload into records: a sequence yields its items, `null`
/// yields nothing, anything else is a single item.
fn into_records<M: ChildModel>(payload: &Value) -> Vec<Record<M>> {
    match payload {
        Value::Array(items) => items.iter().cloned().map(Record::Raw).collect(),
        Value::Null => Vec::new(),
        other => vec![Record::Raw(other.clone())],
    }
}

impl<M: ChildModel> Collection<M> {
    /// Reads the data through the read service on a fresh thread.
    pub fn read(&self, data: Option<Value>) -> &Self {
        self.read_with(data, None)
    }

    /// Reads the data through the read service.
    ///
    /// Runs on `thread`, or on a newly opened thread when `None`. While
    /// another round is in flight the call is deferred until that round
    /// finalizes; callbacks attached right after this call land on the
    /// deferred round's thread.
    pub fn read_with(&self, data: Option<Value>, thread: Option<ThreadId>) -> &Self {
        self.run(Round::Read, data, thread)
    }

    /// Sends `data` through the update service on a fresh thread.
    ///
    /// With `None` the round succeeds immediately, provided an update service
    /// is configured at all.
    pub fn update(&self, data: Option<Value>) -> &Self {
        self.update_with(data, None)
    }

    /// Sends `data` through the update service on `thread`, deferring while
    /// another round is in flight.
    pub fn update_with(&self, data: Option<Value>, thread: Option<ThreadId>) -> &Self {
        self.run(Round::Update, data, thread)
    }

    /// Repeats the last read, or reads without data if there was none.
    pub fn refresh(&self) -> &Self {
        let last = self.inner.state.borrow().last_read.clone();
        self.read(last)
    }

    /// Data passed to the most recent read, `{}` if it had none.
    #[must_use]
    pub fn last_read(&self) -> Option<Value> {
        self.inner.state.borrow().last_read.clone()
    }

    fn run(&self, round: Round, data: Option<Value>, thread: Option<ThreadId>) -> &Self {
        let base = &self.inner.base;
        if base.is_busy() {
            let in_flight = base.current_thread();
            let next = base.unfinalize();
            debug!(?round, %in_flight, %next, "collection busy, deferring");
            let weak = Rc::downgrade(&self.inner);
            base.always_on(in_flight, move |_| {
                if let Some(inner) = weak.upgrade() {
                    Collection::from_inner(inner).run(round, data.clone(), Some(next));
                }
            });
            return self;
        }
        let thread = thread.unwrap_or_else(|| base.unfinalize());

        let service = match round {
            Round::Read => self.inner.read_service.clone(),
            Round::Update => self.inner.update_service.clone(),
        };
        let Some(service) = service else {
            if round == Round::Update {
                warn!(%thread, "update attempted without an update service");
                base.record_error(errors::UPDATE, Value::Bool(true));
                base.reject(Some(thread), Value::Bool(true));
            } else {
                warn!(%thread, "read attempted without a read service");
            }
            return self;
        };

        base.update_status(|status| status.busy = true);
        match round {
            Round::Read => {
                self.inner.state.borrow_mut().last_read =
                    Some(data.clone().unwrap_or_else(|| Value::Object(Map::new())));
            }
            Round::Update if data.is_none() => {
                base.clear_error(errors::UPDATE);
                base.resolve(Some(thread), Value::Null);
                return self;
            }
            Round::Update => {}
        }

        debug!(?round, %thread, "calling service");
        let reply = Self::reply(Rc::downgrade(&self.inner), round, thread);
        if !service.call(data.as_ref(), reply) && !base.is_final(Some(thread)) {
            warn!(?round, %thread, "service refused the request");
            base.record_error(round.error_slot(), Value::Bool(true));
            base.reject(Some(thread), Value::Bool(true));
        }
        self
    }

    fn reply(owner: Weak<CollectionInner<M>>, round: Round, thread: ThreadId) -> Reply {
        let on_fail = owner.clone();
        Reply::new(
            move |payload| {
                let Some(inner) = owner.upgrade() else {
                    return;
                };
                let collection = Collection::from_inner(inner);
                if collection.is_final(Some(thread)) {
                    return;
                }
                collection.clear_error(round.error_slot());
                if round == Round::Read {
                    collection.set(into_records::<M>(&payload));
                }
                collection.resolve(Some(thread), payload);
            },
            move |error| {
                let Some(inner) = on_fail.upgrade() else {
                    return;
                };
                let collection = Collection::from_inner(inner);
                if collection.is_final(Some(thread)) {
                    return;
                }
                collection.record_error(round.error_slot(), error.clone());
                collection.reject(Some(thread), error);
            },
        )
    }
}
