use ripple_types::{CallbackKind, Outcome, ThreadId};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// A queued thread callback.
pub type Callback<P> = Rc<dyn Fn(&P)>;

/// The final record of a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement<P> {
    pub outcome: Outcome,
    pub payload: P,
}

struct Pending<P> {
    kind: CallbackKind,
    callback: Callback<P>,
}

impl<P> Clone for Pending<P> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            callback: Rc::clone(&self.callback),
        }
    }
}

/// Per-instance thread index, final records and callback queues.
///
/// All methods take `&self`; no internal borrow is held while a callback
/// runs, so callbacks are free to call back into the engine.
pub struct PromiseThreads<P> {
    current: Cell<ThreadId>,
    finals: RefCell<BTreeMap<ThreadId, Settlement<P>>>,
    queue: RefCell<BTreeMap<ThreadId, Vec<Pending<P>>>>,
}

impl<P: Clone> PromiseThreads<P> {
    /// Creates an engine positioned on [`ThreadId::FIRST`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Cell::new(ThreadId::FIRST),
            finals: RefCell::new(BTreeMap::new()),
            queue: RefCell::new(BTreeMap::new()),
        }
    }

    /// The thread new callbacks are attached to.
    #[must_use]
    pub fn current(&self) -> ThreadId {
        self.current.get()
    }

    /// Returns true once `thread` has been resolved or rejected.
    #[must_use]
    pub fn is_final(&self, thread: ThreadId) -> bool {
        self.finals.borrow().contains_key(&thread)
    }

    /// Returns the final record of `thread`, if any.
    #[must_use]
    pub fn settlement(&self, thread: ThreadId) -> Option<Settlement<P>> {
        self.finals.borrow().get(&thread).cloned()
    }

    /// Finalizes `thread` and drains its queue.
    ///
    /// Returns `false` without doing anything if the thread was already final.
    pub fn settle(&self, thread: ThreadId, outcome: Outcome, payload: P) -> bool {
        if self.is_final(thread) {
            trace!(%thread, %outcome, "thread already final, ignoring");
            return false;
        }
        self.finals.borrow_mut().insert(
            thread,
            Settlement {
                outcome,
                payload: payload.clone(),
            },
        );
        debug!(%thread, %outcome, current = %self.current(), "thread finalized");
        self.drain(thread, &payload);
        true
    }

    /// Runs the progress callbacks of a pending `thread`.
    ///
    /// Returns `false` if the thread is already final.
    pub fn notify(&self, thread: ThreadId, payload: &P) -> bool {
        if self.is_final(thread) {
            return false;
        }
        self.drain(thread, payload);
        true
    }

    /// Moves to a fresh thread and returns it. Indices are never reused.
    pub fn advance(&self) -> ThreadId {
        let next = self.current().next();
        self.current.set(next);
        debug!(thread = %next, "thread opened");
        next
    }

    /// Attaches `callback` to the current thread.
    pub fn attach(&self, kind: CallbackKind, callback: Callback<P>) {
        self.attach_to(self.current(), kind, callback);
    }

    /// Attaches `callback` to `thread`. If that thread is already final the
    /// queue is drained right away.
    pub fn attach_to(&self, thread: ThreadId, kind: CallbackKind, callback: Callback<P>) {
        self.queue
            .borrow_mut()
            .entry(thread)
            .or_default()
            .push(Pending { kind, callback });
        if let Some(settlement) = self.settlement(thread) {
            self.drain(thread, &settlement.payload);
        }
    }

    /// Number of callbacks still queued across all threads.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().values().map(Vec::len).sum()
    }

    /// Number of callbacks still queued for `thread`.
    #[must_use]
    pub fn pending_for(&self, thread: ThreadId) -> usize {
        self.queue.borrow().get(&thread).map_or(0, Vec::len)
    }

    fn drain(&self, thread: ThreadId, payload: &P) {
        let state = self.finals.borrow().get(&thread).map(|s| s.outcome);
        let mut cursor = 0;
        loop {
            let entry = {
                let mut queue = self.queue.borrow_mut();
                let Some(list) = queue.get_mut(&thread) else {
                    break;
                };
                if cursor >= list.len() {
                    break;
                }
                if state.is_some() {
                    // final threads never need their callbacks again
                    let entry = list.remove(cursor);
                    if list.is_empty() {
                        queue.remove(&thread);
                    }
                    entry
                } else {
                    cursor += 1;
                    list[cursor - 1].clone()
                }
            };
            if entry.kind.fires_on(state) {
                trace!(%thread, kind = ?entry.kind, "running thread callback");
                (entry.callback)(payload);
            }
        }
    }
}

impl<P: Clone> Default for PromiseThreads<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for PromiseThreads<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseThreads")
            .field("current", &self.current.get())
            .field("finals", &self.finals.borrow().keys().collect::<Vec<_>>())
            .field(
                "pending",
                &self.queue.borrow().values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}
