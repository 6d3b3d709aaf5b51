use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// A registered event callback. The return value takes part in the
/// AND-reduction performed by [`EventChannel::publish`].
pub type Listener<P> = Rc<dyn Fn(&P) -> bool>;

/// Handle identifying one subscription, used to unsubscribe it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

struct Registration<P> {
    id: ListenerId,
    once: bool,
    callback: Listener<P>,
}

/// Per-instance registry of named listeners.
pub struct EventChannel<P> {
    listeners: RefCell<HashMap<String, Vec<Registration<P>>>>,
    next_id: Cell<u64>,
}

impl<P> EventChannel<P> {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Registers `callback` for every future publish of `event`.
    pub fn subscribe<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&P) -> bool + 'static,
    {
        self.register(event, Rc::new(callback), false)
    }

    /// Registers `callback` for the next publish of `event` only.
    pub fn subscribe_once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&P) -> bool + 'static,
    {
        self.register(event, Rc::new(callback), true)
    }

    /// Removes one listener from `event`, or all of them when `listener` is
    /// `None`. Returns how many listeners were removed.
    pub fn unsubscribe(&self, event: &str, listener: Option<ListenerId>) -> usize {
        let mut listeners = self.listeners.borrow_mut();
        let removed = match listener {
            None => listeners.remove(event).map_or(0, |regs| regs.len()),
            Some(id) => {
                let Some(regs) = listeners.get_mut(event) else {
                    return 0;
                };
                let before = regs.len();
                regs.retain(|r| r.id != id);
                let removed = before - regs.len();
                if regs.is_empty() {
                    listeners.remove(event);
                }
                removed
            }
        };
        if removed > 0 {
            trace!(event, removed, "listeners removed");
        }
        removed
    }

    /// Dispatches `payload` to every listener of `event`.
    ///
    /// Returns `true` when every listener returned `true`; an event without
    /// listeners also yields `true`.
    pub fn publish(&self, event: &str, payload: &P) -> bool {
        let snapshot: Vec<(ListenerId, bool, Listener<P>)> = match self.listeners.borrow().get(event) {
            Some(regs) => regs
                .iter()
                .map(|r| (r.id, r.once, Rc::clone(&r.callback)))
                .collect(),
            None => return true,
        };
        trace!(event, listeners = snapshot.len(), "publishing");

        let mut all = true;
        for (id, once, callback) in snapshot {
            if !self.is_registered(event, id) {
                continue;
            }
            if once {
                self.unsubscribe(event, Some(id));
            }
            all = callback(payload) && all;
        }
        all
    }

    /// Number of listeners currently registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    /// Returns true if no listener is registered for any event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    fn register(&self, event: &str, callback: Listener<P>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(Registration { id, once, callback });
        id
    }

    fn is_registered(&self, event: &str, id: ListenerId) -> bool {
        self.listeners
            .borrow()
            .get(event)
            .is_some_and(|regs| regs.iter().any(|r| r.id == id))
    }
}

impl<P> Default for EventChannel<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventChannel<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.borrow();
        let mut counts: Vec<(&str, usize)> = listeners
            .iter()
            .map(|(name, regs)| (name.as_str(), regs.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EventChannel")
            .field("listeners", &counts)
            .finish()
    }
}
