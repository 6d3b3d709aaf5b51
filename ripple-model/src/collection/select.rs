use super::{Collection, CollectionInner, Member};
use crate::child::ChildModel;
use ripple_types::{Error, Result};
use tracing::trace;

/// What a call to [`Collection::select`] applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Select every item.
    All,
    /// Deselect every item.
    None,
    /// Set the item at an index.
    Index(usize, bool),
}

impl From<bool> for Selector {
    fn from(all: bool) -> Self {
        if all { Self::All } else { Self::None }
    }
}

impl From<(usize, bool)> for Selector {
    fn from((index, value): (usize, bool)) -> Self {
        Self::Index(index, value)
    }
}

impl<M: ChildModel> CollectionInner<M> {
    /// Records a member's selection change at `slot`.
    pub(super) fn record_selection(&self, slot: usize, previous: bool, value: bool, bulk: bool) {
        let mut state = self.state.borrow_mut();
        if state.selection.len() <= slot {
            state.selection.resize(slot + 1, false);
        }
        state.selection[slot] = value;
        match (previous, value) {
            (false, true) => state.selected_count += 1,
            (true, false) => state.selected_count = state.selected_count.saturating_sub(1),
            _ => {}
        }
        if !bulk {
            state.refresh_aggregates();
        }
    }
}

impl<M: ChildModel> Collection<M> {
    /// Changes the selection: `true` selects all, `false` clears all, and
    /// `(index, value)` sets one item. Aggregate flags are recomputed once
    /// at the end.
    pub fn select(&self, selector: impl Into<Selector>) -> Result<&Self> {
        let members = self.get();
        match selector.into() {
            Selector::All => {
                for member in &members {
                    member.select(true, true);
                }
            }
            Selector::None => {
                for member in &members {
                    member.select(false, true);
                }
                let mut state = self.inner.state.borrow_mut();
                state.selection = vec![false; members.len()];
                state.selected_count = 0;
            }
            Selector::Index(index, value) => {
                let member = members.get(index).ok_or(Error::IndexOutOfRange {
                    index,
                    len: members.len(),
                })?;
                member.select(value, false);
            }
        }

        let mut state = self.inner.state.borrow_mut();
        state.refresh_aggregates();
        trace!(selected = state.selected_count, "selection changed");
        Ok(self)
    }

    /// Index-aligned selected flags.
    #[must_use]
    pub fn selection(&self) -> Vec<bool> {
        self.inner.state.borrow().selection.clone()
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.inner.state.borrow().selected_count
    }

    /// True when every item is selected and there is at least one item.
    #[must_use]
    pub fn all_selected(&self) -> bool {
        self.inner.state.borrow().all_selected
    }

    #[must_use]
    pub fn none_selected(&self) -> bool {
        self.inner.state.borrow().none_selected
    }

    /// The members whose selected flag is set.
    pub fn selected(&self) -> Vec<Member<M>> {
        self.get()
            .into_iter()
            .filter(Member::is_selected)
            .collect()
    }
}
