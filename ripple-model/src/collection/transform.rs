//! Reversible filter and sort transforms.
//!
//! The first transform since the last `end` snapshots the data; `end`
//! restores it. Both transforms are remembered so that `set` can apply them
//! again to fresh data.

use super::{Collection, Member, Record};
use crate::child::ChildModel;
use ripple_types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::debug;

type Predicate<M> = Rc<dyn Fn(&Member<M>, usize) -> bool>;
type Comparator<M> = Rc<dyn Fn(&Member<M>, &Member<M>) -> Ordering>;

/// Argument of [`Collection::filter`].
pub enum FilterSpec<M: ChildModel> {
    /// Keeps the members for which the predicate holds.
    Predicate(Predicate<M>),
    /// Keeps the members whose fields match every key of a JSON object.
    /// A field holding a sequence matches when it contains the value.
    Match(Value),
}

impl<M: ChildModel> FilterSpec<M> {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Member<M>, usize) -> bool + 'static,
    {
        Self::Predicate(Rc::new(predicate))
    }
}

impl<M: ChildModel> From<Value> for FilterSpec<M> {
    fn from(criteria: Value) -> Self {
        Self::Match(criteria)
    }
}

/// Argument of [`Collection::sort`].
pub enum SortSpec<M: ChildModel> {
    /// A caller-supplied comparator.
    Comparator(Comparator<M>),
    /// Signed field expressions such as `"+name"` or `"-age"`; later keys
    /// break ties left by earlier ones.
    Fields(Vec<String>),
}

impl<M: ChildModel> SortSpec<M> {
    pub fn by<F>(comparator: F) -> Self
    where
        F: Fn(&Member<M>, &Member<M>) -> Ordering + 'static,
    {
        Self::Comparator(Rc::new(comparator))
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }
}

impl<M: ChildModel> From<&str> for SortSpec<M> {
    fn from(field: &str) -> Self {
        Self::Fields(vec![field.to_string()])
    }
}

impl<M: ChildModel> From<String> for SortSpec<M> {
    fn from(field: String) -> Self {
        Self::Fields(vec![field])
    }
}

impl<M: ChildModel> From<Vec<String>> for SortSpec<M> {
    fn from(fields: Vec<String>) -> Self {
        Self::Fields(fields)
    }
}

impl<M: ChildModel> From<Vec<&str>> for SortSpec<M> {
    fn from(fields: Vec<&str>) -> Self {
        Self::fields(fields)
    }
}

impl<M: ChildModel, const N: usize> From<[&str; N]> for SortSpec<M> {
    fn from(fields: [&str; N]) -> Self {
        Self::fields(fields)
    }
}

/// Sort configuration remembered together with the sort keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    /// Compare strings case-sensitively.
    #[serde(default)]
    pub preserve_case: bool,
}

/// One parsed sort expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: String,
    pub descending: bool,
}

impl SortKey {
    /// Parses `"field"`, `"+field"` or `"-field"`; surrounding whitespace is
    /// ignored.
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let (descending, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let path = rest.trim();
        if path.is_empty() {
            return Err(Error::InvalidSort(expression.to_string()));
        }
        Ok(Self {
            path: path.to_string(),
            descending,
        })
    }

    fn compare<M: ChildModel>(&self, a: &Member<M>, b: &Member<M>, options: SortOptions) -> Ordering {
        let ordering = compare_values(&a.value_at(&self.path), &b.value_at(&self.path), options);
        if self.descending { ordering.reverse() } else { ordering }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub(super) enum ActiveFilter<M: ChildModel> {
    Predicate(Predicate<M>),
    Match(Map<String, Value>),
}

impl<M: ChildModel> Clone for ActiveFilter<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Predicate(predicate) => Self::Predicate(Rc::clone(predicate)),
            Self::Match(criteria) => Self::Match(criteria.clone()),
        }
    }
}

impl<M: ChildModel> fmt::Debug for ActiveFilter<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Match(criteria) => f.debug_tuple("Match").field(criteria).finish(),
        }
    }
}

pub(super) enum ActiveSort<M: ChildModel> {
    Comparator(Comparator<M>),
    Keys(Vec<SortKey>, SortOptions),
}

impl<M: ChildModel> Clone for ActiveSort<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Comparator(comparator) => Self::Comparator(Rc::clone(comparator)),
            Self::Keys(keys, options) => Self::Keys(keys.clone(), *options),
        }
    }
}

/// Orders two field values.
///
/// Objects and sequences compare by their serialized JSON; numbers compare
/// numerically; strings compare case-insensitively unless
/// `preserve_case` is set. Values of different kinds order as
/// null < bool < number < string.
#[must_use]
pub fn compare_values(a: &Value, b: &Value, options: SortOptions) -> Ordering {
    fn comparable(value: &Value) -> Value {
        match value {
            Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
            other => other.clone(),
        }
    }
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) | Value::Array(_) | Value::Object(_) => 3,
        }
    }

    let (a, b) = (comparable(a), comparable(b));
    match (&a, &b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) if options.preserve_case => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        _ => rank(&a).cmp(&rank(&b)),
    }
}

fn matches_criteria<M: ChildModel>(member: &Member<M>, criteria: &Map<String, Value>) -> bool {
    criteria.iter().all(|(key, expected)| {
        let actual = member.field(key).map_or(Value::Null, |field| field.read());
        match &actual {
            Value::Array(items) => items.contains(expected),
            other => other == expected,
        }
    })
}

impl<M: ChildModel> Collection<M> {
    /// Narrows the data to the members matching `spec`.
    ///
    /// The object form also deselects every member it drops. On empty data
    /// the filter is only remembered; so is an empty object, which never
    /// transforms the data.
    pub fn filter(&self, spec: impl Into<FilterSpec<M>>) -> Result<&Self> {
        let filter = match spec.into() {
            FilterSpec::Predicate(predicate) => ActiveFilter::Predicate(predicate),
            FilterSpec::Match(Value::Object(criteria)) => ActiveFilter::Match(criteria),
            FilterSpec::Match(other) => return Err(Error::InvalidFilter(other.to_string())),
        };
        self.apply_filter(filter);
        Ok(self)
    }

    /// Sorts with default [`SortOptions`].
    pub fn sort(&self, spec: impl Into<SortSpec<M>>) -> Result<&Self> {
        self.sort_with(spec, SortOptions::default())
    }

    /// Reorders the data. On empty data the sort is only remembered.
    pub fn sort_with(&self, spec: impl Into<SortSpec<M>>, options: SortOptions) -> Result<&Self> {
        let sort = match spec.into() {
            SortSpec::Comparator(comparator) => ActiveSort::Comparator(comparator),
            SortSpec::Fields(fields) => {
                if fields.is_empty() {
                    return Err(Error::InvalidSort("empty field list".to_string()));
                }
                let keys = fields
                    .iter()
                    .map(|field| SortKey::parse(field))
                    .collect::<Result<Vec<_>>>()?;
                ActiveSort::Keys(keys, options)
            }
        };
        self.apply_sort(sort);
        Ok(self)
    }

    /// Discards the active transform, restoring the snapshot, clearing
    /// staged items and all selection. Unless `keep_history` is set the
    /// remembered filter and sort are forgotten as well.
    pub fn end(&self, keep_history: bool) -> &Self {
        let Some(snapshot) = self.inner.state.borrow_mut().snapshot.take() else {
            if !keep_history {
                let mut state = self.inner.state.borrow_mut();
                state.active_filter = None;
                state.active_sort = None;
            }
            return self;
        };

        let touched: Vec<Member<M>> = {
            let state = self.inner.state.borrow();
            state
                .records
                .iter()
                .chain(snapshot.iter())
                .filter_map(Record::as_member)
                .chain(state.cache.iter().flatten())
                .cloned()
                .collect()
        };
        for member in &touched {
            member.set_selected_flag(false);
        }

        let mut state = self.inner.state.borrow_mut();
        state.records = snapshot;
        state.staged.clear();
        state.invalidate();
        if !keep_history {
            state.active_filter = None;
            state.active_sort = None;
        }
        debug!(len = state.records.len(), keep_history, "transform ended");
        self
    }

    pub(super) fn apply_filter(&self, filter: ActiveFilter<M>) {
        if matches!(&filter, ActiveFilter::Match(criteria) if criteria.is_empty()) {
            self.inner.state.borrow_mut().active_filter = Some(filter);
            return;
        }
        if !self.begin_transform(|state| state.active_filter = Some(filter.clone())) {
            return;
        }

        let members = self.get();
        let kept: Vec<Member<M>> = match &filter {
            ActiveFilter::Predicate(predicate) => members
                .iter()
                .enumerate()
                .filter(|(index, member)| predicate(member, *index))
                .map(|(_, member)| member.clone())
                .collect(),
            ActiveFilter::Match(criteria) => members
                .iter()
                .filter(|member| {
                    let keep = matches_criteria(member, criteria);
                    if !keep {
                        member.select(false, true);
                    }
                    keep
                })
                .cloned()
                .collect(),
        };

        let mut state = self.inner.state.borrow_mut();
        debug!(before = members.len(), after = kept.len(), ?filter, "filter applied");
        state.records = kept.into_iter().map(Record::Member).collect();
        state.invalidate();
    }

    pub(super) fn apply_sort(&self, sort: ActiveSort<M>) {
        if !self.begin_transform(|state| state.active_sort = Some(sort.clone())) {
            return;
        }

        let mut members = self.get();
        match &sort {
            ActiveSort::Comparator(comparator) => members.sort_by(|a, b| comparator(a, b)),
            ActiveSort::Keys(keys, options) => members.sort_by(|a, b| {
                keys.iter()
                    .fold(Ordering::Equal, |ordering, key| {
                        ordering.then_with(|| key.compare(a, b, *options))
                    })
            }),
        }
        for (slot, member) in members.iter().enumerate() {
            member.bind(&self.inner, slot);
        }

        let mut state = self.inner.state.borrow_mut();
        state.records = members.iter().cloned().map(Record::Member).collect();
        state.invalidate();
        state.cache = Some(members);
        debug!(len = state.records.len(), "sort applied");
    }

    /// Remembers the transform and snapshots the data if this is the first
    /// transform since the last `end`. Returns false when there is no data
    /// to transform.
    fn begin_transform(&self, remember: impl FnOnce(&mut super::State<M>)) -> bool {
        let mut state = self.inner.state.borrow_mut();
        remember(&mut state);
        if state.records.is_empty() {
            return false;
        }
        if state.snapshot.is_none() {
            state.snapshot = Some(state.records.clone());
        }
        true
    }
}
