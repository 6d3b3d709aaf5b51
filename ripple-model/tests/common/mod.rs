#![allow(dead_code)]

use ripple_model::{ChildModel, Entity, Field, Notice, PayloadSource, Reply, Service};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test subscriber once per test binary. `RUST_LOG` controls the
/// verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// A callback pushing `tag:payload` to `log`.
pub fn record(log: &Log, tag: &str) -> impl Fn(&Value) + 'static {
    let log = Rc::clone(log);
    let tag = tag.to_string();
    move |payload: &Value| log.borrow_mut().push(format!("{tag}:{payload}"))
}

/// A listener pushing `tag:payload` to `log` and returning true.
pub fn listen(log: &Log, tag: &str) -> impl Fn(&Notice) -> bool + 'static {
    let log = Rc::clone(log);
    let tag = tag.to_string();
    move |notice: &Notice| {
        let payload = notice.data().cloned().unwrap_or(Value::Null);
        log.borrow_mut().push(format!("{tag}:{payload}"));
        true
    }
}

pub fn rows(values: &[i64]) -> Vec<Value> {
    values.iter().map(|a| json!({ "a": a })).collect()
}

// ── Test child model ─────────────────────────────────────────────

/// Child model with accessor fields for every payload key plus one plain
/// field, `source`.
pub struct Row {
    entity: Entity,
    data: Value,
}

impl Row {
    pub fn entity(&self) -> &Entity {
        &self.entity
    }
}

impl PayloadSource for Row {
    fn payload(&self) -> Value {
        self.data.clone()
    }
}

impl ChildModel for Row {
    fn from_payload(payload: Value) -> Self {
        Self {
            entity: Entity::new(Some(payload.clone())),
            data: payload,
        }
    }

    fn resolve(&self) {
        self.entity.resolve(None, self.data.clone());
    }

    fn field(&self, name: &str) -> Option<Field> {
        if name == "source" {
            return Some(Field::Value(json!("row")));
        }
        let value = self.data.get(name)?.clone();
        Some(Field::accessor(move || value.clone()))
    }
}

// ── Scripted service ─────────────────────────────────────────────

/// A service that records every call and keeps the replies so a test can
/// complete them later.
#[derive(Clone, Default)]
pub struct ScriptedService {
    calls: Rc<RefCell<Vec<(Option<Value>, Reply)>>>,
    refuse: bool,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that refuses every request.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn data(&self, call: usize) -> Option<Value> {
        self.calls.borrow()[call].0.clone()
    }

    pub fn reply(&self, call: usize) -> Reply {
        self.calls.borrow()[call].1.clone()
    }
}

impl Service for ScriptedService {
    fn call(&self, data: Option<&Value>, reply: Reply) -> bool {
        self.calls.borrow_mut().push((data.cloned(), reply));
        !self.refuse
    }
}
