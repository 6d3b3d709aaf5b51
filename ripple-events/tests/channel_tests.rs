use pretty_assertions::assert_eq;
use ripple_events::EventChannel;
use std::cell::RefCell;
use std::rc::Rc;

fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&i32) -> bool>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let make = move |tag: &str| -> Box<dyn Fn(&i32) -> bool> {
        let sink = Rc::clone(&sink);
        let tag = tag.to_string();
        Box::new(move |value: &i32| {
            sink.borrow_mut().push(format!("{tag}:{value}"));
            true
        })
    };
    (log, make)
}

// ── Subscribe / publish ──────────────────────────────────────────

#[test]
fn publish_without_listeners_is_true() {
    let channel: EventChannel<i32> = EventChannel::new();
    assert!(channel.publish("nothing", &1));
}

#[test]
fn listeners_fire_in_subscription_order() {
    let channel = EventChannel::new();
    let (log, make) = recorder();
    channel.subscribe("tick", make("a"));
    channel.subscribe("tick", make("b"));
    channel.subscribe("other", make("c"));

    assert!(channel.publish("tick", &7));
    assert_eq!(*log.borrow(), vec!["a:7".to_string(), "b:7".to_string()]);
}

#[test]
fn publish_and_reduces_listener_results() {
    let channel = EventChannel::new();
    let calls = Rc::new(RefCell::new(0));
    let c1 = Rc::clone(&calls);
    let c2 = Rc::clone(&calls);
    channel.subscribe("save", move |_: &i32| {
        *c1.borrow_mut() += 1;
        false
    });
    channel.subscribe("save", move |_: &i32| {
        *c2.borrow_mut() += 1;
        true
    });

    assert!(!channel.publish("save", &0));
    // a false result does not stop dispatch
    assert_eq!(*calls.borrow(), 2);
}

// ── Unsubscribe ──────────────────────────────────────────────────

#[test]
fn unsubscribe_single_listener() {
    let channel = EventChannel::new();
    let (log, make) = recorder();
    let a = channel.subscribe("tick", make("a"));
    channel.subscribe("tick", make("b"));

    assert_eq!(channel.unsubscribe("tick", Some(a)), 1);
    channel.publish("tick", &1);
    assert_eq!(*log.borrow(), vec!["b:1".to_string()]);
}

#[test]
fn unsubscribe_all_listeners_of_event() {
    let channel = EventChannel::new();
    let (log, make) = recorder();
    channel.subscribe("tick", make("a"));
    channel.subscribe("tick", make("b"));
    channel.subscribe("tock", make("c"));

    assert_eq!(channel.unsubscribe("tick", None), 2);
    assert_eq!(channel.listener_count("tick"), 0);
    channel.publish("tick", &1);
    channel.publish("tock", &2);
    assert_eq!(*log.borrow(), vec!["c:2".to_string()]);
}

#[test]
fn unsubscribe_unknown_is_noop() {
    let channel: EventChannel<i32> = EventChannel::new();
    assert_eq!(channel.unsubscribe("missing", None), 0);
    assert!(channel.is_empty());
}

// ── One-shot ─────────────────────────────────────────────────────

#[test]
fn subscribe_once_fires_a_single_time() {
    let channel = EventChannel::new();
    let (log, make) = recorder();
    channel.subscribe_once("tick", make("once"));
    channel.subscribe("tick", make("always"));

    channel.publish("tick", &1);
    channel.publish("tick", &2);
    assert_eq!(
        *log.borrow(),
        vec!["once:1".to_string(), "always:1".to_string(), "always:2".to_string()]
    );
    assert_eq!(channel.listener_count("tick"), 1);
}

#[test]
fn nested_publish_does_not_refire_one_shot() {
    let channel = Rc::new(EventChannel::new());
    let hits = Rc::new(RefCell::new(0));
    let inner = Rc::clone(&channel);
    let counter = Rc::clone(&hits);
    channel.subscribe_once("tick", move |depth: &i32| {
        *counter.borrow_mut() += 1;
        if *depth == 0 {
            inner.publish("tick", &1);
        }
        true
    });

    channel.publish("tick", &0);
    assert_eq!(*hits.borrow(), 1);
}

// ── Re-entrant mutation ──────────────────────────────────────────

#[test]
fn listener_removed_during_dispatch_is_skipped() {
    let channel = Rc::new(EventChannel::new());
    let (log, make) = recorder();
    let handle = Rc::clone(&channel);
    channel.subscribe("tick", move |_: &i32| {
        handle.unsubscribe("tick", None);
        true
    });
    channel.subscribe("tick", make("late"));

    channel.publish("tick", &1);
    assert!(log.borrow().is_empty());
}

#[test]
fn listener_added_during_dispatch_fires_next_time() {
    let channel = Rc::new(EventChannel::new());
    let (log, make) = recorder();
    let handle = Rc::clone(&channel);
    let factory = Rc::new(make);
    let added = Rc::new(RefCell::new(false));
    channel.subscribe("tick", move |_: &i32| {
        if !*added.borrow() {
            *added.borrow_mut() = true;
            handle.subscribe("tick", factory("new"));
        }
        true
    });

    channel.publish("tick", &1);
    assert!(log.borrow().is_empty());
    channel.publish("tick", &2);
    assert_eq!(*log.borrow(), vec!["new:2".to_string()]);
}
