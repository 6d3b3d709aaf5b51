mod common;

use common::{listen, log};
use pretty_assertions::assert_eq;
use ripple_model::{
    events, Collection, Document, Entity, Error, Extension, ModelType, Output, Parent, Property,
    BASE_TYPE_NAME, COLLECTION_TYPE_NAME, DEFAULT_TYPE_NAME, ThreadId,
};
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;

fn greeter() -> ModelType<Entity> {
    Entity::base_type().extend(
        Extension::named("Greeter")
            .value("greeting", json!("hello"))
            .operation("greet", |_entity: &Entity, args: &[Value]| {
                let who = args.first().and_then(Value::as_str).unwrap_or("world");
                Ok(json!(format!("hello {who}")))
            }),
    )
}

// ── Naming ───────────────────────────────────────────────────────

#[test]
fn anonymous_extension_is_named_class() {
    let derived = Entity::base_type().extend(Extension::new());
    assert_eq!(derived.name(), DEFAULT_TYPE_NAME);
    assert_eq!(greeter().name(), "Greeter");
}

// ── Operations ───────────────────────────────────────────────────

#[test]
fn derived_type_inherits_and_invokes_operations() {
    let kind = Rc::new(greeter());
    let sub = kind.extend(Extension::named("Sub"));
    assert!(sub.has_operation("greet"));

    let entity = Entity::with_type(sub, None, false);
    assert_eq!(entity.type_name(), "Sub");
    assert_eq!(entity.invoke("greet", &[json!("ada")]).ok().and_then(Output::into_value), Some(json!("hello ada")));
    assert_eq!(entity.property("greeting"), Some(json!("hello")));
}

#[test]
fn unknown_operation_is_an_error() {
    let entity = Entity::new(None);
    match entity.invoke("missing", &[]) {
        Err(Error::UnknownOperation(name)) => assert_eq!(name, "missing"),
        other => panic!("expected UnknownOperation, got {other:?}"),
    }
}

#[test]
fn value_replaces_operation_of_same_name() {
    let derived = greeter().extend(Extension::new().value("greet", json!(42)));
    assert!(!derived.has_operation("greet"));
    assert_eq!(derived.value("greet"), Some(&json!(42)));
}

#[test]
fn operation_names_are_sorted() {
    let derived = greeter().extend(
        Extension::new()
            .operation("zeta", |_: &Entity, _: &[Value]| Ok(Value::Null))
            .operation("alpha", |_: &Entity, _: &[Value]| Ok(Value::Null)),
    );
    assert_eq!(
        derived.operation_names().collect::<Vec<_>>(),
        vec![
            "alpha",
            "clone",
            "greet",
            "is_final",
            "notify",
            "reject",
            "resolve",
            "unfinalize",
            "zeta",
        ]
    );
}

// ── Parent delegation ────────────────────────────────────────────

#[test]
fn override_delegates_to_parent() {
    let derived = greeter().extend(Extension::new().override_with(
        "greet",
        |entity: &Entity, parent, args: &[Value]| {
            let base = parent.call(entity, args)?.into_value().unwrap_or_default();
            Ok(json!(format!("{}!", base.as_str().unwrap_or_default())))
        },
    ));
    let entity = Entity::with_type(derived, None, false);
    assert_eq!(entity.invoke("greet", &[]).ok().and_then(Output::into_value), Some(json!("hello world!")));
}

#[test]
fn overrides_nest_across_levels() {
    let level = |suffix: &'static str| {
        Extension::new().override_with("greet", move |entity: &Entity, parent, args: &[Value]| {
            let base = parent.call(entity, args)?.into_value().unwrap_or_default();
            Ok(json!(format!("{}{suffix}", base.as_str().unwrap_or_default())))
        })
    };
    let kind = greeter().extend(level("1")).extend(level("2")).extend(level("3"));
    let entity = Entity::with_type(kind, None, false);
    assert_eq!(entity.invoke("greet", &[json!("x")]).ok().and_then(Output::into_value), Some(json!("hello x123")));
}

#[test]
fn override_without_ancestor_reports_missing_parent() {
    let kind = Entity::base_type().extend(Extension::new().override_with(
        "fresh",
        |entity: &Entity, parent, args: &[Value]| {
            if parent.exists() {
                parent.call(entity, args)
            } else {
                parent.call(entity, args).or(Ok(json!("fallback").into()))
            }
        },
    ));
    let entity = Entity::with_type(kind, None, false);
    assert_eq!(entity.invoke("fresh", &[]).ok().and_then(Output::into_value), Some(json!("fallback")));

    let strict = Entity::base_type().extend(
        Extension::new().override_with("fresh", |entity: &Entity, parent, args: &[Value]| {
            parent.call(entity, args)
        }),
    );
    let entity = Entity::with_type(strict, None, false);
    assert!(matches!(
        entity.invoke("fresh", &[]),
        Err(Error::MissingParentOperation(name)) if name == "fresh"
    ));
}

#[test]
fn raw_property_entries_apply_in_order() {
    let kind = Entity::base_type().extend(
        Extension::new()
            .property("size", Property::Value(json!(1)))
            .property("size", Property::Value(json!(2))),
    );
    assert_eq!(kind.value("size"), Some(&json!(2)));
}

// ── Built-in operations ──────────────────────────────────────────

#[test]
fn base_type_carries_builtin_operations() {
    let base = Entity::base_type();
    assert_eq!(base.name(), BASE_TYPE_NAME);
    for name in ["clone", "resolve", "reject", "notify", "unfinalize", "is_final"] {
        assert!(base.has_operation(name), "missing {name}");
    }
}

#[test]
fn builtin_operations_drive_promise_threads() {
    let entity = Entity::new(None);
    let opened = entity.invoke("unfinalize", &[]).ok().and_then(Output::into_value);
    assert_eq!(opened, Some(json!(2)));

    entity.invoke("resolve", &[json!("done")]).ok();
    assert!(entity.succeeded());
    assert_eq!(
        entity.invoke("is_final", &[]).ok().and_then(Output::into_value),
        Some(json!(true))
    );
    assert_eq!(
        entity.invoke("is_final", &[json!(1)]).ok().and_then(Output::into_value),
        Some(json!(false))
    );

    entity.invoke("reject", &[json!("late"), json!(1)]).ok();
    assert!(entity.is_final(Some(ThreadId::FIRST)));
    assert!(matches!(
        entity.invoke("resolve", &[json!("x"), json!("not a thread")]),
        Err(Error::Serialization(_))
    ));
}

#[test]
fn clone_override_delegates_to_builtin_clone() {
    let calls = Rc::new(Cell::new(0));
    let had_parent = Rc::new(Cell::new(false));
    let (counter, flag) = (Rc::clone(&calls), Rc::clone(&had_parent));
    let kind = Entity::base_type().extend(Extension::named("Counted").override_with(
        "clone",
        move |entity: &Entity, parent: &Parent<Entity>, args: &[Value]| {
            counter.set(counter.get() + 1);
            flag.set(parent.exists());
            parent.call(entity, args)
        },
    ));
    let entity = Entity::with_type(kind, Some(json!({ "id": 3 })), false);
    let seen = log();
    entity.subscribe(events::CLONED, listen(&seen, "cloned"));

    let Ok(copy) = entity.duplicate() else {
        panic!("expected the override to hand back a copy");
    };
    assert_eq!(calls.get(), 1);
    assert!(had_parent.get());
    assert!(!copy.same_instance(&entity));
    assert_eq!(copy.type_name(), "Counted");
    assert_eq!(copy.arguments().data, Some(json!({ "id": 3 })));
    assert_eq!(seen.borrow().len(), 1);

    assert!(copy.duplicate().is_ok());
    assert_eq!(calls.get(), 2);
}

#[test]
fn clone_override_must_return_an_instance() {
    let kind = Entity::base_type().extend(Extension::new().operation(
        "clone",
        |_: &Entity, _: &[Value]| Ok(json!("not a copy")),
    ));
    let entity = Entity::with_type(kind, None, false);
    assert!(matches!(
        entity.duplicate(),
        Err(Error::NotAnInstance(name)) if name == "clone"
    ));
}

// ── Pre-extend hook ──────────────────────────────────────────────

#[test]
fn pre_extend_hook_rewrites_and_is_inherited() {
    let root = Entity::base_type()
        .with_pre_extend(|extension: Extension<Entity>| extension.value("stamped", json!(true)));
    let child = root.extend(Extension::named("Child"));
    let grandchild = child.extend(Extension::named("Grandchild"));

    assert_eq!(child.value("stamped"), Some(&json!(true)));
    assert_eq!(grandchild.value("stamped"), Some(&json!(true)));
}

// ── Collections ──────────────────────────────────────────────────

#[test]
fn collection_types_extend_with_collection_receivers() {
    let kind = Collection::<Document>::base_type().extend(Extension::named("Todos").operation(
        "count",
        |collection: &Collection<Document>, _: &[Value]| Ok(json!(collection.len())),
    ));
    let todos = Collection::<Document>::builder()
        .kind(kind)
        .data(vec![json!({ "title": "a" }), json!({ "title": "b" })])
        .build();

    assert_eq!(todos.type_name(), "Todos");
    assert_eq!(todos.invoke("count", &[]).ok().and_then(Output::into_value), Some(json!(2)));
}

#[test]
fn collection_type_derives_from_base() {
    let kind = Collection::<Document>::base_type();
    assert_eq!(kind.name(), COLLECTION_TYPE_NAME);
    for name in ["clone", "resolve", "unfinalize", "read", "update", "end", "len"] {
        assert!(kind.has_operation(name), "missing {name}");
    }

    let todos = Collection::<Document>::new(Some(vec![json!({ "title": "a" })]));
    assert_eq!(todos.invoke("len", &[]).ok().and_then(Output::into_value), Some(json!(1)));
    todos.invoke("resolve", &[json!("ok")]).ok();
    assert!(todos.succeeded());
}

#[test]
fn collection_clone_override_reaches_collection_clone() {
    let kind = Collection::<Document>::base_type().extend(Extension::named("Tagged").override_with(
        "clone",
        |collection: &Collection<Document>, parent: &Parent<Collection<Document>>, args: &[Value]| {
            let copy = parent
                .call(collection, args)?
                .into_instance()
                .ok_or_else(|| Error::NotAnInstance("clone".to_string()))?;
            copy.select(true)?;
            Ok(Output::Instance(copy))
        },
    ));
    let todos = Collection::<Document>::builder()
        .kind(kind)
        .data(vec![json!({ "title": "a" }), json!({ "title": "b" })])
        .build();

    let Ok(copy) = todos.duplicate() else {
        panic!("expected a copy");
    };
    assert_eq!(copy.type_name(), "Tagged");
    assert_eq!(copy.data(), todos.data());
    assert!(copy.all_selected());
    assert!(todos.none_selected());
}
