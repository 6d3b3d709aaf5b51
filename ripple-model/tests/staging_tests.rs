mod common;

use common::{listen, log, rows};
use pretty_assertions::assert_eq;
use ripple_model::{events, AddInput, Added, Collection, Document, Error, Member, PayloadSource};
use serde_json::{json, Value};
use std::rc::Rc;

fn numbers(values: &[i64]) -> Collection<Document> {
    Collection::new(Some(rows(values)))
}

// ── Add ──────────────────────────────────────────────────────────

#[test]
fn add_null_then_finalize_appends_one_blank_item() {
    let collection = numbers(&[1, 2]);
    let added = collection.add(Value::Null).ok();
    assert!(matches!(added, Some(Added::One(_))));
    assert_eq!(collection.staged().len(), 1);

    collection.finalize(Value::Null);
    assert_eq!(collection.len(), 3);
    assert_eq!(collection.data()[2], json!({}));
    assert!(collection.staged().is_empty());
}

#[test]
fn add_none_is_the_same_as_null() {
    let collection = numbers(&[]);
    let added = collection.add(None::<Value>).ok().map(Added::into_vec);
    assert_eq!(
        added.map(|members| members.iter().map(Member::payload).collect::<Vec<_>>()),
        Some(vec![json!({})])
    );
}

#[test]
fn add_sequence_returns_many_bound_to_future_slots() {
    let collection = numbers(&[1, 2]);
    let Ok(Added::Many(members)) = collection.add(json!([{ "a": 3 }, { "a": 4 }])) else {
        panic!("expected a sequence of staged members");
    };
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].slot(), 2);
    assert_eq!(members[1].slot(), 3);
    assert!(members[0].owner().is_some_and(|owner| owner.same_instance(&collection)));
    assert_eq!(collection.len(), 2);
}

#[test]
fn add_object_returns_one() {
    let collection = numbers(&[]);
    let added = collection.add(json!({ "a": 1 }));
    match added {
        Ok(Added::One(member)) => assert_eq!(member.payload(), json!({ "a": 1 })),
        other => panic!("expected a single staged member, got {other:?}"),
    }
}

#[test]
fn add_scalar_is_rejected() {
    let collection = numbers(&[]);
    assert!(matches!(collection.add(json!(5)), Err(Error::InvalidAddition(_))));
    assert!(matches!(collection.add(json!("x")), Err(Error::InvalidAddition(_))));
    assert!(collection.staged().is_empty());
}

#[test]
fn add_reuses_wrapped_members_and_models() {
    let collection = numbers(&[]);
    let member = Member::<Document>::from_payload(json!({ "a": 1 }));
    let staged = collection.add(member.clone()).ok().map(Added::into_vec);
    assert!(staged.is_some_and(|staged| staged[0].same_as(&member)));

    let model = Document::new(json!({ "a": 2 }));
    let staged = collection.add(AddInput::Model(model)).ok();
    assert_eq!(staged.map(|added| added.len()), Some(1));
}

#[test]
fn add_container_uses_its_payload() {
    let collection = numbers(&[]);
    let container: Rc<dyn PayloadSource> = Rc::new(Document::new(json!({ "a": 8 })));
    collection.add(container).ok();
    assert_eq!(
        collection.staged().iter().map(Member::payload).collect::<Vec<_>>(),
        rows(&[8])
    );
}

#[test]
fn add_collection_flattens_its_members() {
    let collection = numbers(&[1]);
    let other = numbers(&[2, 3]);
    let added = collection.add(other.clone()).ok();
    assert!(matches!(&added, Some(Added::Many(members)) if members.len() == 2));

    collection.finalize(Value::Null);
    assert_eq!(collection.data(), rows(&[1, 2, 3]));
}

#[test]
fn add_collection_leaves_source_members_with_their_owner() {
    let target = numbers(&[]);
    let source = numbers(&[1, 2]);
    let Ok(Added::Many(members)) = target.add(source.clone()) else {
        panic!("expected the source members to be staged");
    };
    assert!(members[0].owner().is_some_and(|owner| owner.same_instance(&source)));
    assert_eq!(members[1].slot(), 1);

    source.select((0, true)).ok();
    assert_eq!(source.selected_count(), 1);
    assert_eq!(source.selection(), vec![true, false]);
    assert!(target.selection().is_empty());
}

#[test]
fn add_member_keeps_its_owner() {
    let source = numbers(&[1, 2]);
    let member = source.get()[1].clone();
    let target = numbers(&[7, 8, 9]);
    target.add(member.clone()).ok();

    assert!(member.owner().is_some_and(|owner| owner.same_instance(&source)));
    assert_eq!(member.slot(), 1);
    member.select(true, false);
    assert_eq!(source.selection(), vec![false, true]);
}

#[test]
fn add_overwrites_previous_staging() {
    let collection = numbers(&[1]);
    collection.add(json!([{ "a": 2 }, { "a": 3 }])).ok();
    collection.add(json!({ "a": 4 })).ok();
    assert_eq!(collection.staged().len(), 1);

    collection.finalize(Value::Null);
    assert_eq!(collection.data(), rows(&[1, 4]));
}

// ── Finalize ─────────────────────────────────────────────────────

#[test]
fn finalize_publishes_and_resets_loaded() {
    let collection = numbers(&[1]);
    assert!(collection.is_loaded());
    let calls = log();
    collection.subscribe(events::FINALIZED, listen(&calls, "finalized"));

    collection.add(Value::Null).ok();
    collection.finalize(json!("saved"));

    assert_eq!(*calls.borrow(), vec![r#"finalized:"saved""#.to_string()]);
    assert!(!collection.is_loaded());
}

#[test]
fn finalize_without_staged_items_does_nothing() {
    let collection = numbers(&[1]);
    let calls = log();
    collection.subscribe(events::FINALIZED, listen(&calls, "finalized"));

    collection.finalize(json!("noop"));
    assert!(calls.borrow().is_empty());
    assert!(collection.is_loaded());
    assert_eq!(collection.len(), 1);
}

#[test]
fn staged_member_keeps_identity_after_finalize() {
    let collection = numbers(&[1]);
    let Ok(Added::One(member)) = collection.add(json!({ "a": 2 })) else {
        panic!("expected a single staged member");
    };
    collection.finalize(Value::Null);

    let merged = collection.get();
    assert!(merged[1].same_as(&member));
    member.select(true, false);
    assert_eq!(collection.selection(), vec![false, true]);
}
