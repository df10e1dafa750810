//! Integration tests for templates and facts
//!
//! Tests slot checking, duplicate detection, and removal.

use reticle_foundation::{EntityKind, ErrorKind, Type, Value};
use reticle_storage::{FactInsert, PatternEntity, SlotKey, SlotSchema, TemplateId, WorkingMemory};

fn point_memory() -> (WorkingMemory, TemplateId) {
    let mut wm = WorkingMemory::new();
    let x = wm.intern("x");
    let y = wm.intern("y");
    let tags = wm.intern("tags");
    let point = wm
        .deftemplate(
            "point",
            vec![
                SlotSchema::single(x, Type::Int),
                SlotSchema::single(y, Type::Int).with_default(Value::Int(0)),
                SlotSchema::multi(tags),
            ],
        )
        .unwrap();
    (wm, point)
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn templates_are_found_by_name() {
    let (wm, point) = point_memory();
    assert_eq!(wm.template_id("point"), Some(point));
    assert_eq!(wm.template_id("line"), None);
    assert_eq!(wm.slot_position(point, "y").unwrap(), 1);
}

#[test]
fn redefining_a_template_fails() {
    let (mut wm, _) = point_memory();
    let err = wm.deftemplate("point", Vec::new()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateDefinition(_)));
}

#[test]
fn unknown_slots_are_rejected() {
    let (wm, point) = point_memory();
    let err = wm.build_fact_values(point, &[("z", Value::Int(1))]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownSlot { .. }));
}

#[test]
fn defaults_fill_missing_slots() {
    let (wm, point) = point_memory();
    let values = wm.build_fact_values(point, &[("x", Value::Int(5))]).unwrap();
    assert_eq!(values[0], Value::Int(5));
    assert_eq!(values[1], Value::Int(0));
    assert_eq!(values[2].value_type(), Type::Multifield);
}

// =============================================================================
// Facts
// =============================================================================

#[test]
fn insert_checks_slot_types() {
    let (mut wm, point) = point_memory();
    let mut values = wm.build_fact_values(point, &[]).unwrap();
    values[0] = Value::from("not a number");
    let err = wm.insert_fact(point, values, false).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidSlotValue { .. }));
}

#[test]
fn insert_checks_arity() {
    let (mut wm, point) = point_memory();
    let err = wm.insert_fact(point, vec![Value::Int(1)], false).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ArityMismatch { .. }));
}

#[test]
fn duplicates_are_detected_unless_allowed() {
    let (mut wm, point) = point_memory();
    let values = wm.build_fact_values(point, &[("x", Value::Int(1))]).unwrap();
    let first = wm.insert_fact(point, values.clone(), false).unwrap();
    let FactInsert::New(fact) = first else {
        panic!("expected a new fact");
    };
    assert_eq!(
        wm.insert_fact(point, values.clone(), false).unwrap(),
        FactInsert::Duplicate(fact)
    );
    assert!(matches!(
        wm.insert_fact(point, values, true).unwrap(),
        FactInsert::New(_)
    ));
    assert_eq!(wm.fact_count(), 2);
}

#[test]
fn removed_facts_disappear() {
    let (mut wm, point) = point_memory();
    let values = wm.build_fact_values(point, &[]).unwrap();
    let fact = wm.insert_fact(point, values.clone(), false).unwrap().entity();
    wm.remove_fact(fact.id).unwrap();
    assert!(wm.fact(fact.id).is_none());
    assert!(!wm.contains(fact));
    assert!(wm.find_duplicate(point, &values).is_none());
    assert!(wm.remove_fact(fact.id).is_err());
}

#[test]
fn facts_expose_slots_by_position_and_name() {
    let (mut wm, point) = point_memory();
    let values = wm
        .build_fact_values(point, &[("x", Value::Int(3)), ("y", Value::Int(4))])
        .unwrap();
    let fact = wm.insert_fact(point, values, false).unwrap().entity();
    let y = wm.interner().get("y").unwrap();
    let entity = wm.entity(fact).unwrap();
    assert_eq!(entity.slot_value(SlotKey::Position(0)), Some(&Value::Int(3)));
    assert_eq!(entity.slot_value(SlotKey::Named(y)), Some(&Value::Int(4)));
    assert!(wm.describe(fact).contains("(x 3)"));
}

#[test]
fn time_tags_increase() {
    let (mut wm, point) = point_memory();
    let mut add = |x: i64| {
        let values = wm.build_fact_values(point, &[("x", Value::Int(x))]).unwrap();
        wm.insert_fact(point, values, false).unwrap().entity()
    };
    let a = add(1);
    let b = add(2);
    let tag = |e| wm.entity(e).unwrap().time_tag();
    assert!(tag(a) < tag(b));
    assert_eq!(wm.live_entities(EntityKind::Fact), vec![a, b]);
}

#[test]
fn clear_removes_facts_but_keeps_templates() {
    let (mut wm, point) = point_memory();
    let values = wm.build_fact_values(point, &[]).unwrap();
    let fact = wm.insert_fact(point, values, false).unwrap().entity();
    wm.clear();
    assert_eq!(wm.fact_count(), 0);
    assert!(!wm.contains(fact));
    assert_eq!(wm.template_id("point"), Some(point));
}
