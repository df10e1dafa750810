//! Integration tests for classes and instances
//!
//! Tests inheritance, naming, slot updates, and pseudo slots.

use reticle_foundation::{EntityKind, ErrorKind, Type, Value};
use reticle_storage::{ClassId, PatternEntity, SlotKey, SlotSchema, WorkingMemory};

fn shapes() -> (WorkingMemory, ClassId, ClassId) {
    let mut wm = WorkingMemory::new();
    let color = wm.intern("color");
    let radius = wm.intern("radius");
    let shape = wm
        .defclass("shape", None, vec![SlotSchema::single(color, Type::Symbol)])
        .unwrap();
    let circle = wm
        .defclass(
            "circle",
            Some("shape"),
            vec![SlotSchema::single(radius, Type::Number).with_default(Value::Int(1))],
        )
        .unwrap();
    (wm, shape, circle)
}

// =============================================================================
// Classes
// =============================================================================

#[test]
fn subclasses_inherit_parent_slots_first() {
    let (wm, _, circle) = shapes();
    let layout = &wm.class(circle).unwrap().layout;
    let color = wm.interner().get("color").unwrap();
    assert_eq!(layout.position(color), Some(0));
    assert_eq!(layout.len(), 2);
}

#[test]
fn subclass_queries() {
    let (wm, shape, circle) = shapes();
    assert!(wm.is_subclass(circle, shape));
    assert!(wm.is_subclass(shape, shape));
    assert!(!wm.is_subclass(shape, circle));
    assert_eq!(wm.subclasses(shape), vec![shape, circle]);
}

#[test]
fn unknown_parent_is_rejected() {
    let mut wm = WorkingMemory::new();
    let err = wm.defclass("orphan", Some("ghost"), Vec::new()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownClass(_)));
}

// =============================================================================
// Instances
// =============================================================================

#[test]
fn instances_are_found_by_name() {
    let (mut wm, _, circle) = shapes();
    let name = wm.intern("c1");
    let red = wm.intern("red");
    let color = wm.intern("color");
    let inst = wm
        .insert_instance(name, circle, &[(color, Value::Symbol(red))])
        .unwrap();
    assert_eq!(wm.instance_by_name(name), Some(inst));
    assert_eq!(wm.instance_count(), 1);

    let entity = wm.entity(inst).unwrap();
    assert_eq!(entity.slot_value(SlotKey::InstanceName), Some(&Value::Symbol(name)));
    let circle_sym = wm.interner().get("circle").unwrap();
    assert_eq!(entity.slot_value(SlotKey::Class), Some(&Value::Symbol(circle_sym)));
    assert_eq!(entity.slot_value(SlotKey::Position(0)), None);
}

#[test]
fn instance_names_are_unique() {
    let (mut wm, shape, _) = shapes();
    let name = wm.intern("s");
    wm.insert_instance(name, shape, &[]).unwrap();
    let err = wm.insert_instance(name, shape, &[]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateDefinition(_)));
}

#[test]
fn update_reports_only_changed_slots() {
    let (mut wm, _, circle) = shapes();
    let name = wm.intern("c");
    let color = wm.intern("color");
    let radius = wm.intern("radius");
    let blue = wm.intern("blue");
    let inst = wm.insert_instance(name, circle, &[]).unwrap();
    let before = wm.entity(inst).unwrap().time_tag();

    let changed = wm
        .update_instance(
            inst.id,
            &[(color, Value::Symbol(blue)), (radius, Value::Int(1))],
        )
        .unwrap();
    assert_eq!(changed, vec![color]);
    assert!(wm.entity(inst).unwrap().time_tag() > before);

    let tag = wm.entity(inst).unwrap().time_tag();
    let changed = wm.update_instance(inst.id, &[(color, Value::Symbol(blue))]).unwrap();
    assert!(changed.is_empty());
    assert_eq!(wm.entity(inst).unwrap().time_tag(), tag);
}

#[test]
fn update_checks_slot_types() {
    let (mut wm, _, circle) = shapes();
    let name = wm.intern("c");
    let radius = wm.intern("radius");
    let inst = wm.insert_instance(name, circle, &[]).unwrap();
    let err = wm
        .update_instance(inst.id, &[(radius, Value::from("wide"))])
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidSlotValue { .. }));
}

#[test]
fn removal_frees_the_name() {
    let (mut wm, shape, _) = shapes();
    let name = wm.intern("s");
    let inst = wm.insert_instance(name, shape, &[]).unwrap();
    wm.remove_instance(inst.id).unwrap();
    assert_eq!(wm.instance_by_name(name), None);
    assert!(wm.live_entities(EntityKind::Instance).is_empty());
    wm.insert_instance(name, shape, &[]).unwrap();
}
