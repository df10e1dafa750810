//! Integration tests for delayed pattern matching
//!
//! While delayed, working memory changes at once and the network catches
//! up when the delay is lifted.

use reticle_engine::{Condition, ObjectPattern, PendingAction, RuleSpec, SlotPattern};
use reticle_foundation::{ErrorKind, Type, Value};
use reticle_storage::{SlotKey, SlotSchema};

use crate::fixtures::{World, joined, pattern};

#[test]
fn network_catches_up_when_the_delay_lifts() {
    let mut world = World::new();
    let (a, b) = (world.a, world.b);
    let rule = world
        .engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();

    world.engine.delay_pattern_matching(true).unwrap();
    let fa = world.assert(a, 1);
    let fb = world.assert(b, 1);
    assert!(world.engine.working_memory().contains(fa));
    assert!(world.engine.agenda().is_empty());
    assert_eq!(
        world.engine.pending_actions().iter().cloned().collect::<Vec<_>>(),
        vec![PendingAction::Assert(fa), PendingAction::Assert(fb)]
    );

    world.engine.delay_pattern_matching(false).unwrap();
    assert!(world.engine.pending_actions().is_empty());
    assert_eq!(world.engine.agenda().tuples(rule), vec![vec![Some(fa), Some(fb)]]);
}

#[test]
fn assert_then_retract_cancels_out() {
    let mut world = World::new();
    let a = world.a;
    world
        .engine
        .add_rule(&RuleSpec::new("each").when(vec![pattern(a)]))
        .unwrap();
    world.engine.delay_pattern_matching(true).unwrap();
    let fa = world.assert(a, 1);
    world.engine.retract(fa).unwrap();
    assert!(world.engine.pending_actions().is_empty());
    world.engine.delay_pattern_matching(false).unwrap();
    assert!(world.engine.agenda().is_empty());
}

#[test]
fn retractions_run_before_asserts() {
    let mut world = World::new();
    let (a, c) = (world.a, world.c);
    let rule = world
        .engine
        .add_rule(&RuleSpec::new("lonely").when(vec![pattern(a), joined(c, 0).negate()]))
        .unwrap();
    let fc = world.assert(c, 1);

    world.engine.delay_pattern_matching(true).unwrap();
    let fa = world.assert(a, 1);
    world.engine.retract(fc).unwrap();
    let queued: Vec<_> = world.engine.pending_actions().iter().cloned().collect();
    assert_eq!(queued, vec![PendingAction::Retract(fc), PendingAction::Assert(fa)]);

    world.engine.delay_pattern_matching(false).unwrap();
    assert_eq!(world.engine.agenda().tuples(rule), vec![vec![Some(fa), None]]);
}

#[test]
fn structural_changes_are_refused_while_delayed() {
    let mut world = World::new();
    let a = world.a;
    let rule = world
        .engine
        .add_rule(&RuleSpec::new("each").when(vec![pattern(a)]))
        .unwrap();
    world.engine.delay_pattern_matching(true).unwrap();

    let refused = |kind: &ErrorKind| matches!(kind, ErrorKind::JoinOperationInProgress(_));
    let add = world
        .engine
        .add_rule(&RuleSpec::new("other").when(vec![pattern(a)]))
        .unwrap_err();
    assert!(refused(&add.kind));
    assert!(refused(&world.engine.remove_rule(rule).unwrap_err().kind));
    assert!(refused(&world.engine.reset().unwrap_err().kind));

    world.engine.delay_pattern_matching(false).unwrap();
    world.engine.remove_rule(rule).unwrap();
}

#[test]
fn delayed_modifies_merge_their_slots() {
    let mut world = World::new();
    let color = world.engine.intern("color");
    let size = world.engine.intern("size");
    let red = world.engine.intern("red");
    let thing = world
        .engine
        .defclass(
            "thing",
            None,
            vec![
                SlotSchema::single(color, Type::Symbol),
                SlotSchema::single(size, Type::Int),
            ],
        )
        .unwrap();
    let rule = world
        .engine
        .add_rule(&RuleSpec::new("red").when(vec![Condition::object(
            ObjectPattern::new(thing).with_slot(SlotPattern::constant(SlotKey::Named(color), red)),
        )]))
        .unwrap();
    let inst = world
        .engine
        .make_instance("t", thing, &[])
        .unwrap()
        .unwrap();

    world.engine.delay_pattern_matching(true).unwrap();
    world
        .engine
        .modify_instance(inst, &[("size", Value::Int(2))])
        .unwrap();
    world
        .engine
        .modify_instance(inst, &[("color", Value::Symbol(red))])
        .unwrap();
    assert_eq!(
        world.engine.pending_actions().iter().cloned().collect::<Vec<_>>(),
        vec![PendingAction::Modify(
            inst,
            vec![SlotKey::Named(size), SlotKey::Named(color)]
        )]
    );
    world.engine.delay_pattern_matching(false).unwrap();
    assert_eq!(world.engine.agenda().tuples(rule), vec![vec![Some(inst)]]);
}
