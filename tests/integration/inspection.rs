//! Integration tests for network inspection
//!
//! Tests snapshots, watch events, error trails, and match counts.

use std::collections::HashSet;

use reticle_engine::{
    Condition, Expr, FactPattern, FieldTest, RuleSpec, SlotPattern, Snapshot, TraceEvent, WatchItem,
};
use reticle_storage::SlotKey;
use reticle_foundation::EntityRef;

use crate::fixtures::{World, joined, pattern, x};

fn two_rules() -> World {
    let mut world = World::new();
    let (a, b, c) = (world.a, world.b, world.c);
    world
        .engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    world
        .engine
        .add_rule(
            &RuleSpec::new("pair-without-c")
                .with_salience(5)
                .when(vec![pattern(a), joined(b, 0), joined(c, 0).negate()]),
        )
        .unwrap();
    world
}

// =============================================================================
// Snapshot
// =============================================================================

#[test]
fn snapshot_covers_every_join_once() {
    let world = two_rules();
    let snapshot = Snapshot::capture(&world.engine);

    assert_eq!(snapshot.joins.len(), world.engine.stats().joins);
    assert_eq!(snapshot.patterns.len(), world.engine.stats().patterns);
    let names: Vec<_> = snapshot.rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["pair", "pair-without-c"]);
    assert_eq!(snapshot.rules[1].salience, 5);

    let ids: HashSet<u32> = snapshot.joins.iter().map(|j| j.id).collect();
    assert_eq!(ids.len(), snapshot.joins.len());
    for rule in &snapshot.rules {
        assert_eq!(rule.terminals.len(), 1);
        let terminal = &snapshot.joins[rule.terminals[0] as usize];
        assert_eq!(terminal.rule, Some(rule.id));
        assert!(terminal.links.is_empty());
    }
}

#[test]
fn snapshot_links_and_patterns_agree_with_joins() {
    let world = two_rules();
    let snapshot = Snapshot::capture(&world.engine);

    for link in &snapshot.links {
        assert!(snapshot.joins[link.from as usize].links.contains(&link.id));
        let to = &snapshot.joins[link.to as usize];
        if link.enter_right {
            assert_eq!(to.right_join, Some(link.from));
        } else {
            assert_eq!(to.last_level, Some(link.from));
        }
    }
    for pattern in &snapshot.patterns {
        assert!(!pattern.object);
        for join in &pattern.entry_joins {
            assert_eq!(snapshot.joins[*join as usize].right_pattern, Some(pattern.id));
        }
    }
    let negated: Vec<_> = snapshot.joins.iter().filter(|j| j.negated).collect();
    assert_eq!(negated.len(), 1);
    assert!(negated[0].network_test.is_some());
}

#[test]
fn snapshot_ignores_partial_matches() {
    let mut world = two_rules();
    let before = Snapshot::capture(&world.engine);
    let (a, b) = (world.a, world.b);
    world.assert(a, 1);
    world.assert(b, 1);
    assert_eq!(Snapshot::capture(&world.engine), before);
}

// =============================================================================
// Watch Events
// =============================================================================

#[test]
fn tracer_records_entity_and_agenda_churn() {
    let mut world = two_rules();
    let (a, b) = (world.a, world.b);
    let fa = world.assert(a, 1);
    let fb = world.assert(b, 1);
    world.engine.retract(fa).unwrap();

    let buffer = world.engine.tracer().buffer();
    assert_eq!(buffer.by_event_type("rule-added").len(), 2);
    assert_eq!(buffer.by_event_type("fact-asserted").len(), 2);
    assert_eq!(buffer.by_event_type("fact-retracted").len(), 1);
    let added = buffer.by_event_type("activation-added");
    assert_eq!(added.len(), 2);
    for record in &added {
        let TraceEvent::ActivationAdded { entities, .. } = &record.event else {
            panic!("unexpected event {:?}", record.event);
        };
        assert_eq!(&entities[..2], &[Some(fa), Some(fb)]);
    }
    assert_eq!(buffer.by_event_type("activation-removed").len(), 2);
}

#[test]
fn each_top_level_call_is_one_operation() {
    let mut world = two_rules();
    let (a, b) = (world.a, world.b);
    world.assert(a, 1);
    world.assert(b, 1);

    let buffer = world.engine.tracer().buffer();
    let Some(last) = buffer.last() else {
        panic!("nothing recorded");
    };
    let events: Vec<_> = buffer
        .records_for_operation(last.operation)
        .into_iter()
        .map(|r| r.event_type())
        .collect();
    assert_eq!(
        events,
        vec!["fact-asserted", "activation-added", "activation-added"]
    );
}

#[test]
fn unwatched_categories_stay_out_of_the_buffer() {
    let mut world = two_rules();
    let (a, b) = (world.a, world.b);
    world.engine.tracer_mut().unwatch(WatchItem::Activations);
    world.engine.tracer_mut().clear();
    world.assert(a, 1);
    world.assert(b, 1);

    let counts = world.engine.tracer().buffer().counts();
    assert_eq!(counts.get("fact-asserted"), Some(&2));
    assert_eq!(counts.get("activation-added"), None);
    assert_eq!(world.engine.agenda().len(), 2);
}

// =============================================================================
// Error Trails
// =============================================================================

fn ratio_rule(world: &mut World) {
    let (a, b) = (world.a, world.b);
    let ratio = Expr::call("/", vec![Expr::left(0, x()), Expr::right(0, x())]).unwrap();
    let positive = Expr::call(">", vec![ratio, Expr::constant(0i64)]).unwrap();
    world
        .engine
        .add_rule(&RuleSpec::new("ratio").when(vec![pattern(a), pattern(b).with_test(positive)]))
        .unwrap();
}

#[test]
fn failing_join_tests_leave_a_trail() {
    let mut world = World::new();
    ratio_rule(&mut world);
    let ratio = world.engine.intern("ratio");
    let (a, b) = (world.a, world.b);
    world.assert(a, 1);
    world.assert(b, 0);
    world.assert(b, 2);

    assert_eq!(world.engine.agenda().len(), 1);
    let trails = world.engine.error_trails();
    assert_eq!(trails.len(), 1);
    assert!(trails[0].message.contains("division by zero"));
    assert_eq!(trails[0].entity, None);
    assert_eq!(trails[0].rule_names(), vec![ratio]);

    let events = world.engine.tracer().buffer().by_event_type("evaluation-error");
    assert_eq!(events.len(), 1);
    let TraceEvent::EvaluationError { rules, .. } = &events[0].event else {
        panic!("unexpected event {:?}", events[0].event);
    };
    assert_eq!(rules, &vec![ratio]);

    world.engine.clear_error_trails();
    assert!(world.engine.error_trails().is_empty());
}

#[test]
fn trails_keep_only_the_most_recent_failures() {
    let mut world = World::new();
    ratio_rule(&mut world);
    let (a, b) = (world.a, world.b);
    world.assert(b, 0);
    for x in 0..200 {
        world.assert(a, x);
    }
    let trails = world.engine.error_trails();
    assert!(!trails.is_empty());
    assert!(trails.len() < 200);
}

/// `a` facts whose `x` divides 10 into a positive number.
fn inverse_pattern(world: &World) -> Condition {
    let inverse = Expr::call("/", vec![Expr::constant(10i64), Expr::field(x())]).unwrap();
    let positive = Expr::call(">", vec![inverse, Expr::constant(0i64)]).unwrap();
    Condition::fact(
        FactPattern::new(world.a).with_slot(SlotPattern::whole(SlotKey::Position(0), FieldTest::Test(positive))),
    )
}

#[test]
fn failing_pattern_tests_name_the_entity_slot_and_every_rule() {
    let mut world = World::new();
    for name in ["inverse", "inverse-too"] {
        let condition = inverse_pattern(&world);
        world
            .engine
            .add_rule(&RuleSpec::new(name).when(vec![condition]))
            .unwrap();
    }
    let a = world.a;
    world
        .engine
        .add_rule(&RuleSpec::new("any-a").when(vec![pattern(a)]))
        .unwrap();
    let b = world.b;
    world
        .engine
        .add_rule(&RuleSpec::new("any-b").when(vec![pattern(b)]))
        .unwrap();

    let zero = world.assert(a, 0);
    assert_eq!(world.engine.agenda().len(), 1);
    let trails = world.engine.error_trails();
    assert_eq!(trails.len(), 1);
    let trail = &trails[0];
    assert!(trail.message.contains("division by zero"));
    assert_eq!(trail.entity, Some(zero));
    assert_eq!(trail.slot, Some(SlotKey::Position(0)));

    let mut named = trail.rule_names();
    named.sort();
    let mut expected = vec![world.engine.intern("inverse"), world.engine.intern("inverse-too")];
    expected.sort();
    assert_eq!(named, expected);

    let events = world.engine.tracer().buffer().by_event_type("evaluation-error");
    let TraceEvent::EvaluationError { entity, .. } = &events[0].event else {
        panic!("unexpected event {:?}", events[0].event);
    };
    assert_eq!(*entity, Some(zero));

    world.assert(a, 2);
    assert_eq!(world.engine.error_trails().len(), 1);
    assert_eq!(world.engine.agenda().len(), 4);
}

// =============================================================================
// Match Counts
// =============================================================================

#[test]
fn matches_reports_each_level() {
    let mut world = two_rules();
    let pair = world.engine.rule_id("pair").unwrap();
    let (a, b) = (world.a, world.b);
    world.assert(a, 1);
    world.assert(a, 2);
    world.assert(b, 1);
    world.assert(b, 3);

    let matches = world.engine.matches(pair).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].patterns, vec![2, 2]);
    assert_eq!(matches[0].partial, vec![2, 1]);
    assert_eq!(matches[0].activations, 1);
}

#[test]
fn matches_of_a_removed_rule_fail() {
    let mut world = two_rules();
    let pair = world.engine.rule_id("pair").unwrap();
    world.engine.remove_rule(pair).unwrap();
    assert!(world.engine.matches(pair).is_err());
    assert_eq!(world.engine.rule_id("pair"), None);
    assert_eq!(world.engine.rule_count(), 1);
}

#[test]
fn activation_entities_follow_condition_order() {
    let mut world = two_rules();
    let without_c = world.engine.rule_id("pair-without-c").unwrap();
    let (a, b) = (world.a, world.b);
    let fa = world.assert(a, 7);
    let fb = world.assert(b, 7);

    let top = world.engine.agenda().peek().unwrap().clone();
    assert_eq!(top.rule, without_c);
    let expected: Vec<Option<EntityRef>> = vec![Some(fa), Some(fb), None];
    assert_eq!(world.engine.activation_entities(top.basis), Some(expected));
}

#[test]
fn stats_display_fits_on_one_line() {
    let world = two_rules();
    let text = world.engine.stats().to_string();
    assert!(text.starts_with("Joins: "));
    assert!(!text.contains('\n'));
}
