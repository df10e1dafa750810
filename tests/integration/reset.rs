//! Integration tests for reset
//!
//! Reset empties working memory and every memory of the network, then
//! re-primes the rules that start with `not` or `exists`.

use reticle_engine::{EngineConfig, RuleSpec};
use reticle_foundation::Value;

use crate::fixtures::{World, joined, pattern};

#[test]
fn reset_returns_the_network_to_its_primed_state() {
    let mut world = World::new();
    let (a, b, c) = (world.a, world.b, world.c);
    world
        .engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    let quiet = world
        .engine
        .add_rule(&RuleSpec::new("quiet").when(vec![pattern(c).negate()]))
        .unwrap();
    let primed = world.engine.stats();
    assert_eq!(world.engine.agenda().tuples(quiet), vec![vec![None]]);

    for x in 0..4 {
        world.assert(a, x);
        world.assert(b, x);
        world.assert(c, x);
    }
    assert!(world.engine.agenda().tuples(quiet).is_empty());
    assert_ne!(world.engine.stats(), primed);

    world.engine.reset().unwrap();
    assert_eq!(world.engine.working_memory().fact_count(), 0);
    assert_eq!(world.engine.stats(), primed);
    assert_eq!(world.engine.agenda().len(), 1);
    assert_eq!(world.engine.agenda().tuples(quiet), vec![vec![None]]);
}

#[test]
fn exists_rules_wait_for_their_first_match_again() {
    let mut world = World::new();
    let (a, c) = (world.a, world.c);
    let any_c = world
        .engine
        .add_rule(&RuleSpec::new("any-c").when(vec![pattern(c).existential(), pattern(a)]))
        .unwrap();
    world.assert(c, 1);
    let fa = world.assert(a, 1);
    assert_eq!(world.engine.agenda().tuples(any_c), vec![vec![None, Some(fa)]]);

    world.engine.reset().unwrap();
    assert!(world.engine.agenda().is_empty());
    let fa = world.assert(a, 2);
    assert!(world.engine.agenda().is_empty());
    world.assert(c, 2);
    assert_eq!(world.engine.agenda().tuples(any_c), vec![vec![None, Some(fa)]]);
}

#[test]
fn reset_forgets_logical_support() {
    let mut world = World::new();
    let (a, b) = (world.a, world.b);
    let derive = world
        .engine
        .add_rule(&RuleSpec::new("derive").when(vec![pattern(a).logical()]))
        .unwrap();
    world.assert(a, 1);
    let fb = world.fire(derive, |engine, x| {
        engine
            .assert_fact(b, vec![Value::Int(x)])
            .unwrap()
            .unwrap()
    });
    assert!(world.engine.is_logically_supported(fb));

    world.engine.reset().unwrap();
    assert!(!world.engine.is_logically_supported(fb));
    let fb = world.assert(b, 1);
    assert!(!world.engine.is_logically_supported(fb));
}

#[test]
fn without_incremental_reset_rules_see_only_new_facts() {
    let mut world = World::with_config(EngineConfig::debug().with_incremental_reset(false));
    let a = world.a;
    world.assert(a, 1);
    let each = world
        .engine
        .add_rule(&RuleSpec::new("each").when(vec![pattern(a)]))
        .unwrap();
    assert!(world.engine.agenda().is_empty());

    world.engine.reset().unwrap();
    let fa = world.assert(a, 1);
    assert_eq!(world.engine.agenda().tuples(each), vec![vec![Some(fa)]]);
}
