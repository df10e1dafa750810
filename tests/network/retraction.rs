//! Integration tests for retraction
//!
//! Removing an entity removes exactly the matches built on it, and a
//! second removal is refused without touching the network.

use reticle_engine::RuleSpec;
use reticle_foundation::{ErrorKind, Value};

use crate::fixtures::{Abc, hashed, joined, pattern};

#[test]
fn retraction_removes_only_dependent_activations() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), hashed(b, 0)]))
        .unwrap();
    let a1 = abc.assert(a, 1);
    let a2 = abc.assert(a, 2);
    let b1 = abc.assert(b, 1);
    let b2 = abc.assert(b, 2);

    abc.engine.retract(a1).unwrap();
    assert_eq!(
        abc.engine.agenda().tuples(rule),
        vec![vec![Some(a2), Some(b2)]]
    );
    assert!(abc.engine.retract(b1).is_ok());
    assert_eq!(abc.engine.agenda().len(), 1);
}

#[test]
fn retracting_twice_is_refused() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    abc.engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    let fa = abc.assert(a, 1);
    abc.assert(b, 1);

    abc.engine.retract(fa).unwrap();
    let after = abc.engine.stats();
    let err = abc.engine.retract(fa).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::EntityNotFound(_)));
    assert_eq!(abc.engine.stats(), after);
}

#[test]
fn stale_references_do_not_hit_reused_slots() {
    let mut abc = Abc::new();
    let a = abc.a;
    let old = abc.assert(a, 1);
    abc.engine.retract(old).unwrap();
    let new = abc.assert(a, 2);
    assert_eq!(old.id.index, new.id.index);
    assert!(abc.engine.retract(old).is_err());
    assert!(abc.engine.working_memory().contains(new));
}

#[test]
fn modify_fact_moves_matches_to_the_new_fact() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    let fa = abc.assert(a, 1);
    let fb = abc.assert(b, 2);
    assert!(abc.engine.agenda().is_empty());

    let moved = abc
        .engine
        .modify_fact(fa, &[("x", Value::Int(2))])
        .unwrap()
        .unwrap();
    assert_ne!(moved, fa);
    assert!(!abc.engine.working_memory().contains(fa));
    assert_eq!(
        abc.engine.agenda().tuples(rule),
        vec![vec![Some(moved), Some(fb)]]
    );
}

#[test]
fn retracting_a_blocker_during_a_batch_leaves_no_stale_rows() {
    let mut abc = Abc::new();
    let (a, c) = (abc.a, abc.c);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("lonely").when(vec![pattern(a), joined(c, 0).negate()]))
        .unwrap();
    let fa = abc.assert(a, 1);
    let fc = abc.assert(c, 1);

    abc.engine.delay_pattern_matching(true).unwrap();
    abc.engine.retract(fa).unwrap();
    abc.engine.retract(fc).unwrap();
    abc.engine.delay_pattern_matching(false).unwrap();

    assert!(abc.engine.agenda().for_rule(rule).is_empty());
    let stats = abc.engine.stats();
    assert_eq!((stats.alpha_matches, stats.beta_matches, stats.garbage), (0, 0, 0));
}
