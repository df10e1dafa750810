//! Integration tests for `not` and `exists` conditions
//!
//! Tests blocking, unblocking, and the placeholder row of a leading
//! blocking condition.

use reticle_engine::{EngineConfig, Expr, RuleSpec};

use crate::fixtures::{Abc, joined, pattern, x};

// =============================================================================
// Not
// =============================================================================

#[test]
fn not_blocks_while_any_match_exists() {
    let mut abc = Abc::new();
    let (a, c) = (abc.a, abc.c);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("lonely").when(vec![pattern(a), joined(c, 0).negate()]))
        .unwrap();

    let fa = abc.assert(a, 1);
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![Some(fa), None]]);

    let c1 = abc.assert(c, 1);
    abc.assert(c, 2);
    assert!(abc.engine.agenda().is_empty());

    abc.engine.retract(c1).unwrap();
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![Some(fa), None]]);
}

#[test]
fn not_unblocks_only_after_the_last_blocker_leaves() {
    let mut abc = Abc::new();
    let (a, c) = (abc.a, abc.c);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("lonely").when(vec![
            pattern(a),
            pattern(c).negate(),
        ]))
        .unwrap();

    abc.assert(a, 1);
    let c1 = abc.assert(c, 1);
    let c2 = abc.assert(c, 2);
    assert!(abc.engine.agenda().for_rule(rule).is_empty());

    abc.engine.retract(c1).unwrap();
    assert!(abc.engine.agenda().for_rule(rule).is_empty());
    abc.engine.retract(c2).unwrap();
    assert_eq!(abc.engine.agenda().for_rule(rule).len(), 1);
}

#[test]
fn leading_not_is_satisfied_by_an_empty_memory() {
    let mut abc = Abc::new();
    let c = abc.c;
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("nothing").when(vec![pattern(c).negate()]))
        .unwrap();
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![None]]);

    let fc = abc.assert(c, 5);
    assert!(abc.engine.agenda().is_empty());
    abc.engine.retract(fc).unwrap();
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![None]]);
}

// =============================================================================
// Exists
// =============================================================================

#[test]
fn exists_activates_once_regardless_of_support_count() {
    let mut abc = Abc::with_config(EngineConfig::new().with_fact_duplication(true));
    let (a, b) = (abc.a, abc.b);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("some").when(vec![pattern(a), joined(b, 0).existential()]))
        .unwrap();

    let fa = abc.assert(a, 3);
    assert!(abc.engine.agenda().is_empty());

    let supports: Vec<_> = (0..4).map(|_| abc.assert(b, 3)).collect();
    let other = abc.assert(b, 4);
    abc.engine.retract(other).unwrap();
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![Some(fa), None]]);

    for (i, support) in supports.iter().enumerate() {
        abc.engine.retract(*support).unwrap();
        let expected = usize::from(i + 1 < supports.len());
        assert_eq!(abc.engine.agenda().for_rule(rule).len(), expected);
    }
}

#[test]
fn exists_survives_partial_support_loss() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("some").when(vec![pattern(a), pattern(b).existential()]))
        .unwrap();

    abc.assert(a, 0);
    let b1 = abc.assert(b, 1);
    let b2 = abc.assert(b, 2);
    let b3 = abc.assert(b, 3);
    assert_eq!(abc.engine.agenda().for_rule(rule).len(), 1);
    let basis = abc.engine.agenda().for_rule(rule)[0].basis;

    abc.engine.retract(b2).unwrap();
    abc.engine.retract(b1).unwrap();
    assert_eq!(abc.engine.agenda().for_rule(rule)[0].basis, basis);

    abc.engine.retract(b3).unwrap();
    assert!(abc.engine.agenda().is_empty());
}

#[test]
fn leading_exists_tracks_the_whole_memory() {
    let mut abc = Abc::new();
    let b = abc.b;
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("any-b").when(vec![pattern(b).existential()]))
        .unwrap();
    assert!(abc.engine.agenda().is_empty());

    let b1 = abc.assert(b, 1);
    let b2 = abc.assert(b, 2);
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![None]]);
    abc.engine.retract(b1).unwrap();
    assert_eq!(abc.engine.agenda().for_rule(rule).len(), 1);
    abc.engine.retract(b2).unwrap();
    assert!(abc.engine.agenda().is_empty());
}

/// `(> <pattern 0>.x 5)`, evaluated on the left row alone.
fn left_x_above_five() -> Expr {
    Expr::call(">", vec![Expr::left(0, x()), Expr::constant(5)]).unwrap()
}

#[test]
fn exists_applies_its_secondary_test_from_either_side() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("some-big").when(vec![
            pattern(a),
            pattern(b).existential().with_secondary(left_x_above_five()),
        ]))
        .unwrap();

    // Right entry: the b arrives after the a rows.
    let small = abc.assert(a, 3);
    let big = abc.assert(a, 8);
    abc.assert(b, 1);
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![Some(big), None]]);

    // Left entry: the a arrives after the b.
    let later = abc.assert(a, 9);
    abc.assert(a, 2);
    let mut tuples = abc.engine.agenda().tuples(rule);
    tuples.sort();
    let mut expected = vec![vec![Some(big), None], vec![Some(later), None]];
    expected.sort();
    assert_eq!(tuples, expected);
    assert!(tuples.iter().all(|t| t[0] != Some(small)));
}

#[test]
fn exists_with_a_failing_secondary_never_activates() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    abc.engine
        .add_rule(&RuleSpec::new("never").when(vec![
            pattern(a),
            joined(b, 0).existential().with_secondary(Expr::constant(false)),
        ]))
        .unwrap();
    abc.engine
        .add_rule(&RuleSpec::new("never-first").when(vec![
            pattern(b).existential().with_secondary(Expr::constant(false)),
        ]))
        .unwrap();

    abc.assert(a, 1);
    let b1 = abc.assert(b, 1);
    assert!(abc.engine.agenda().is_empty());
    abc.engine.retract(b1).unwrap();
    abc.assert(b, 1);
    assert!(abc.engine.agenda().is_empty());
}

#[test]
fn exists_secondary_holds_for_rules_added_late() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    abc.assert(a, 3);
    let big = abc.assert(a, 8);
    abc.assert(b, 1);

    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("some-big").when(vec![
            pattern(a),
            pattern(b).existential().with_secondary(left_x_above_five()),
        ]))
        .unwrap();
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![Some(big), None]]);
}
