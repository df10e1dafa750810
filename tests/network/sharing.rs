//! Integration tests for join sharing
//!
//! Rules with a common condition prefix share joins; sharing must never
//! change what any rule matches.

use reticle_engine::{NetworkStats, RuleSpec};

use crate::fixtures::{Abc, hashed, joined, pattern};

fn counts(stats: NetworkStats) -> (usize, usize, usize, usize) {
    (
        stats.joins,
        stats.patterns,
        stats.alpha_matches,
        stats.beta_matches,
    )
}

#[test]
fn common_prefixes_share_joins() {
    let mut abc = Abc::new();
    let (a, b, c) = (abc.a, abc.b, abc.c);
    let first = abc
        .engine
        .add_rule(&RuleSpec::new("first").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    let second = abc
        .engine
        .add_rule(&RuleSpec::new("second").when(vec![pattern(a), joined(b, 0), joined(c, 1)]))
        .unwrap();

    let j1 = abc.engine.rule_joins(first);
    let j2 = abc.engine.rule_joins(second);
    assert_eq!(j1.len(), 3);
    assert_eq!(j2.len(), 4);
    assert_eq!(j1[..2], j2[..2]);
    assert_ne!(j1[2], j2[2]);

    let shared = abc.engine.join_info(j1[1]).unwrap();
    assert_eq!(shared.successors, 2);
    assert!(!shared.first_join);
    assert!(abc.engine.join_info(j1[2]).unwrap().terminal);
    assert!(abc.engine.join_info(j1[0]).unwrap().first_join);
}

#[test]
fn differing_hashes_do_not_share() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let plain = abc
        .engine
        .add_rule(&RuleSpec::new("plain").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    let hashed_rule = abc
        .engine
        .add_rule(&RuleSpec::new("hashed").when(vec![pattern(a), hashed(b, 0)]))
        .unwrap();
    assert_eq!(
        abc.engine.rule_joins(plain)[0],
        abc.engine.rule_joins(hashed_rule)[0]
    );
    assert_ne!(
        abc.engine.rule_joins(plain)[1],
        abc.engine.rule_joins(hashed_rule)[1]
    );
}

#[test]
fn shared_and_unshared_rules_agree() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let first = abc
        .engine
        .add_rule(&RuleSpec::new("first").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    for x in 0..4 {
        abc.assert(a, x);
        abc.assert(b, x % 2);
    }
    let late = abc
        .engine
        .add_rule(&RuleSpec::new("late").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    assert_eq!(abc.engine.rule_joins(first)[1], abc.engine.rule_joins(late)[1]);
    assert_eq!(
        abc.engine.agenda().tuples(first),
        abc.engine.agenda().tuples(late)
    );
    assert_eq!(abc.engine.agenda().for_rule(late).len(), 2);
}

#[test]
fn removing_one_sharer_keeps_the_other() {
    let mut abc = Abc::new();
    let (a, b, c) = (abc.a, abc.b, abc.c);
    let first = abc
        .engine
        .add_rule(&RuleSpec::new("first").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    let second = abc
        .engine
        .add_rule(&RuleSpec::new("second").when(vec![pattern(a), joined(b, 0), joined(c, 1)]))
        .unwrap();
    abc.assert(a, 1);
    abc.assert(b, 1);
    abc.assert(c, 1);
    assert_eq!(abc.engine.agenda().len(), 2);

    abc.engine.remove_rule(first).unwrap();
    assert_eq!(abc.engine.agenda().for_rule(second).len(), 1);
    assert!(abc.engine.agenda().for_rule(first).is_empty());
    assert_eq!(abc.engine.rule_id("first"), None);
    assert_eq!(abc.engine.rule_count(), 1);

    abc.engine.remove_rule(second).unwrap();
    assert!(abc.engine.agenda().is_empty());
    assert_eq!(counts(abc.engine.stats()), (0, 0, 0, 0));
}

#[test]
fn rule_removal_restores_the_previous_network() {
    let mut abc = Abc::new();
    let (a, b, c) = (abc.a, abc.b, abc.c);
    abc.engine
        .add_rule(&RuleSpec::new("keep").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    abc.assert(a, 1);
    abc.assert(b, 1);
    abc.assert(c, 1);
    let before = counts(abc.engine.stats());

    let extra = abc
        .engine
        .add_rule(&RuleSpec::new("extra").when(vec![
            pattern(a),
            joined(b, 0),
            joined(c, 0).negate(),
            pattern(c).existential(),
        ]))
        .unwrap();
    assert_ne!(counts(abc.engine.stats()), before);

    abc.engine.remove_rule(extra).unwrap();
    assert_eq!(counts(abc.engine.stats()), before);
    assert!(abc.engine.remove_rule(extra).is_err());
}
