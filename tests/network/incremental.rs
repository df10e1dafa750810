//! Integration tests for incremental reset
//!
//! A rule added after its facts must end up with the same matches as the
//! same rule added before them, whether or not it shares joins.

use proptest::prelude::*;
use reticle_engine::{Condition, EngineConfig, RuleSpec};
use reticle_foundation::EntityRef;

use crate::fixtures::{Abc, hashed, joined, pattern};

fn rules(abc: &Abc) -> Vec<RuleSpec> {
    let (a, b, c) = (abc.a, abc.b, abc.c);
    vec![
        RuleSpec::new("pair").when(vec![pattern(a), hashed(b, 0)]),
        RuleSpec::new("pair-not").when(vec![pattern(a), hashed(b, 0), joined(c, 0).negate()]),
        RuleSpec::new("pair-exists").when(vec![pattern(a), hashed(b, 0), joined(c, 1).existential()]),
        RuleSpec::new("leading-not").when(vec![pattern(c).negate(), pattern(a)]),
        RuleSpec::new("not-both").when(vec![
            pattern(a),
            Condition::not_all(vec![joined(b, 0), joined(c, 0)]),
        ]),
        RuleSpec::new("exists-pair").when(vec![Condition::exists_all(vec![
            pattern(b),
            joined(c, 0),
        ])]),
    ]
}

fn tuples(abc: &Abc, specs: &[RuleSpec]) -> Vec<Vec<Vec<Option<EntityRef>>>> {
    specs
        .iter()
        .map(|spec| {
            let rule = abc.engine.rule_id(&spec.name).unwrap();
            abc.engine.agenda().tuples(rule)
        })
        .collect()
}

fn facts() -> impl Strategy<Value = Vec<(u8, i64)>> {
    prop::collection::vec((0u8..3, 0i64..3), 0..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn late_rules_match_like_early_rules(facts in facts(), split in 0usize..6) {
        let mut early = Abc::new();
        let specs = rules(&early);
        for spec in &specs {
            early.engine.add_rule(spec).unwrap();
        }
        for &(kind, x) in &facts {
            early.assert(early.template(kind), x);
        }

        // Some rules before the facts, the rest after.
        let mut late = Abc::new();
        for spec in &specs[..split] {
            late.engine.add_rule(spec).unwrap();
        }
        for &(kind, x) in &facts {
            late.assert(late.template(kind), x);
        }
        for spec in &specs[split..] {
            late.engine.add_rule(spec).unwrap();
        }

        prop_assert_eq!(tuples(&early, &specs), tuples(&late, &specs));
        prop_assert_eq!(early.engine.stats(), late.engine.stats());
    }
}

#[test]
fn without_incremental_reset_late_rules_wait_for_reset() {
    let mut abc = Abc::with_config(EngineConfig::new().with_incremental_reset(false));
    let (a, b) = (abc.a, abc.b);
    abc.assert(a, 1);
    abc.assert(b, 1);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();
    assert!(abc.engine.agenda().is_empty());

    abc.engine.reset().unwrap();
    let fa = abc.assert(a, 1);
    let fb = abc.assert(b, 1);
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![Some(fa), Some(fb)]]);
}

#[test]
fn late_rule_sharing_a_not_join_sees_its_blockers() {
    let mut abc = Abc::new();
    let (a, b, c) = (abc.a, abc.b, abc.c);
    let first = abc
        .engine
        .add_rule(&RuleSpec::new("first").when(vec![pattern(a), joined(c, 0).negate()]))
        .unwrap();
    let a1 = abc.assert(a, 1);
    abc.assert(a, 2);
    abc.assert(c, 2);
    let b1 = abc.assert(b, 1);
    abc.assert(b, 2);

    let second = abc
        .engine
        .add_rule(&RuleSpec::new("second").when(vec![
            pattern(a),
            joined(c, 0).negate(),
            joined(b, 0),
        ]))
        .unwrap();
    assert_eq!(abc.engine.rule_joins(first)[1], abc.engine.rule_joins(second)[1]);
    assert_eq!(
        abc.engine.agenda().tuples(second),
        vec![vec![Some(a1), None, Some(b1)]]
    );
}
