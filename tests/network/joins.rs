//! Integration tests for positive joins
//!
//! Checks the activation set against a nested-loop evaluation of the same
//! conditions over the live facts, under random assert/retract sequences.

use std::collections::BTreeMap;

use proptest::prelude::*;
use reticle_engine::{Condition, RuleSpec};
use reticle_foundation::EntityRef;

use crate::fixtures::{Abc, hashed, joined, pattern};

// =============================================================================
// Basics
// =============================================================================

#[test]
fn two_way_join_pairs_equal_values() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("pair").when(vec![pattern(a), joined(b, 0)]))
        .unwrap();

    let a1 = abc.assert(a, 1);
    let a2 = abc.assert(a, 2);
    let b1 = abc.assert(b, 1);
    abc.assert(b, 3);

    assert_eq!(
        abc.engine.agenda().tuples(rule),
        vec![vec![Some(a1), Some(b1)]]
    );
    let b2 = abc.assert(b, 2);
    assert_eq!(abc.engine.agenda().for_rule(rule).len(), 2);
    assert!(abc
        .engine
        .agenda()
        .tuples(rule)
        .contains(&vec![Some(a2), Some(b2)]));
}

#[test]
fn single_pattern_rule_activates_per_fact() {
    let mut abc = Abc::new();
    let a = abc.a;
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("each").when(vec![pattern(a)]))
        .unwrap();
    for x in 0..5 {
        abc.assert(a, x);
    }
    assert_eq!(abc.engine.agenda().for_rule(rule).len(), 5);
}

#[test]
fn constant_tests_filter_in_the_pattern_network() {
    let mut abc = Abc::new();
    let a = abc.a;
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("sevens").when(vec![Condition::fact(
            reticle_engine::FactPattern::new(a).with_constant(0, 7i64),
        )]))
        .unwrap();
    abc.assert(a, 6);
    let seven = abc.assert(a, 7);
    assert_eq!(abc.engine.agenda().tuples(rule), vec![vec![Some(seven)]]);
    assert_eq!(abc.engine.matches(rule).unwrap()[0].patterns, vec![1]);
}

#[test]
fn salience_orders_the_agenda() {
    let mut abc = Abc::new();
    let a = abc.a;
    let low = abc
        .engine
        .add_rule(&RuleSpec::new("low").with_salience(-5).when(vec![pattern(a)]))
        .unwrap();
    let high = abc
        .engine
        .add_rule(&RuleSpec::new("high").with_salience(10).when(vec![pattern(a)]))
        .unwrap();
    abc.assert(a, 1);
    let order: Vec<_> = abc.engine.agenda().iter().map(|act| act.rule).collect();
    assert_eq!(order, vec![high, low]);
}

#[test]
fn disjuncts_activate_independently() {
    let mut abc = Abc::new();
    let (a, b) = (abc.a, abc.b);
    let rule = abc
        .engine
        .add_rule(&RuleSpec::new("either").when(vec![pattern(a)]).when(vec![pattern(b)]))
        .unwrap();
    let fa = abc.assert(a, 1);
    let fb = abc.assert(b, 1);
    assert_eq!(
        abc.engine.agenda().tuples(rule),
        vec![vec![Some(fa)], vec![Some(fb)]]
    );
    assert_eq!(abc.engine.matches(rule).unwrap().len(), 2);
}

// =============================================================================
// Oracle Comparison
// =============================================================================

#[derive(Clone, Debug)]
enum Op {
    Assert(u8, i64),
    Retract(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..3, 0i64..4).prop_map(|(kind, x)| Op::Assert(kind, x)),
        1 => any::<usize>().prop_map(Op::Retract),
    ]
}

/// Live facts by `(template kind, x)`; identical facts are not duplicated.
#[derive(Default)]
struct Model {
    live: BTreeMap<(u8, i64), EntityRef>,
}

impl Model {
    fn of(&self, kind: u8) -> Vec<(EntityRef, i64)> {
        self.live
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, x), e)| (*e, *x))
            .collect()
    }
}

fn apply(abc: &mut Abc, model: &mut Model, ops: &[Op]) {
    for op in ops {
        match *op {
            Op::Assert(kind, x) => {
                let fact = abc.assert(abc.template(kind), x);
                model.live.insert((kind, x), fact);
            }
            Op::Retract(pick) => {
                if model.live.is_empty() {
                    continue;
                }
                let key = *model.live.keys().nth(pick % model.live.len()).unwrap();
                let fact = model.live.remove(&key).unwrap();
                abc.engine.retract(fact).unwrap();
            }
        }
    }
}

/// `a(?x), b(?x), not c(?x)`
fn oracle_pair_not(model: &Model) -> Vec<Vec<Option<EntityRef>>> {
    let mut out = Vec::new();
    for (fa, xa) in model.of(0) {
        for (fb, xb) in model.of(1) {
            if xa == xb && !model.of(2).iter().any(|(_, xc)| *xc == xa) {
                out.push(vec![Some(fa), Some(fb), None]);
            }
        }
    }
    out.sort();
    out
}

/// `a(?x), exists b(?x)`
fn oracle_exists(model: &Model) -> Vec<Vec<Option<EntityRef>>> {
    let mut out: Vec<_> = model
        .of(0)
        .into_iter()
        .filter(|(_, xa)| model.of(1).iter().any(|(_, xb)| xb == xa))
        .map(|(fa, _)| vec![Some(fa), None])
        .collect();
    out.sort();
    out
}

/// `a(?x), b(?x), c(?x)` where every pair is compared.
fn oracle_triple(model: &Model) -> Vec<Vec<Option<EntityRef>>> {
    let mut out = Vec::new();
    for (fa, xa) in model.of(0) {
        for (fb, xb) in model.of(1) {
            for (fc, xc) in model.of(2) {
                if xa == xb && xb == xc {
                    out.push(vec![Some(fa), Some(fb), Some(fc)]);
                }
            }
        }
    }
    out.sort();
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn activations_match_nested_loops(ops in prop::collection::vec(op(), 0..40), hash in any::<bool>()) {
        let mut abc = Abc::new();
        let (a, b, c) = (abc.a, abc.b, abc.c);
        let cond = |t, left| if hash { hashed(t, left) } else { joined(t, left) };
        let pair_not = abc.engine.add_rule(&RuleSpec::new("pair-not").when(vec![
            pattern(a),
            cond(b, 0),
            cond(c, 0).negate(),
        ])).unwrap();
        let exists = abc.engine.add_rule(&RuleSpec::new("exists").when(vec![
            pattern(a),
            cond(b, 0).existential(),
        ])).unwrap();
        let triple = abc.engine.add_rule(&RuleSpec::new("triple").when(vec![
            pattern(a),
            cond(b, 0),
            cond(c, 1),
        ])).unwrap();

        let mut model = Model::default();
        apply(&mut abc, &mut model, &ops);

        prop_assert_eq!(abc.engine.agenda().tuples(pair_not), oracle_pair_not(&model));
        prop_assert_eq!(abc.engine.agenda().tuples(exists), oracle_exists(&model));
        prop_assert_eq!(abc.engine.agenda().tuples(triple), oracle_triple(&model));
        prop_assert_eq!(abc.engine.stats().garbage, 0);
    }

    #[test]
    fn retracting_everything_empties_the_network(ops in prop::collection::vec(op(), 0..30)) {
        let mut abc = Abc::new();
        let (a, b) = (abc.a, abc.b);
        abc.engine.add_rule(&RuleSpec::new("pair").when(vec![pattern(a), hashed(b, 0)])).unwrap();
        let baseline = abc.engine.stats();

        let mut model = Model::default();
        apply(&mut abc, &mut model, &ops);
        for fact in std::mem::take(&mut model.live).into_values() {
            abc.engine.retract(fact).unwrap();
        }

        prop_assert!(abc.engine.agenda().is_empty());
        prop_assert_eq!(abc.engine.stats(), baseline);
    }
}
