//! Network construction: one join per condition, shared where an identical
//! join already hangs off the same predecessor.

use std::collections::HashSet;

use reticle_foundation::{EntityKind, Error, Result, SymbolId};
use reticle_storage::SlotKey;

use crate::alpha::{AlphaNodeRef, FactPattern, ObjectPattern};
use crate::expr::{Expr, Side};
use crate::network::alpha_memory::BucketList;
use crate::network::{
    BetaMemory, JoinId, JoinLink, JoinNode, JoinStats, Network, Owner, PartialMatch, PatternHeader,
    PatternId, RightEntry,
};
use crate::rule::{Condition, ConditionEntry, Disjunct, Rule, RuleId, RuleSpec};

/// What a build created, in creation order.
#[derive(Debug, Default)]
pub(crate) struct BuildLog {
    pub(crate) joins: Vec<JoinId>,
    pub(crate) patterns: Vec<PatternId>,
}

/// Everything that decides whether two joins are interchangeable.
#[derive(Debug)]
struct JoinShape {
    first_join: bool,
    negated: bool,
    exists: bool,
    join_from_the_right: bool,
    depth: u16,
    network_test: Option<Expr>,
    secondary_test: Option<Expr>,
    left_hash: Vec<Expr>,
    right_hash: Vec<Expr>,
    right_entry: RightEntry,
    last_level: Option<JoinId>,
}

impl JoinShape {
    fn matches(&self, node: &JoinNode) -> bool {
        node.first_join == self.first_join
            && node.negated == self.negated
            && node.exists == self.exists
            && node.join_from_the_right == self.join_from_the_right
            && node.depth == self.depth
            && node.right_entry == Some(self.right_entry)
            && node.last_level == self.last_level
            && node.network_test == self.network_test
            && node.secondary_test == self.secondary_test
            && node.left_hash == self.left_hash
            && node.right_hash == self.right_hash
    }

    fn blocks(&self) -> bool {
        self.negated || self.exists || self.join_from_the_right
    }

    fn prefix_hash(&self) -> bool {
        self.join_from_the_right && self.left_hash.is_empty() && self.right_hash.is_empty()
    }
}

fn and_tests(a: Option<Expr>, b: Option<Expr>) -> Option<Expr> {
    match (a, b) {
        (Some(a), Some(b)) => Some(Expr::And(vec![a, b])),
        (a, b) => a.or(b),
    }
}

/// Slots any join expression of a disjunct reads.
fn join_slots(conditions: &[Condition], out: &mut HashSet<SlotKey>) {
    for condition in conditions {
        let exprs = condition
            .network_test
            .iter()
            .chain(&condition.secondary_test)
            .chain(&condition.left_hash)
            .chain(&condition.right_hash);
        for expr in exprs {
            expr.visit_fields(&mut |input, field| {
                if input.is_some() {
                    if let Some(slot) = field.depends_on() {
                        out.insert(slot);
                    }
                }
            });
        }
        if let ConditionEntry::Group(inner) = &condition.entry {
            join_slots(inner, out);
        }
    }
}

impl Network {
    /// Installs a validated rule. The rule is live in the arena before any
    /// join is primed.
    pub(crate) fn install_rule(&mut self, spec: &RuleSpec, name: SymbolId) -> Result<(RuleId, BuildLog)> {
        let rule = self.rules.insert(Rule {
            name,
            salience: spec.salience,
            disjuncts: Vec::new(),
        });
        self.rule_names.insert(name, rule);
        let mut log = BuildLog::default();
        for conditions in &spec.disjuncts {
            let disjunct = self.build_disjunct(rule, conditions, &mut log)?;
            self.rules[rule].disjuncts.push(disjunct);
        }
        tracing::debug!(
            rule = %spec.name,
            new_joins = log.joins.len(),
            new_patterns = log.patterns.len(),
            "rule network built"
        );
        Ok((rule, log))
    }

    fn build_disjunct(
        &mut self,
        rule: RuleId,
        conditions: &[Condition],
        log: &mut BuildLog,
    ) -> Result<Disjunct> {
        let logical_count = conditions.iter().take_while(|c| c.logical).count();
        let mut slots = HashSet::new();
        join_slots(conditions, &mut slots);

        let mut prev = None;
        let mut joins = Vec::with_capacity(conditions.len());
        let mut patterns = Vec::new();
        let mut logical_join = None;
        for (index, condition) in conditions.iter().enumerate() {
            let logical = logical_count > 0 && index == logical_count;
            let depth = u16::try_from(index + 1)
                .map_err(|_| Error::invalid_condition("too many conditions"))?;
            let join =
                self.build_condition(prev, condition, depth, logical, &slots, log, &mut patterns)?;
            if logical {
                logical_join = Some(join);
            }
            joins.push(join);
            prev = Some(join);
        }

        let Some(last) = prev else {
            return Err(Error::invalid_condition("empty disjunct"));
        };
        let depth = self.joins[last].depth + 1;
        let terminal = self.joins.insert(JoinNode {
            first_join: false,
            negated: false,
            exists: false,
            join_from_the_right: false,
            logical_join: logical_count == conditions.len(),
            initialize: true,
            depth,
            network_test: None,
            secondary_test: None,
            left_hash: Vec::new(),
            right_hash: Vec::new(),
            right_entry: None,
            last_level: Some(last),
            left_memory: Some(BetaMemory::new(1)),
            right_memory: None,
            next_links: Vec::new(),
            rule_to_activate: Some(rule),
            placeholder: None,
            placeholder_primed: false,
            stats: JoinStats::default(),
        });
        self.joins[last].next_links.push(JoinLink {
            join: terminal,
            enter: Side::Left,
        });
        log.joins.push(terminal);
        if logical_count == conditions.len() {
            logical_join = Some(terminal);
        }

        Ok(Disjunct {
            terminal,
            logical_join,
            joins,
            patterns,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_condition(
        &mut self,
        prev: Option<JoinId>,
        condition: &Condition,
        depth: u16,
        logical: bool,
        slots: &HashSet<SlotKey>,
        log: &mut BuildLog,
        patterns: &mut Vec<PatternId>,
    ) -> Result<JoinId> {
        let right_entry = match &condition.entry {
            ConditionEntry::Fact(pattern) => {
                let p = self.add_fact_pattern(pattern, &condition.right_hash, log);
                patterns.push(p);
                RightEntry::Pattern(p)
            }
            ConditionEntry::Object(pattern) => {
                let p = self.add_object_pattern(pattern, &condition.right_hash, slots, log);
                patterns.push(p);
                RightEntry::Pattern(p)
            }
            ConditionEntry::Group(inner) => {
                let mut sub_prev = prev;
                for (offset, nested) in (0u16..).zip(inner) {
                    sub_prev = Some(self.build_condition(
                        sub_prev,
                        nested,
                        depth + offset,
                        false,
                        slots,
                        log,
                        patterns,
                    )?);
                }
                let Some(last) = sub_prev else {
                    return Err(Error::invalid_condition("empty condition group"));
                };
                RightEntry::Join(last)
            }
        };

        let blocking = condition.negated || condition.exists || condition.is_group();
        let (network_test, secondary_test) = if blocking {
            (condition.network_test.clone(), condition.secondary_test.clone())
        } else {
            (
                and_tests(
                    condition.network_test.clone(),
                    condition.secondary_test.clone(),
                ),
                None,
            )
        };
        let shape = JoinShape {
            first_join: prev.is_none(),
            negated: condition.negated,
            exists: condition.exists,
            join_from_the_right: condition.is_group(),
            depth,
            network_test,
            secondary_test,
            left_hash: condition.left_hash.clone(),
            right_hash: condition.right_hash.clone(),
            right_entry,
            last_level: prev,
        };

        if let Some(shared) = self.find_shared_join(&shape, logical) {
            if logical {
                self.joins[shared].logical_join = true;
            }
            tracing::trace!(join = ?shared, "sharing join");
            return Ok(shared);
        }
        Ok(self.create_join(shape, logical, log))
    }

    fn find_shared_join(&self, shape: &JoinShape, logical: bool) -> Option<JoinId> {
        let candidates: Vec<JoinId> = match shape.right_entry {
            RightEntry::Pattern(p) => self.patterns[p].entry_joins.clone(),
            RightEntry::Join(s) => self.joins[s]
                .next_links
                .iter()
                .filter(|link| link.enter == Side::Right)
                .map(|link| link.join)
                .collect(),
        };
        candidates.into_iter().find(|id| {
            let node = &self.joins[*id];
            !node.is_terminal()
                && shape.matches(node)
                && (!logical
                    || node.logical_join
                    || node.left_memory.as_ref().is_none_or(BetaMemory::is_empty))
        })
    }

    fn create_join(&mut self, shape: JoinShape, logical: bool, log: &mut BuildLog) -> JoinId {
        let hashed = |exprs: &[Expr]| {
            if exprs.is_empty() && !shape.prefix_hash() {
                1
            } else {
                self.beta_hash_size
            }
        };
        let left_memory = (!shape.first_join || shape.blocks())
            .then(|| BetaMemory::new(hashed(&shape.left_hash)));
        let right_memory = shape
            .join_from_the_right
            .then(|| BetaMemory::new(hashed(&shape.right_hash)));
        let needs_placeholder = shape.first_join && shape.blocks();
        let (prev, right_entry) = (shape.last_level, shape.right_entry);

        let join = self.joins.insert(JoinNode {
            first_join: shape.first_join,
            negated: shape.negated,
            exists: shape.exists,
            join_from_the_right: shape.join_from_the_right,
            logical_join: logical,
            initialize: true,
            depth: shape.depth,
            network_test: shape.network_test,
            secondary_test: shape.secondary_test,
            left_hash: shape.left_hash,
            right_hash: shape.right_hash,
            right_entry: Some(right_entry),
            last_level: prev,
            left_memory,
            right_memory,
            next_links: Vec::new(),
            rule_to_activate: None,
            placeholder: None,
            placeholder_primed: false,
            stats: JoinStats::default(),
        });

        if let Some(prev) = prev {
            self.joins[prev].next_links.push(JoinLink {
                join,
                enter: Side::Left,
            });
        }
        match right_entry {
            RightEntry::Pattern(p) => self.patterns[p].entry_joins.push(join),
            RightEntry::Join(s) => self.joins[s].next_links.push(JoinLink {
                join,
                enter: Side::Right,
            }),
        }
        if needs_placeholder {
            let row = self
                .matches
                .insert(PartialMatch::new(Vec::new(), Owner::Join(join)));
            self.link_row(row, None, None, join, 0, Side::Left);
            self.joins[join].placeholder = Some(row);
        }
        tracing::trace!(?join, depth = self.joins[join].depth, "join created");
        log.joins.push(join);
        join
    }

    // =========================================================================
    // Patterns
    // =========================================================================

    fn add_fact_pattern(
        &mut self,
        pattern: &FactPattern,
        right_hash: &[Expr],
        log: &mut BuildLog,
    ) -> PatternId {
        let node = self.facts.add_pattern(pattern);
        let existing = self
            .facts
            .stops(node)
            .iter()
            .copied()
            .find(|p| self.patterns[*p].right_hash == right_hash);
        if let Some(p) = existing {
            return p;
        }
        let id = self.patterns.insert(PatternHeader {
            kind: EntityKind::Fact,
            node: AlphaNodeRef::Fact(node),
            entry_joins: Vec::new(),
            right_hash: right_hash.to_vec(),
            memory: BucketList::default(),
            initialize: true,
            modify_slots: HashSet::new(),
        });
        self.facts.add_stop(node, id);
        self.facts.mark_path(node, &mut Vec::new());
        log.patterns.push(id);
        id
    }

    fn add_object_pattern(
        &mut self,
        pattern: &ObjectPattern,
        right_hash: &[Expr],
        join_slots: &HashSet<SlotKey>,
        log: &mut BuildLog,
    ) -> PatternId {
        let mut referenced = Vec::new();
        for slot in &pattern.slots {
            slot.referenced_slots(&mut referenced);
        }
        let node = self.objects.add_pattern(pattern);
        let existing = self.objects.stops(node).iter().copied().find(|p| {
            self.patterns[*p].right_hash == right_hash
                && self.objects.class_of(*p) == Some(pattern.class)
        });
        if let Some(p) = existing {
            let header = &mut self.patterns[p];
            header.modify_slots.extend(referenced);
            header.modify_slots.extend(join_slots.iter().copied());
            return p;
        }
        let mut modify_slots: HashSet<SlotKey> = referenced.into_iter().collect();
        modify_slots.extend(join_slots.iter().copied());
        let id = self.patterns.insert(PatternHeader {
            kind: EntityKind::Instance,
            node: AlphaNodeRef::Object(node),
            entry_joins: Vec::new(),
            right_hash: right_hash.to_vec(),
            memory: BucketList::default(),
            initialize: true,
            modify_slots,
        });
        self.objects.add_stop(node, id, pattern.class);
        self.objects.mark_path(node, &mut Vec::new());
        log.patterns.push(id);
        id
    }
}
