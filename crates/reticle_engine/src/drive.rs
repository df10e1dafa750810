//! Assertion-side propagation through the join network.
//!
//! A [`Propagator`] borrows the network, working memory, agenda, and tracer
//! for the duration of one operation. New alpha matches enter joins from the
//! right; rows produced by a join enter each successor from the side its
//! link names. Everything runs to completion before the operation returns.

use std::rc::Rc;

use reticle_foundation::{EntityKind, EntityRef, Error};
use reticle_storage::{SlotKey, WorkingMemory};

use crate::agenda::{Activation, Agenda};
use crate::alpha::NodeId;
use crate::diagnostics::ErrorTrail;
use crate::expr::{EvalContext, Side, hash_exprs, hash_prefix};
use crate::network::memory::chain_from;
use crate::network::{
    AlphaMatch, Bind, JoinId, JoinLink, MatchId, Network, Owner, PartialMatch, RightEntry,
};
use crate::rule::RuleId;
use crate::trace::{TraceEvent, Tracer};

/// Which of a join's two tests to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JoinTest {
    Network,
    Secondary,
}

/// Mutable view of everything one network operation touches.
pub(crate) struct Propagator<'a> {
    pub(crate) net: &'a mut Network,
    pub(crate) wm: &'a WorkingMemory,
    pub(crate) agenda: &'a mut dyn Agenda,
    pub(crate) tracer: &'a mut Tracer,
}

impl Propagator<'_> {
    // =========================================================================
    // Alpha Entry
    // =========================================================================

    /// Runs an entity through its pattern network and drives every new
    /// alpha match into the joins its pattern enters.
    ///
    /// With `changed` set, only patterns sensitive to one of those slots are
    /// considered (object modify).
    pub(crate) fn assert_entity(&mut self, entity: EntityRef, changed: Option<&[SlotKey]>) {
        let only_initializing = self.net.incremental_reset;
        let result = match entity.kind {
            EntityKind::Fact => match self.wm.fact(entity.id) {
                Some(fact) => self.net.facts.match_fact(self.wm, fact, only_initializing),
                None => return,
            },
            EntityKind::Instance => match self.wm.instance(entity.id) {
                Some(instance) => {
                    self.net
                        .objects
                        .match_instance(self.wm, instance, only_initializing)
                }
                None => return,
            },
        };

        for (node, slot, err) in result.errors {
            self.report_pattern_error(entity, node, slot, &err);
        }

        for (pattern, markers) in result.hits {
            let Some(header) = self.net.patterns.get(pattern) else {
                continue;
            };
            if only_initializing && !header.initialize {
                continue;
            }
            if let Some(changed) = changed {
                if !changed.iter().any(|s| header.modify_slots.contains(s)) {
                    continue;
                }
            }
            let bind = Rc::new(AlphaMatch { entity, markers });
            let hash = hash_exprs(
                &header.right_hash,
                &EvalContext::join(self.wm, &[], &[Some(Rc::clone(&bind))]),
            );
            let alpha = self.net.add_alpha_match(pattern, bind, hash);
            tracing::trace!(?alpha, ?pattern, %entity, "alpha match");

            let joins = self.net.patterns[pattern].entry_joins.clone();
            for join in joins {
                if !self.net.is_live(alpha) {
                    break;
                }
                self.network_assert(alpha, join);
            }
        }
    }

    /// Admits a new alpha match into a join entered by its pattern.
    pub(crate) fn network_assert(&mut self, alpha: MatchId, join: JoinId) {
        let Some(node) = self.net.joins.get(join) else {
            return;
        };
        if self.net.incremental_reset && !node.initialize {
            return;
        }
        if node.first_join {
            self.empty_drive(join, alpha);
        } else {
            self.network_assert_right(alpha, join);
        }
    }

    // =========================================================================
    // Join Entry
    // =========================================================================

    /// Admits a new right-side match: an alpha match, or a sub-network row
    /// for joins from the right.
    pub(crate) fn network_assert_right(&mut self, rhs: MatchId, join: JoinId) {
        let node = &self.net.joins[join];
        if node.first_join {
            self.empty_drive(join, rhs);
            return;
        }
        let Some(memory) = node.left_memory.as_ref() else {
            return;
        };
        let exists = node.exists;
        let blocks = node.negated || node.join_from_the_right;
        let hash = self.net.matches[rhs].hash_value;
        let candidates = chain_from(&self.net.matches, memory.bucket_head(hash));

        for lhs in candidates {
            if !self.net.is_live(rhs) {
                return;
            }
            if !self.net.is_live(lhs) {
                continue;
            }
            let row = &self.net.matches[lhs];
            if row.owner != Owner::Join(join)
                || row.rhs_memory
                || row.hash_value != hash
                || row.marker.is_some()
            {
                continue;
            }
            if !self.eval_join(join, Some(lhs), Some(rhs), JoinTest::Network) {
                continue;
            }
            if exists {
                self.net.add_blocked_link(lhs, rhs);
                if self.eval_join(join, Some(lhs), None, JoinTest::Secondary) {
                    self.pp_drive(lhs, None, join);
                }
            } else if blocks {
                self.net.add_blocked_link(lhs, rhs);
                if self.net.matches[lhs].children.is_some() {
                    self.pos_entry_retract_beta(lhs);
                }
            } else {
                self.pp_drive(lhs, Some(rhs), join);
            }
        }
    }

    /// Admits a new left row: matches it against the right input, or raises
    /// an activation at a terminal join.
    pub(crate) fn network_assert_left(&mut self, lhs: MatchId, join: JoinId) {
        let node = &self.net.joins[join];
        if let Some(rule) = node.rule_to_activate {
            self.add_activation(rule, lhs);
            return;
        }
        let first = node.first_join;
        let exists = node.exists;
        let blocks = node.negated || node.join_from_the_right;
        let hash = self.net.matches[lhs].hash_value;
        let candidates = match node.right_entry {
            Some(RightEntry::Join(_)) => node.right_memory.as_ref().map_or_else(Vec::new, |m| {
                chain_from(&self.net.matches, m.bucket_head(hash))
            }),
            Some(RightEntry::Pattern(pattern)) if first => self.net.pattern_entries(pattern),
            Some(RightEntry::Pattern(pattern)) => {
                chain_from(&self.net.matches, self.net.alpha.bucket_head(pattern, hash))
            }
            None => return,
        };

        for rhs in candidates {
            if !self.net.is_live(lhs) {
                return;
            }
            if !self.net.is_live(rhs) {
                continue;
            }
            if !first && self.net.matches[rhs].hash_value != hash {
                continue;
            }
            if !self.eval_join(join, Some(lhs), Some(rhs), JoinTest::Network) {
                continue;
            }
            if exists {
                self.net.add_blocked_link(lhs, rhs);
                if self.eval_join(join, Some(lhs), None, JoinTest::Secondary) {
                    self.drive_unblocked(lhs, join);
                }
                return;
            }
            if blocks {
                self.net.add_blocked_link(lhs, rhs);
                break;
            }
            self.pp_drive(lhs, Some(rhs), join);
        }

        if blocks
            && !exists
            && self.net.is_live(lhs)
            && self.net.matches[lhs].marker.is_none()
            && self.eval_join(join, Some(lhs), None, JoinTest::Secondary)
        {
            self.drive_unblocked(lhs, join);
        }
    }

    // =========================================================================
    // Drives
    // =========================================================================

    /// First-join entry: there is no left memory to scan.
    fn empty_drive(&mut self, join: JoinId, rhs: MatchId) {
        if !self.eval_join(join, None, Some(rhs), JoinTest::Network) {
            return;
        }
        let node = &self.net.joins[join];
        if node.blocks() {
            let exists = node.exists;
            let Some(placeholder) = node.placeholder else {
                self.net.structural_fault(Error::internal(format!(
                    "blocking first join {join:?} has no placeholder"
                )));
                return;
            };
            if self.net.matches[placeholder].marker.is_some() {
                return;
            }
            self.net.add_blocked_link(placeholder, rhs);
            if exists {
                if self.eval_join(join, Some(placeholder), None, JoinTest::Secondary) {
                    self.epm_drive(placeholder, join);
                }
            } else if self.net.matches[placeholder].children.is_some() {
                self.pos_entry_retract_beta(placeholder);
            }
            return;
        }

        let links = node.next_links.clone();
        self.copy_drive(rhs, &links);
    }

    /// Passes a match through unchanged to each link, as a first positive
    /// join does.
    pub(crate) fn copy_drive(&mut self, rhs: MatchId, links: &[JoinLink]) {
        let binds = self.net.matches[rhs].binds.clone();
        for &link in links {
            if !self.net.is_live(rhs) {
                return;
            }
            let row = self
                .net
                .matches
                .insert(PartialMatch::new(binds.clone(), Owner::Join(link.join)));
            let hash = self.entry_hash(link, row);
            self.net
                .link_row(row, None, Some(rhs), link.join, hash, link.enter);
            self.enter(link, row);
        }
    }

    /// Propagates an unblocked (or, for exists, blocked) left row.
    pub(crate) fn drive_unblocked(&mut self, lhs: MatchId, join: JoinId) {
        if self.net.joins[join].first_join {
            self.epm_drive(lhs, join);
        } else {
            self.pp_drive(lhs, None, join);
        }
    }

    /// Extends a left row with the right match's bind (or an empty bind)
    /// and sends the result to every successor.
    pub(crate) fn pp_drive(&mut self, lhs: MatchId, rhs: Option<MatchId>, join: JoinId) {
        let links = self.net.joins[join].next_links.clone();
        self.pp_drive_links(lhs, rhs, &links);
    }

    pub(crate) fn pp_drive_links(&mut self, lhs: MatchId, rhs: Option<MatchId>, links: &[JoinLink]) {
        for &link in links {
            if !self.net.is_live(lhs) {
                return;
            }
            let mut binds: Vec<Bind> = self.net.matches[lhs].binds.clone();
            binds.push(rhs.and_then(|r| self.net.matches[r].binds.first().cloned().flatten()));
            let row = self
                .net
                .matches
                .insert(PartialMatch::new(binds, Owner::Join(link.join)));
            let hash = self.entry_hash(link, row);
            self.net
                .link_row(row, Some(lhs), rhs, link.join, hash, link.enter);
            self.enter(link, row);
        }
    }

    /// Output of an unblocked first-join placeholder: a row holding one
    /// empty bind, parented on the placeholder.
    pub(crate) fn epm_drive(&mut self, parent: MatchId, join: JoinId) {
        let links = self.net.joins[join].next_links.clone();
        self.epm_drive_links(parent, &links);
    }

    pub(crate) fn epm_drive_links(&mut self, parent: MatchId, links: &[JoinLink]) {
        for &link in links {
            if !self.net.is_live(parent) {
                return;
            }
            let row = self
                .net
                .matches
                .insert(PartialMatch::new(vec![None], Owner::Join(link.join)));
            let hash = self.entry_hash(link, row);
            self.net
                .link_row(row, Some(parent), None, link.join, hash, link.enter);
            self.enter(link, row);
        }
    }

    fn enter(&mut self, link: JoinLink, row: MatchId) {
        match link.enter {
            Side::Left => self.network_assert_left(row, link.join),
            Side::Right => self.network_assert_right(row, link.join),
        }
    }

    /// Bucket hash of a row entering `link.join` from `link.enter`.
    pub(crate) fn entry_hash(&self, link: JoinLink, row: MatchId) -> u64 {
        let node = &self.net.joins[link.join];
        let binds = &self.net.matches[row].binds;
        match link.enter {
            Side::Left if node.prefix_hash() => hash_prefix(binds),
            Side::Left => hash_exprs(&node.left_hash, &EvalContext::join(self.wm, binds, &[])),
            Side::Right if node.first_join => 0,
            Side::Right if node.prefix_hash() => {
                hash_prefix(&binds[..node.left_width().min(binds.len())])
            }
            Side::Right => hash_exprs(&node.right_hash, &EvalContext::join(self.wm, &[], binds)),
        }
    }

    // =========================================================================
    // Tests
    // =========================================================================

    /// Runs one of a join's tests. A missing test passes; an evaluation
    /// error fails, except that a failing negated join test counts as a
    /// match.
    pub(crate) fn eval_join(
        &mut self,
        join: JoinId,
        lhs: Option<MatchId>,
        rhs: Option<MatchId>,
        which: JoinTest,
    ) -> bool {
        let (result, negated) = {
            let node = &self.net.joins[join];
            let lhs_binds: &[Bind] = lhs.map_or(&[], |id| self.net.matches[id].binds.as_slice());
            let rhs_binds: &[Bind] = rhs.map_or(&[], |id| self.net.matches[id].binds.as_slice());
            if which == JoinTest::Network
                && node.join_from_the_right
                && lhs.is_some()
                && rhs.is_some_and(|r| !self.net.matches[r].has_prefix(lhs_binds))
            {
                return false;
            }
            let expr = match which {
                JoinTest::Network => node.network_test.as_ref(),
                JoinTest::Secondary => node.secondary_test.as_ref(),
            };
            let Some(expr) = expr else {
                return true;
            };
            (
                expr.test(&EvalContext::join(self.wm, lhs_binds, rhs_binds)),
                node.negated,
            )
        };
        self.net.joins[join].stats.comparisons += 1;
        match result {
            Ok(passed) => passed,
            Err(err) => {
                self.report_join_error(join, &err);
                negated && which == JoinTest::Network
            }
        }
    }

    // =========================================================================
    // Activations
    // =========================================================================

    fn add_activation(&mut self, rule: RuleId, basis: MatchId) {
        let Some(r) = self.net.rules.get(rule) else {
            self.net.structural_fault(Error::internal(format!(
                "terminal join of unknown rule {rule:?}"
            )));
            return;
        };
        let (rule_name, salience) = (r.name, r.salience);
        let entities = self.net.matches[basis].entities();
        let time_tag = entities
            .iter()
            .flatten()
            .filter_map(|e| self.wm.entity(*e))
            .map(|e| e.time_tag())
            .max()
            .unwrap_or(0);
        self.net.matches[basis].activation = true;
        tracing::trace!(rule = self.wm.interner().name(rule_name), ?basis, "activation added");
        self.tracer.record(TraceEvent::ActivationAdded {
            rule: rule_name,
            basis,
            entities: entities.clone(),
        });
        self.agenda.add_activation(Activation {
            rule,
            rule_name,
            salience,
            basis,
            entities,
            time_tag,
        });
    }

    pub(crate) fn remove_activation(&mut self, basis: MatchId) {
        let pm = &mut self.net.matches[basis];
        if !pm.activation {
            return;
        }
        pm.activation = false;
        let owner = pm.join();
        let Some(rule) = owner
            .and_then(|j| self.net.joins.get(j))
            .and_then(|node| node.rule_to_activate)
        else {
            return;
        };
        if let Some(r) = self.net.rules.get(rule) {
            tracing::trace!(rule = self.wm.interner().name(r.name), ?basis, "activation removed");
            self.tracer.record(TraceEvent::ActivationRemoved {
                rule: r.name,
                basis,
            });
        }
        self.agenda.remove_activation(rule, basis);
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    fn report_join_error(&mut self, join: JoinId, err: &Error) {
        let mut trail = ErrorTrail::new(err, None, None);
        trail.rules = self.net.rules_through(join);
        self.emit_trail(trail);
    }

    fn report_pattern_error(&mut self, entity: EntityRef, node: NodeId, slot: SlotKey, err: &Error) {
        let patterns = match entity.kind {
            EntityKind::Fact => self.net.facts.stops_below(node),
            EntityKind::Instance => self.net.objects.stops_below(node),
        };
        let mut trail = ErrorTrail::new(err, Some(entity), Some(slot));
        trail.rules = self.net.rules_for_patterns(&patterns);
        self.emit_trail(trail);
    }

    fn emit_trail(&mut self, trail: ErrorTrail) {
        tracing::warn!(%trail, "constraint evaluation failed");
        self.tracer.record(TraceEvent::EvaluationError {
            message: trail.message.clone(),
            entity: trail.entity,
            rules: trail.rule_names(),
        });
        self.net.push_trail(trail);
    }
}
