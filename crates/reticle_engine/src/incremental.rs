//! Bringing newly built joins up to date with the current working memory.
//!
//! New joins are primed from the memories of initialized siblings wherever
//! one exists. Only genuinely new patterns send live entities back through
//! the alpha network.

use std::collections::HashSet;

use reticle_foundation::EntityKind;

use crate::build::BuildLog;
use crate::drive::{JoinTest, Propagator};
use crate::expr::Side;
use crate::network::memory::chain_from;
use crate::network::{JoinId, JoinLink, MatchId, Network, Owner, PartialMatch, RightEntry};

impl Network {
    /// Drops every incremental flag set by a build.
    pub(crate) fn clear_initialize(&mut self, log: &BuildLog) {
        for join in &log.joins {
            if let Some(node) = self.joins.get_mut(*join) {
                node.initialize = false;
            }
        }
        for pattern in &log.patterns {
            if let Some(header) = self.patterns.get_mut(*pattern) {
                header.initialize = false;
            }
        }
        self.facts.clear_initialize();
        self.objects.clear_initialize();
    }

    /// Joins that own a placeholder row, with that row.
    pub(crate) fn placeholder_joins(&self) -> Vec<(JoinId, MatchId)> {
        self.joins
            .iter()
            .filter_map(|(id, node)| node.placeholder.map(|p| (id, p)))
            .collect()
    }
}

impl Propagator<'_> {
    /// Fills the joins of a freshly built rule from live data.
    pub(crate) fn incremental_reset(&mut self, log: &BuildLog) {
        self.net.incremental_reset = true;
        tracing::debug!(
            joins = log.joins.len(),
            patterns = log.patterns.len(),
            "incremental reset"
        );

        for &join in &log.joins {
            let node = &self.net.joins[join];
            if let Some(RightEntry::Join(source)) = node.right_entry {
                if !self.net.joins[source].initialize {
                    self.prime_right(join, source);
                }
            }
        }

        let kinds: HashSet<EntityKind> = log
            .patterns
            .iter()
            .filter_map(|p| self.net.patterns.get(*p).map(|h| h.kind))
            .collect();
        for kind in [EntityKind::Fact, EntityKind::Instance] {
            if kinds.contains(&kind) {
                for entity in self.wm.live_entities(kind) {
                    self.assert_entity(entity, None);
                }
            }
        }

        for &join in &log.joins {
            self.prime_left(join);
        }

        self.net.clear_initialize(log);
        self.net.incremental_reset = false;
    }

    /// Copies an initialized sub-network's output into a new join's right
    /// memory. Nothing is asserted: the left memory is still empty.
    fn prime_right(&mut self, join: JoinId, source: JoinId) {
        let link = JoinLink {
            join,
            enter: Side::Right,
        };
        if !self.copy_from_sibling(source, link, false) {
            self.replay_outputs(source, link);
        }
    }

    fn prime_left(&mut self, join: JoinId) {
        let node = &self.net.joins[join];
        if let Some(placeholder) = node.placeholder {
            if self.net.matches[placeholder].marker.is_none() {
                self.network_assert_left(placeholder, join);
            }
            self.net.joins[join].placeholder_primed = true;
            return;
        }
        if node.first_join {
            if let Some(RightEntry::Pattern(pattern)) = node.right_entry {
                if !self.net.patterns[pattern].initialize {
                    for entry in self.net.pattern_entries(pattern) {
                        self.network_assert(entry, join);
                    }
                }
            }
            return;
        }
        let Some(prev) = node.last_level else {
            return;
        };
        if self.net.joins[prev].initialize {
            return;
        }
        let link = JoinLink {
            join,
            enter: Side::Left,
        };
        if !self.copy_from_sibling(prev, link, true) {
            self.replay_outputs(prev, link);
        }
    }

    /// Duplicates the rows an initialized successor of `source` holds into
    /// `link`. Returns false when no such successor exists.
    fn copy_from_sibling(&mut self, source: JoinId, link: JoinLink, assert: bool) -> bool {
        let sibling = self.net.joins[source]
            .next_links
            .iter()
            .copied()
            .find(|l| l.join != link.join && !self.net.joins[l.join].initialize);
        let Some(sibling) = sibling else {
            return false;
        };
        let rows = self.net.joins[sibling.join]
            .memory(sibling.enter)
            .map_or_else(Vec::new, |m| m.entries(&self.net.matches));
        tracing::trace!(?source, from = ?sibling.join, to = ?link.join, rows = rows.len(), "priming from sibling");

        for row in rows {
            if !self.net.is_live(row) {
                continue;
            }
            let (binds, lhs, rhs) = {
                let pm = &self.net.matches[row];
                (pm.binds.clone(), pm.left_parent, pm.right_parent)
            };
            let copy = self
                .net
                .matches
                .insert(PartialMatch::new(binds, Owner::Join(link.join)));
            let hash = self.entry_hash(link, copy);
            self.net.link_row(copy, lhs, rhs, link.join, hash, link.enter);
            if assert {
                self.network_assert_left(copy, link.join);
            }
        }
        true
    }

    /// Recomputes what `source` would have sent down `link`.
    fn replay_outputs(&mut self, source: JoinId, link: JoinLink) {
        let node = &self.net.joins[source];
        tracing::trace!(?source, to = ?link.join, "replaying join outputs");
        let exists = node.exists;
        let blocks = node.blocks();

        if let Some(placeholder) = node.placeholder {
            let marked = self.net.matches[placeholder].marker.is_some();
            let emit = marked == exists
                && self.eval_join(source, Some(placeholder), None, JoinTest::Secondary);
            if emit {
                self.epm_drive_links(placeholder, &[link]);
            }
            return;
        }

        if node.first_join {
            let Some(RightEntry::Pattern(pattern)) = node.right_entry else {
                return;
            };
            for entry in self.net.pattern_entries(pattern) {
                if self.net.is_live(entry)
                    && self.eval_join(source, None, Some(entry), JoinTest::Network)
                {
                    self.copy_drive(entry, &[link]);
                }
            }
            return;
        }

        let right_entry = node.right_entry;
        let rows = node
            .left_memory
            .as_ref()
            .map_or_else(Vec::new, |m| m.entries(&self.net.matches));
        for lhs in rows {
            if !self.net.is_live(lhs) {
                continue;
            }
            if blocks {
                let marked = self.net.matches[lhs].marker.is_some();
                let emit = marked == exists
                    && self.eval_join(source, Some(lhs), None, JoinTest::Secondary);
                if emit {
                    self.pp_drive_links(lhs, None, &[link]);
                }
                continue;
            }
            let Some(RightEntry::Pattern(pattern)) = right_entry else {
                continue;
            };
            let hash = self.net.matches[lhs].hash_value;
            let candidates = chain_from(&self.net.matches, self.net.alpha.bucket_head(pattern, hash));
            for rhs in candidates {
                if self.net.is_live(rhs)
                    && self.net.matches[rhs].hash_value == hash
                    && self.eval_join(source, Some(lhs), Some(rhs), JoinTest::Network)
                {
                    self.pp_drive_links(lhs, Some(rhs), &[link]);
                }
            }
        }
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Returns every placeholder to its unprimed state.
    pub(crate) fn clear_placeholders(&mut self) {
        for (join, placeholder) in self.net.placeholder_joins() {
            if self.net.matches[placeholder].children.is_some() {
                self.pos_entry_retract_beta(placeholder);
            }
            self.net.remove_blocked_link(placeholder);
            self.net.joins[join].placeholder_primed = false;
        }
    }

    /// Lets every unblocked placeholder propagate.
    pub(crate) fn prime_placeholders(&mut self) {
        for (join, placeholder) in self.net.placeholder_joins() {
            if self.net.matches[placeholder].marker.is_none() {
                self.network_assert_left(placeholder, join);
            }
            self.net.joins[join].placeholder_primed = true;
        }
    }
}
