//! Retraction: destroying the descendants of a removed alpha match and
//! re-evaluating the rows it blocked.
//!
//! Before anything is unlinked, the doomed subtree is flagged `deleting`.
//! Candidate scans skip flagged rows, so a row on its way out never blocks,
//! unblocks, or extends anything while the retraction is in flight.

use reticle_foundation::{EntityRef, Error};
use reticle_storage::SlotKey;

use crate::drive::{JoinTest, Propagator};
use crate::network::memory::chain_from;
use crate::network::{JoinId, MatchId, Network, Owner, RightEntry};

impl Network {
    /// Alpha matches of an entity. With `changed` set, only those of
    /// patterns sensitive to one of the slots (object modify).
    pub(crate) fn entity_alphas(&self, entity: EntityRef, changed: Option<&[SlotKey]>) -> Vec<MatchId> {
        let Some(all) = self.entity_matches.get(&entity) else {
            return Vec::new();
        };
        let Some(changed) = changed else {
            return all.clone();
        };
        all.iter()
            .copied()
            .filter(|id| match self.matches[*id].owner {
                Owner::Pattern(p) => self
                    .patterns
                    .get(p)
                    .is_some_and(|h| changed.iter().any(|s| h.modify_slots.contains(s))),
                Owner::Join(_) => false,
            })
            .collect()
    }
}

impl Propagator<'_> {
    /// Removes the alpha matches of an entity and everything built on them.
    pub(crate) fn retract_entity(&mut self, entity: EntityRef, changed: Option<&[SlotKey]>) {
        let alphas = self.net.entity_alphas(entity, changed);
        tracing::trace!(%entity, count = alphas.len(), "retracting alpha matches");
        self.network_retract(&alphas);
    }

    /// Retracts a batch of alpha matches.
    pub(crate) fn network_retract(&mut self, alphas: &[MatchId]) {
        for &alpha in alphas {
            self.net.mark_deleting(alpha, true);
        }
        for &alpha in alphas {
            if self.net.matches[alpha].children.is_some() {
                self.pos_entry_retract_alpha(alpha);
            }
            if self.net.matches[alpha].block_list.is_some() {
                self.neg_entry_retract_alpha(alpha);
            }
        }
        for &alpha in alphas {
            self.net.remove_alpha_match(alpha);
        }
    }

    /// Destroys every row built on an alpha match.
    fn pos_entry_retract_alpha(&mut self, alpha: MatchId) {
        while let Some(child) = self.net.matches[alpha].children {
            if self.net.matches[child].children.is_some() {
                self.pos_entry_retract_beta(child);
            }
            self.delete_row(child);
        }
    }

    /// Destroys every descendant of `root`, leaving `root` itself alone.
    pub(crate) fn pos_entry_retract_beta(&mut self, root: MatchId) {
        self.net.mark_deleting(root, false);
        while let Some(mut cursor) = self.net.matches[root].children {
            while let Some(child) = self.net.matches[cursor].children {
                cursor = child;
            }
            self.delete_row(cursor);
        }
    }

    /// Tears down one leaf row.
    pub(crate) fn delete_row(&mut self, row: MatchId) {
        if self.net.matches[row].block_list.is_some() {
            self.neg_entry_retract_alpha(row);
        }
        if self.net.matches[row].activation {
            self.remove_activation(row);
        }
        self.net.unlink_row(row);
        if !self.net.matches[row].dependents.is_empty() {
            self.net.remove_logical_support(row);
        }
        self.net.release(row);
    }

    // =========================================================================
    // Unblocking
    // =========================================================================

    /// Re-evaluates every row blocked by a departing match.
    fn neg_entry_retract_alpha(&mut self, blocker: MatchId) {
        while let Some(row) = self.net.matches[blocker].block_list {
            let Some(join) = self.net.matches[row].join() else {
                self.net.structural_fault(Error::internal(format!(
                    "row {row:?} blocked by {blocker:?} is outside any join"
                )));
                self.net.remove_blocked_link(row);
                continue;
            };
            self.neg_entry_retract_beta(join, blocker, row);
        }
    }

    /// A row lost its blocker: find another one, or propagate (`not`) or
    /// retract (`exists`).
    fn neg_entry_retract_beta(&mut self, join: JoinId, blocker: MatchId, row: MatchId) {
        self.net.remove_blocked_link(row);
        if self.net.matches[row].deleting {
            return;
        }
        if self.find_next_conflicting_match(join, blocker, row) {
            return;
        }
        let node = &self.net.joins[join];
        if node.exists {
            if self.net.matches[row].children.is_some() {
                self.pos_entry_retract_beta(row);
            }
            return;
        }
        if self.eval_join(join, Some(row), None, JoinTest::Secondary) {
            self.drive_unblocked(row, join);
        }
    }

    /// Looks for a different right-side match that still blocks `row`,
    /// and blocks on it if found.
    fn find_next_conflicting_match(&mut self, join: JoinId, blocker: MatchId, row: MatchId) -> bool {
        let node = &self.net.joins[join];
        let first = node.first_join;
        let hash = self.net.matches[row].hash_value;
        let candidates = match node.right_entry {
            Some(RightEntry::Pattern(pattern)) if first => self.net.pattern_entries(pattern),
            _ => chain_from(
                &self.net.matches,
                self.net
                    .matches
                    .get(blocker)
                    .and_then(|b| b.next_in_memory),
            ),
        };

        for candidate in candidates {
            if candidate == blocker || !self.net.is_live(candidate) {
                continue;
            }
            if !first && self.net.matches[candidate].hash_value != hash {
                continue;
            }
            let lhs = if first { None } else { Some(row) };
            if self.eval_join(join, lhs, Some(candidate), JoinTest::Network) {
                self.net.add_blocked_link(row, candidate);
                return true;
            }
        }
        false
    }
}
