//! The Rete network: node arenas, memories, and the lineage links between
//! partial matches.
//!
//! Everything here is bookkeeping. Propagation lives in [`crate::drive`],
//! retraction in [`crate::retract`].

pub(crate) mod alpha_memory;
pub(crate) mod arena;
pub(crate) mod join;
pub(crate) mod memory;
pub(crate) mod partial;
pub(crate) mod pattern;

use std::collections::HashMap;
use std::rc::Rc;

use reticle_foundation::{EntityRef, Error, SymbolId};

use crate::alpha::{FactNetwork, ObjectNetwork};
use crate::config::EngineConfig;
use crate::diagnostics::ErrorTrail;
use crate::expr::Side;
use crate::logical::LogicalState;
use crate::rule::{Rule, RuleId};

pub use alpha_memory::ALPHA_MEMORY_HASH_SIZE;
pub use join::{JoinId, JoinInfo, JoinLink, JoinStats};
pub use memory::{BETA_GROWTH_FACTOR, INITIAL_BETA_HASH_SIZE};
pub use partial::{MatchId, MultifieldMarker};
pub use pattern::PatternId;

pub(crate) use alpha_memory::AlphaMemory;
pub(crate) use arena::Arena;
pub(crate) use join::{JoinNode, RightEntry};
pub(crate) use memory::{BetaMemory, Matches};
pub(crate) use partial::{AlphaMatch, Bind, Owner, PartialMatch};
pub(crate) use pattern::PatternHeader;

/// Maximum number of error trails retained.
const MAX_ERROR_TRAILS: usize = 64;

/// All network state owned by one engine.
#[derive(Debug)]
pub(crate) struct Network {
    pub(crate) matches: Matches,
    pub(crate) joins: Arena<JoinId, JoinNode>,
    pub(crate) patterns: Arena<PatternId, PatternHeader>,
    pub(crate) alpha: AlphaMemory,
    pub(crate) facts: FactNetwork,
    pub(crate) objects: ObjectNetwork,
    pub(crate) rules: Arena<RuleId, Rule>,
    pub(crate) rule_names: HashMap<SymbolId, RuleId>,
    /// Alpha matches per entity.
    pub(crate) entity_matches: HashMap<EntityRef, Vec<MatchId>>,
    /// Matches unlinked while busy, awaiting release.
    pub(crate) garbage: Vec<MatchId>,
    pub(crate) logical: LogicalState,
    pub(crate) incremental_reset: bool,
    pub(crate) beta_hash_size: usize,
    pub(crate) trails: Vec<ErrorTrail>,
    /// First structural fault of the current operation.
    pub(crate) fault: Option<Error>,
}

impl Network {
    pub(crate) fn new(config: &EngineConfig) -> Self {
        Self {
            matches: Matches::new(),
            joins: Arena::new(),
            patterns: Arena::new(),
            alpha: AlphaMemory::new(config.alpha_hash_size),
            facts: FactNetwork::default(),
            objects: ObjectNetwork::default(),
            rules: Arena::new(),
            rule_names: HashMap::new(),
            entity_matches: HashMap::new(),
            garbage: Vec::new(),
            logical: LogicalState::default(),
            incremental_reset: false,
            beta_hash_size: config.initial_beta_hash_size,
            trails: Vec::new(),
            fault: None,
        }
    }

    /// Logs a broken network invariant. The first one is handed back to
    /// the caller when the operation finishes.
    pub(crate) fn structural_fault(&mut self, err: Error) {
        tracing::error!(%err, "structural fault");
        self.fault.get_or_insert(err);
    }

    pub(crate) fn push_trail(&mut self, trail: ErrorTrail) {
        if self.trails.len() == MAX_ERROR_TRAILS {
            self.trails.remove(0);
        }
        self.trails.push(trail);
    }

    // =========================================================================
    // Alpha Memory
    // =========================================================================

    /// Stores a new alpha match for a pattern.
    pub(crate) fn add_alpha_match(
        &mut self,
        pattern: PatternId,
        alpha: Rc<AlphaMatch>,
        hash: u64,
    ) -> MatchId {
        let entity = alpha.entity;
        let id = self.matches.insert(PartialMatch::alpha(alpha, pattern, hash));
        let header = &mut self.patterns[pattern];
        self.alpha
            .insert(&mut self.matches, &mut header.memory, pattern, id);
        self.entity_matches.entry(entity).or_default().push(id);
        id
    }

    /// Unlinks an alpha match from its memory and frees it.
    pub(crate) fn remove_alpha_match(&mut self, id: MatchId) {
        let Owner::Pattern(pattern) = self.matches[id].owner else {
            return;
        };
        let entity = self.matches[id].binds[0].as_ref().map(|a| a.entity);
        if let Some(header) = self.patterns.get_mut(pattern) {
            self.alpha
                .remove(&mut self.matches, &mut header.memory, pattern, id);
        }
        if let Some(entity) = entity {
            if let Some(list) = self.entity_matches.get_mut(&entity) {
                list.retain(|m| *m != id);
                if list.is_empty() {
                    self.entity_matches.remove(&entity);
                }
            }
        }
        self.release(id);
    }

    /// Every alpha match of a pattern.
    pub(crate) fn pattern_entries(&self, pattern: PatternId) -> Vec<MatchId> {
        self.alpha
            .entries(&self.matches, &self.patterns[pattern].memory)
    }

    // =========================================================================
    // Beta Memory Links
    // =========================================================================

    /// Stores a new row in a join memory and links it under its parents.
    pub(crate) fn link_row(
        &mut self,
        id: MatchId,
        lhs: Option<MatchId>,
        rhs: Option<MatchId>,
        join: JoinId,
        hash: u64,
        side: Side,
    ) {
        {
            let pm = &mut self.matches[id];
            pm.owner = Owner::Join(join);
            pm.hash_value = hash;
            pm.rhs_memory = side == Side::Right;
        }
        let node = &mut self.joins[join];
        if let Some(memory) = node.memory_mut(side) {
            memory.insert(&mut self.matches, id, side == Side::Right);
        }
        node.stats.memory_adds += 1;
        if let Some(r) = rhs {
            self.add_child(r, id);
        }
        if let Some(l) = lhs {
            self.add_child(l, id);
        }
    }

    /// Unlinks a row from its memory, parents, and blocker.
    pub(crate) fn unlink_row(&mut self, id: MatchId) {
        self.remove_blocked_link(id);
        let (owner, side) = {
            let pm = &self.matches[id];
            (pm.join(), if pm.rhs_memory { Side::Right } else { Side::Left })
        };
        if let Some(join) = owner {
            if let Some(node) = self.joins.get_mut(join) {
                if let Some(memory) = node.memory_mut(side) {
                    memory.remove(&mut self.matches, id);
                }
                node.stats.memory_deletes += 1;
            }
        }
        if let Some(l) = self.matches[id].left_parent {
            self.remove_child(l, id);
        }
        if let Some(r) = self.matches[id].right_parent {
            self.remove_child(r, id);
        }
    }

    /// Adds `child` at the head of `parent`'s children.
    ///
    /// Beta parents chain children through the left links, alpha parents
    /// through the right links.
    fn add_child(&mut self, parent: MatchId, child: MatchId) {
        let via_left = self.matches[parent].beta_memory;
        let old = self.matches[parent].children;
        {
            let c = &mut self.matches[child];
            if via_left {
                c.left_parent = Some(parent);
                c.prev_left_child = None;
                c.next_left_child = old;
            } else {
                c.right_parent = Some(parent);
                c.prev_right_child = None;
                c.next_right_child = old;
            }
        }
        if let Some(o) = old {
            if via_left {
                self.matches[o].prev_left_child = Some(child);
            } else {
                self.matches[o].prev_right_child = Some(child);
            }
        }
        self.matches[parent].children = Some(child);
    }

    fn remove_child(&mut self, parent: MatchId, child: MatchId) {
        let Some(p) = self.matches.get(parent) else {
            return;
        };
        let via_left = p.beta_memory;
        let (prev, next) = {
            let c = &mut self.matches[child];
            if via_left {
                c.left_parent = None;
                (c.prev_left_child.take(), c.next_left_child.take())
            } else {
                c.right_parent = None;
                (c.prev_right_child.take(), c.next_right_child.take())
            }
        };
        match prev {
            Some(p) if via_left => self.matches[p].next_left_child = next,
            Some(p) => self.matches[p].next_right_child = next,
            None => self.matches[parent].children = next,
        }
        match next {
            Some(n) if via_left => self.matches[n].prev_left_child = prev,
            Some(n) => self.matches[n].prev_right_child = prev,
            None => {}
        }
    }

    /// The child after `child` in its parent's list.
    pub(crate) fn next_sibling(&self, parent: MatchId, child: MatchId) -> Option<MatchId> {
        if self.matches[parent].beta_memory {
            self.matches[child].next_left_child
        } else {
            self.matches[child].next_right_child
        }
    }

    /// Children of a match, head first.
    pub(crate) fn children_of(&self, parent: MatchId) -> Vec<MatchId> {
        let mut out = Vec::new();
        let mut cursor = self.matches[parent].children;
        while let Some(c) = cursor {
            out.push(c);
            cursor = self.next_sibling(parent, c);
        }
        out
    }

    // =========================================================================
    // Blocking
    // =========================================================================

    /// Records that `blocker` blocks `row`.
    pub(crate) fn add_blocked_link(&mut self, row: MatchId, blocker: MatchId) {
        let old = self.matches[blocker].block_list;
        {
            let r = &mut self.matches[row];
            r.marker = Some(blocker);
            r.prev_blocked = None;
            r.next_blocked = old;
        }
        if let Some(o) = old {
            self.matches[o].prev_blocked = Some(row);
        }
        self.matches[blocker].block_list = Some(row);
    }

    /// Clears whatever blocks `row`.
    pub(crate) fn remove_blocked_link(&mut self, row: MatchId) {
        let Some(blocker) = self.matches[row].marker.take() else {
            return;
        };
        let (prev, next) = {
            let r = &mut self.matches[row];
            (r.prev_blocked.take(), r.next_blocked.take())
        };
        match prev {
            Some(p) => self.matches[p].next_blocked = next,
            None => {
                if let Some(b) = self.matches.get_mut(blocker) {
                    b.block_list = next;
                }
            }
        }
        if let Some(n) = next {
            self.matches[n].prev_blocked = prev;
        }
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Frees an unlinked match, or parks it in the garbage list while busy.
    pub(crate) fn release(&mut self, id: MatchId) {
        let pm = &mut self.matches[id];
        if pm.busy {
            pm.deleting = true;
            self.garbage.push(id);
        } else {
            self.matches.remove(id);
        }
    }

    /// Frees parked matches that are no longer busy.
    pub(crate) fn flush_garbage(&mut self) {
        let parked = std::mem::take(&mut self.garbage);
        for id in parked {
            match self.matches.get(id) {
                Some(pm) if pm.busy => self.garbage.push(id),
                Some(_) => {
                    self.matches.remove(id);
                }
                None => {}
            }
        }
    }

    /// Flags a match and all its descendants as on their way out.
    pub(crate) fn mark_deleting(&mut self, root: MatchId, include_root: bool) {
        let mut stack = if include_root {
            vec![root]
        } else {
            self.children_of(root)
        };
        while let Some(id) = stack.pop() {
            self.matches[id].deleting = true;
            stack.extend(self.children_of(id));
        }
    }

    /// True if the match exists and is not on its way out.
    pub(crate) fn is_live(&self, id: MatchId) -> bool {
        self.matches.get(id).is_some_and(|pm| !pm.deleting)
    }
}
