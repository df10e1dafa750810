//! Join nodes and the links between them.

use crate::expr::{Expr, Side};
use crate::rule::RuleId;

use super::arena::arena_key;
use super::memory::BetaMemory;
use super::partial::MatchId;
use super::pattern::PatternId;

arena_key!(
    /// Handle to a join node.
    JoinId,
    "j"
);

/// An edge from a join to a successor, entered from one side.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct JoinLink {
    /// The successor join.
    pub join: JoinId,
    /// Which of the successor's inputs this edge feeds.
    pub enter: Side,
}

/// Where a join's right input comes from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RightEntry {
    /// An alpha memory.
    Pattern(PatternId),
    /// The last join of a sub-network (join from the right).
    Join(JoinId),
}

/// Per-join counters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct JoinStats {
    /// Rows linked into either memory.
    pub memory_adds: u64,
    /// Rows unlinked from either memory.
    pub memory_deletes: u64,
    /// Join test evaluations.
    pub comparisons: u64,
}

/// One join node.
#[derive(Debug)]
pub(crate) struct JoinNode {
    pub(crate) first_join: bool,
    pub(crate) negated: bool,
    pub(crate) exists: bool,
    pub(crate) join_from_the_right: bool,
    /// Some rule's logical dependencies hang off this join's left rows.
    pub(crate) logical_join: bool,
    /// Created since the last incremental reset finished.
    pub(crate) initialize: bool,
    pub(crate) depth: u16,
    pub(crate) network_test: Option<Expr>,
    pub(crate) secondary_test: Option<Expr>,
    pub(crate) left_hash: Vec<Expr>,
    pub(crate) right_hash: Vec<Expr>,
    /// `None` only for terminal joins.
    pub(crate) right_entry: Option<RightEntry>,
    pub(crate) last_level: Option<JoinId>,
    pub(crate) left_memory: Option<BetaMemory>,
    pub(crate) right_memory: Option<BetaMemory>,
    pub(crate) next_links: Vec<JoinLink>,
    pub(crate) rule_to_activate: Option<RuleId>,
    /// Left-memory row standing in for the empty left input of a first
    /// join under `not`, `exists`, or a sub-network.
    pub(crate) placeholder: Option<MatchId>,
    pub(crate) placeholder_primed: bool,
    pub(crate) stats: JoinStats,
}

impl JoinNode {
    pub(crate) fn is_terminal(&self) -> bool {
        self.rule_to_activate.is_some()
    }

    /// True for joins whose left rows are blocked rather than extended.
    pub(crate) fn blocks(&self) -> bool {
        self.negated || self.exists || self.join_from_the_right
    }

    /// Sub-network joins without explicit hashes bucket both sides by the
    /// identity of the shared prefix.
    pub(crate) fn prefix_hash(&self) -> bool {
        self.join_from_the_right && self.left_hash.is_empty() && self.right_hash.is_empty()
    }

    /// Number of binds in this join's left rows.
    pub(crate) fn left_width(&self) -> usize {
        usize::from(self.depth.saturating_sub(1))
    }

    pub(crate) fn memory(&self, side: Side) -> Option<&BetaMemory> {
        match side {
            Side::Left => self.left_memory.as_ref(),
            Side::Right => self.right_memory.as_ref(),
        }
    }

    pub(crate) fn memory_mut(&mut self, side: Side) -> Option<&mut BetaMemory> {
        match side {
            Side::Left => self.left_memory.as_mut(),
            Side::Right => self.right_memory.as_mut(),
        }
    }

    pub(crate) fn info(&self) -> JoinInfo {
        JoinInfo {
            first_join: self.first_join,
            negated: self.negated,
            exists: self.exists,
            join_from_the_right: self.join_from_the_right,
            logical: self.logical_join,
            terminal: self.is_terminal(),
            depth: self.depth,
            left_count: self.left_memory.as_ref().map_or(0, BetaMemory::count),
            right_count: self.right_memory.as_ref().map_or(0, BetaMemory::count),
            successors: self.next_links.len(),
            stats: self.stats,
        }
    }
}

/// A read-only summary of a join.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinInfo {
    /// No left input.
    pub first_join: bool,
    /// Negated pattern.
    pub negated: bool,
    /// Existential pattern.
    pub exists: bool,
    /// Right input is a sub-network.
    pub join_from_the_right: bool,
    /// Holds logical support for some rule.
    pub logical: bool,
    /// Raises activations.
    pub terminal: bool,
    /// Number of binds in rows this join produces.
    pub depth: u16,
    /// Rows in the left memory.
    pub left_count: usize,
    /// Rows in the right memory (sub-network joins only).
    pub right_count: usize,
    /// Number of successor links.
    pub successors: usize,
    /// Counters.
    pub stats: JoinStats,
}
