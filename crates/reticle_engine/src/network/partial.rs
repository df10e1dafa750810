//! Partial matches and the alpha-level records they bind.

use std::rc::Rc;

use reticle_foundation::EntityRef;
use reticle_storage::SlotKey;

use super::arena::arena_key;
use super::join::JoinId;
use super::pattern::PatternId;

arena_key!(
    /// Handle to a partial match.
    MatchId,
    "pm"
);

/// The span a multifield constraint bound within one slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MultifieldMarker {
    /// Slot the marker belongs to.
    pub slot: SlotKey,
    /// Index of the constraint within the slot's pattern.
    pub field: u16,
    /// First bound element.
    pub start: usize,
    /// Number of bound elements.
    pub len: usize,
}

impl MultifieldMarker {
    /// One past the last bound element.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// One entity that satisfied one pattern, plus its multifield bindings.
///
/// Shared by reference between the alpha memory entry and every beta row
/// that binds it.
#[derive(Debug)]
pub(crate) struct AlphaMatch {
    pub(crate) entity: EntityRef,
    pub(crate) markers: Vec<MultifieldMarker>,
}

pub(crate) type Bind = Option<Rc<AlphaMatch>>;

/// Which node a partial match is stored in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Owner {
    Pattern(PatternId),
    Join(JoinId),
}

/// A tuple of bindings stored in an alpha or beta memory.
#[derive(Debug)]
pub(crate) struct PartialMatch {
    pub(crate) binds: Vec<Bind>,
    pub(crate) hash_value: u64,
    pub(crate) owner: Owner,
    /// False for alpha memory entries.
    pub(crate) beta_memory: bool,
    pub(crate) rhs_memory: bool,
    pub(crate) busy: bool,
    /// Set once the match is scheduled for removal.
    pub(crate) deleting: bool,
    /// Set on terminal rows whose activation is on the agenda.
    pub(crate) activation: bool,

    pub(crate) prev_in_memory: Option<MatchId>,
    pub(crate) next_in_memory: Option<MatchId>,

    pub(crate) children: Option<MatchId>,
    pub(crate) left_parent: Option<MatchId>,
    pub(crate) prev_left_child: Option<MatchId>,
    pub(crate) next_left_child: Option<MatchId>,
    pub(crate) right_parent: Option<MatchId>,
    pub(crate) prev_right_child: Option<MatchId>,
    pub(crate) next_right_child: Option<MatchId>,

    /// The right-side match currently blocking this row.
    pub(crate) marker: Option<MatchId>,
    /// Head of the rows this match blocks.
    pub(crate) block_list: Option<MatchId>,
    pub(crate) prev_blocked: Option<MatchId>,
    pub(crate) next_blocked: Option<MatchId>,

    /// Entities whose logical support includes this row.
    pub(crate) dependents: Vec<EntityRef>,
}

impl PartialMatch {
    pub(crate) fn new(binds: Vec<Bind>, owner: Owner) -> Self {
        Self {
            binds,
            hash_value: 0,
            owner,
            beta_memory: true,
            rhs_memory: false,
            busy: false,
            deleting: false,
            activation: false,
            prev_in_memory: None,
            next_in_memory: None,
            children: None,
            left_parent: None,
            prev_left_child: None,
            next_left_child: None,
            right_parent: None,
            prev_right_child: None,
            next_right_child: None,
            marker: None,
            block_list: None,
            prev_blocked: None,
            next_blocked: None,
            dependents: Vec::new(),
        }
    }

    pub(crate) fn alpha(alpha: Rc<AlphaMatch>, pattern: PatternId, hash_value: u64) -> Self {
        let mut pm = Self::new(vec![Some(alpha)], Owner::Pattern(pattern));
        pm.beta_memory = false;
        pm.hash_value = hash_value;
        pm
    }

    pub(crate) fn bcount(&self) -> usize {
        self.binds.len()
    }

    pub(crate) fn join(&self) -> Option<JoinId> {
        match self.owner {
            Owner::Join(j) => Some(j),
            Owner::Pattern(_) => None,
        }
    }

    /// Entities bound by this row, in pattern order.
    pub(crate) fn entities(&self) -> Vec<Option<EntityRef>> {
        self.binds
            .iter()
            .map(|b| b.as_ref().map(|a| a.entity))
            .collect()
    }

    /// True when the first `depth` binds are the same alpha matches as `prefix`.
    pub(crate) fn has_prefix(&self, prefix: &[Bind]) -> bool {
        self.binds.len() >= prefix.len()
            && self.binds.iter().zip(prefix).all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            })
    }
}
