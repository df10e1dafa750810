//! Pattern headers: the terminals of the alpha networks.

use std::collections::HashSet;

use reticle_foundation::EntityKind;
use reticle_storage::SlotKey;

use crate::alpha::AlphaNodeRef;
use crate::expr::Expr;

use super::alpha_memory::BucketList;
use super::arena::arena_key;
use super::join::JoinId;

arena_key!(
    /// Handle to a pattern header.
    PatternId,
    "p"
);

/// One distinct pattern and its alpha memory.
#[derive(Debug)]
pub(crate) struct PatternHeader {
    pub(crate) kind: EntityKind,
    pub(crate) node: AlphaNodeRef,
    /// Joins whose right input is this pattern's memory.
    pub(crate) entry_joins: Vec<JoinId>,
    pub(crate) right_hash: Vec<Expr>,
    pub(crate) memory: BucketList,
    pub(crate) initialize: bool,
    /// Slots whose change forces an object pattern to be re-evaluated.
    pub(crate) modify_slots: HashSet<SlotKey>,
}
