//! The capability interface the pattern network uses to read entities.

use reticle_foundation::{EntityRef, Interner, SymbolId, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Addresses one slot of an entity.
///
/// Facts are addressed by slot position. Instances are addressed by slot
/// name, because subclasses lay out inherited slots differently. The two
/// pseudo slots expose an instance's name and class symbol.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SlotKey {
    /// Positional slot of a fact.
    Position(u16),
    /// Named slot of an instance.
    Named(SymbolId),
    /// The instance name, as a symbol.
    InstanceName,
    /// The class name, as a symbol.
    Class,
}

/// An entity the alpha and join networks can inspect.
pub trait PatternEntity {
    /// Returns the entity's reference.
    fn entity_ref(&self) -> EntityRef;

    /// Returns the recency tag assigned when the entity was last asserted or changed.
    fn time_tag(&self) -> u64;

    /// Returns the value held in a slot, or `None` if the slot does not exist.
    fn slot_value(&self, slot: SlotKey) -> Option<&Value>;

    /// Renders the entity for diagnostics.
    fn describe(&self, interner: &Interner) -> String;
}
