//! Working-memory identifiers with generational indices.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier with a generational index for stale reference detection.
///
/// The generation counter increments whenever an index is reused after the
/// entity it named was retracted, so a handle kept across a retraction never
/// resolves to the newcomer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId {
    /// Index into entity storage.
    pub index: u64,
    /// Generation counter for stale reference detection.
    pub generation: u32,
}

impl EntityId {
    /// Creates a new entity ID with the given index and generation.
    #[must_use]
    pub const fn new(index: u64, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index, self.generation)
    }
}

/// The kinds of data entity the pattern network can match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntityKind {
    /// An ordered record built from a template.
    Fact,
    /// An object instance of a user-defined class.
    Instance,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact => write!(f, "fact"),
            Self::Instance => write!(f, "instance"),
        }
    }
}

/// A reference to one live (or formerly live) working-memory entity.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityRef {
    /// Which store the entity lives in.
    pub kind: EntityKind,
    /// Generational identifier within that store.
    pub id: EntityId,
}

impl EntityRef {
    /// Creates a reference to a fact.
    #[must_use]
    pub const fn fact(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Fact,
            id,
        }
    }

    /// Creates a reference to an object instance.
    #[must_use]
    pub const fn instance(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Instance,
            id,
        }
    }

    /// Returns true if this references a fact.
    #[must_use]
    pub const fn is_fact(self) -> bool {
        matches!(self.kind, EntityKind::Fact)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Fact => write!(f, "f-{}v{}", self.id.index, self.id.generation),
            EntityKind::Instance => write!(f, "i-{}v{}", self.id.index, self.id.generation),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Fact => write!(f, "f-{}", self.id.index),
            EntityKind::Instance => write!(f, "i-{}", self.id.index),
        }
    }
}
