//! Slot allocation with generational indices.
//!
//! The `EntityStore` hands out `EntityId`s for one entity kind and tracks
//! generations so that references held across a retraction are detected as
//! stale instead of silently naming a newer entity.

// Allow u64 to usize casts - we target 64-bit systems
#![allow(clippy::cast_possible_truncation)]

use reticle_foundation::{EntityId, EntityKind, EntityRef, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Allocates entity slots of a single kind.
///
/// Odd generations are alive, even generations are free.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityStore {
    kind: EntityKind,
    generations: Vec<u32>,
    free_list: Vec<u64>,
    live_count: usize,
}

impl EntityStore {
    /// Creates an empty store for the given kind.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            generations: Vec::new(),
            free_list: Vec::new(),
            live_count: 0,
        }
    }

    /// Allocates a slot, reusing freed indices first.
    pub fn spawn(&mut self) -> EntityId {
        self.live_count += 1;
        if let Some(index) = self.free_list.pop() {
            let idx = index as usize;
            self.generations[idx] += 1;
            EntityId::new(index, self.generations[idx])
        } else {
            let index = self.generations.len() as u64;
            self.generations.push(1);
            EntityId::new(index, 1)
        }
    }

    /// Frees a slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is stale or was never allocated.
    pub fn destroy(&mut self, id: EntityId) -> Result<()> {
        self.validate(id)?;
        let idx = id.index as usize;
        self.generations[idx] += 1;
        self.free_list.push(id.index);
        self.live_count -= 1;
        Ok(())
    }

    /// Checks if an id names a live slot.
    #[must_use]
    pub fn exists(&self, id: EntityId) -> bool {
        self.generations
            .get(id.index as usize)
            .is_some_and(|&g| g == id.generation && g % 2 == 1)
    }

    /// Validates that an id names a live slot.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` for unknown or freed slots and `StaleEntity`
    /// when the slot has since been reused.
    pub fn validate(&self, id: EntityId) -> Result<()> {
        let entity = EntityRef { kind: self.kind, id };
        let Some(&current) = self.generations.get(id.index as usize) else {
            return Err(Error::entity_not_found(entity));
        };
        if current == id.generation && current % 2 == 1 {
            return Ok(());
        }
        // Freed and not yet reused: the slot is one generation ahead.
        if current % 2 == 0 && current == id.generation + 1 {
            return Err(Error::entity_not_found(entity));
        }
        Err(Error::stale_entity(entity))
    }

    /// Returns the number of live slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Returns true if there are no live slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Frees every slot, bumping generations so old ids go stale.
    pub fn clear(&mut self) {
        for (idx, generation) in self.generations.iter_mut().enumerate() {
            if *generation % 2 == 1 {
                *generation += 1;
                self.free_list.push(idx as u64);
            }
        }
        self.live_count = 0;
    }
}
