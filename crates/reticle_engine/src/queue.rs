//! Entity changes held back while pattern matching is delayed.
//!
//! Working memory is updated immediately; only the network update waits.
//! Queued changes coalesce per entity, and retractions always run ahead of
//! queued asserts and modifies.

use std::collections::VecDeque;

use reticle_foundation::EntityRef;
use reticle_storage::SlotKey;

/// One deferred network update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAction {
    /// The entity is new to the network.
    Assert(EntityRef),
    /// These slots of an instance changed.
    Modify(EntityRef, Vec<SlotKey>),
    /// The entity left working memory.
    Retract(EntityRef),
}

impl PendingAction {
    /// The entity the action concerns.
    #[must_use]
    pub fn entity(&self) -> EntityRef {
        match self {
            Self::Assert(e) | Self::Modify(e, _) | Self::Retract(e) => *e,
        }
    }

    fn is_retract(&self) -> bool {
        matches!(self, Self::Retract(_))
    }
}

/// Queue of deferred network updates. Retractions form a prefix.
#[derive(Clone, Debug, Default)]
pub struct PendingActions {
    actions: VecDeque<PendingAction>,
}

impl PendingActions {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterates in drain order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter()
    }

    fn position(&self, entity: EntityRef) -> Option<usize> {
        self.actions.iter().position(|a| a.entity() == entity)
    }

    /// Queues a new entity.
    pub fn push_assert(&mut self, entity: EntityRef) {
        if self.position(entity).is_none() {
            self.actions.push_back(PendingAction::Assert(entity));
        }
    }

    /// Queues a slot change. Absorbed by a queued assert, merged into a
    /// queued modify.
    pub fn push_modify(&mut self, entity: EntityRef, slots: &[SlotKey]) {
        let Some(i) = self.position(entity) else {
            self.actions
                .push_back(PendingAction::Modify(entity, slots.to_vec()));
            return;
        };
        if let PendingAction::Modify(_, queued) = &mut self.actions[i] {
            for slot in slots {
                if !queued.contains(slot) {
                    queued.push(*slot);
                }
            }
        }
    }

    /// Queues a removal. Cancels a queued assert outright, replaces a
    /// queued modify.
    pub fn push_retract(&mut self, entity: EntityRef) {
        if let Some(i) = self.position(entity) {
            match self.actions[i] {
                PendingAction::Assert(_) => {
                    self.actions.remove(i);
                    return;
                }
                PendingAction::Retract(_) => return,
                PendingAction::Modify(..) => {
                    self.actions.remove(i);
                }
            }
        }
        let at = self
            .actions
            .iter()
            .position(|a| !a.is_retract())
            .unwrap_or(self.actions.len());
        self.actions.insert(at, PendingAction::Retract(entity));
    }

    /// Empties the queue, returning its contents in drain order.
    pub fn take(&mut self) -> Vec<PendingAction> {
        self.actions.drain(..).collect()
    }

    /// Drops every queued action.
    pub fn clear(&mut self) {
        self.actions.clear();
    }
}
