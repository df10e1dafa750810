//! Logical dependencies (truth maintenance).
//!
//! An entity asserted while a rule with a `logical` block fires is
//! supported by the row of the rule's logical join. When every supporting
//! row is destroyed through retraction, the entity is queued and later
//! retracted by the engine. Rows discarded by rule removal drop their edges
//! without queueing anything.

use std::collections::{HashMap, VecDeque};

use reticle_foundation::EntityRef;

use crate::network::{JoinId, MatchId, Network, Owner};

/// Support edges and the pending-retraction queue.
#[derive(Debug, Default)]
pub(crate) struct LogicalState {
    /// Supporting rows per entity. Absent means unconditional.
    pub(crate) support: HashMap<EntityRef, Vec<MatchId>>,
    /// Entities that lost their last support, oldest first.
    pub(crate) pending: VecDeque<EntityRef>,
    /// Set while the pending queue is being drained.
    pub(crate) draining: bool,
    /// Set while a rule action runs.
    pub(crate) firing: bool,
    /// The row granting support to entities asserted by the current action.
    pub(crate) current: Option<MatchId>,
}

impl LogicalState {
    pub(crate) fn clear(&mut self) {
        self.support.clear();
        self.pending.clear();
        self.current = None;
    }
}

impl Network {
    /// The ancestor of `basis` stored in the left memory of `logical_join`.
    pub(crate) fn find_logical_bind(&self, basis: MatchId, logical_join: JoinId) -> Option<MatchId> {
        let mut cursor = Some(basis);
        while let Some(id) = cursor {
            let pm = self.matches.get(id)?;
            if pm.owner == Owner::Join(logical_join) && !pm.rhs_memory {
                return Some(id);
            }
            cursor = pm.left_parent;
        }
        None
    }

    /// Records support for an entity asserted by the current action.
    ///
    /// `existing` is true when the assert found an identical live entity.
    /// Returns false when the action is logical but its supporting row is
    /// gone, in which case a new entity must not be kept.
    pub(crate) fn add_logical_dependencies(&mut self, entity: EntityRef, existing: bool) -> bool {
        let current = self.logical.current.filter(|_| self.logical.firing);
        let Some(row) = current else {
            if existing {
                self.remove_entity_dependencies(entity);
            }
            return true;
        };
        if existing && !self.logical.support.contains_key(&entity) {
            return true;
        }
        if !self.is_live(row) {
            return false;
        }
        let rows = self.logical.support.entry(entity).or_default();
        if !rows.contains(&row) {
            rows.push(row);
            self.matches[row].dependents.push(entity);
        }
        true
    }

    /// Drops every support edge of an entity, making it unconditional.
    pub(crate) fn remove_entity_dependencies(&mut self, entity: EntityRef) {
        let Some(rows) = self.logical.support.remove(&entity) else {
            return;
        };
        for row in rows {
            if let Some(pm) = self.matches.get_mut(row) {
                pm.dependents.retain(|e| *e != entity);
            }
        }
    }

    /// Withdraws a destroyed row's support and queues orphaned entities.
    pub(crate) fn remove_logical_support(&mut self, row: MatchId) {
        for entity in std::mem::take(&mut self.matches[row].dependents) {
            if self.drop_edge(entity, row) {
                tracing::debug!(%entity, "logical support lost");
                self.logical.pending.push_back(entity);
            }
        }
    }

    /// Discards a row's support edges without retracting anything.
    pub(crate) fn remove_pm_dependencies(&mut self, row: MatchId) {
        for entity in std::mem::take(&mut self.matches[row].dependents) {
            self.drop_edge(entity, row);
        }
    }

    /// Removes one edge. True when it was the entity's last.
    fn drop_edge(&mut self, entity: EntityRef, row: MatchId) -> bool {
        let Some(rows) = self.logical.support.get_mut(&entity) else {
            return false;
        };
        rows.retain(|r| *r != row);
        if rows.is_empty() {
            self.logical.support.remove(&entity);
            true
        } else {
            false
        }
    }

    /// True if the entity currently depends on logical support.
    pub(crate) fn is_logically_supported(&self, entity: EntityRef) -> bool {
        self.logical.support.contains_key(&entity)
    }
}
