//! Evaluation-error trails.
//!
//! A constraint that fails to evaluate is treated as failed (or, on a
//! negated join, as passed) and never aborts propagation. What it leaves
//! behind is an [`ErrorTrail`] naming the entity, the slot, and every rule
//! whose network contains the failing node.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use reticle_foundation::{EntityRef, Error, SymbolId};
use reticle_storage::SlotKey;

use crate::network::{JoinId, Network, PatternId};

/// One recorded constraint evaluation failure.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorTrail {
    /// The evaluation error text.
    pub message: String,
    /// Entity under test, if the failure happened in the pattern network.
    pub entity: Option<EntityRef>,
    /// Slot under test, if known.
    pub slot: Option<SlotKey>,
    /// Every affected rule, with the pattern index of the failing node in it.
    pub rules: Vec<(u16, SymbolId)>,
}

impl ErrorTrail {
    pub(crate) fn new(error: &Error, entity: Option<EntityRef>, slot: Option<SlotKey>) -> Self {
        Self {
            message: error.to_string(),
            entity,
            slot,
            rules: Vec::new(),
        }
    }

    /// Names of the affected rules.
    #[must_use]
    pub fn rule_names(&self) -> Vec<SymbolId> {
        self.rules.iter().map(|(_, name)| *name).collect()
    }
}

impl fmt::Display for ErrorTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(entity) = self.entity {
            write!(f, " while matching {entity}")?;
        }
        if let Some(slot) = &self.slot {
            write!(f, " slot {slot:?}")?;
        }
        for (pattern, rule) in &self.rules {
            write!(f, "\n  pattern #{} of rule #{}", pattern + 1, rule.index())?;
        }
        Ok(())
    }
}

impl Network {
    /// Walks from a join down to every terminal reachable from it.
    pub(crate) fn rules_through(&self, join: JoinId) -> Vec<(u16, SymbolId)> {
        let Some(node) = self.joins.get(join) else {
            return Vec::new();
        };
        let pattern = node.depth.saturating_sub(1);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([join]);
        let mut out = Vec::new();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.joins.get(id) else {
                continue;
            };
            if let Some(rule) = node.rule_to_activate.and_then(|r| self.rules.get(r)) {
                if !out.contains(&(pattern, rule.name)) {
                    out.push((pattern, rule.name));
                }
            }
            queue.extend(node.next_links.iter().map(|link| link.join));
        }
        out
    }

    /// Rules fed by any of the given patterns.
    pub(crate) fn rules_for_patterns(&self, patterns: &[PatternId]) -> Vec<(u16, SymbolId)> {
        let mut out = Vec::new();
        for pattern in patterns {
            let Some(header) = self.patterns.get(*pattern) else {
                continue;
            };
            for join in &header.entry_joins {
                for entry in self.rules_through(*join) {
                    if !out.contains(&entry) {
                        out.push(entry);
                    }
                }
            }
        }
        out
    }
}
