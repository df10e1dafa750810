//! The interface to conflict resolution.
//!
//! The network raises exactly one activation per terminal row and removes
//! it when that row is destroyed. Which activation fires next is the
//! agenda's business; [`ActivationList`] is a simple salience-then-recency
//! ordering used when the caller brings nothing better.

use reticle_foundation::{EntityRef, SymbolId};

use crate::network::MatchId;
use crate::rule::RuleId;

// =============================================================================
// Activation
// =============================================================================

/// A rule instantiation ready to fire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activation {
    /// Which rule
    pub rule: RuleId,
    /// Rule name
    pub rule_name: SymbolId,
    /// Rule salience
    pub salience: i32,
    /// The terminal row; stays valid until the activation is removed.
    pub basis: MatchId,
    /// Bound entities in condition order, `None` for not/exists conditions
    pub entities: Vec<Option<EntityRef>>,
    /// Largest time tag among the bound entities
    pub time_tag: u64,
}

/// Receives activation changes from the network.
pub trait Agenda {
    /// A terminal row was created.
    fn add_activation(&mut self, activation: Activation);

    /// The terminal row `basis` of `rule` was destroyed.
    fn remove_activation(&mut self, rule: RuleId, basis: MatchId);

    /// Every activation was dropped (reset).
    fn clear(&mut self);
}

// =============================================================================
// Activation List
// =============================================================================

/// Activations ordered by salience, then by recency.
#[derive(Clone, Debug, Default)]
pub struct ActivationList {
    /// Highest priority first.
    entries: Vec<(Activation, u64)>,
    next_seq: u64,
}

impl ActivationList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of activations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is activated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the activation that would fire next.
    #[must_use]
    pub fn peek(&self) -> Option<&Activation> {
        self.entries.first().map(|(a, _)| a)
    }

    /// Removes and returns the activation that fires next.
    pub fn pop(&mut self) -> Option<Activation> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0).0)
        }
    }

    /// Iterates in firing order.
    pub fn iter(&self) -> impl Iterator<Item = &Activation> {
        self.entries.iter().map(|(a, _)| a)
    }

    /// Activations of one rule, in firing order.
    #[must_use]
    pub fn for_rule(&self, rule: RuleId) -> Vec<&Activation> {
        self.iter().filter(|a| a.rule == rule).collect()
    }

    /// Sorted entity tuples of one rule; handy for comparing match sets.
    #[must_use]
    pub fn tuples(&self, rule: RuleId) -> Vec<Vec<Option<EntityRef>>> {
        let mut out: Vec<_> = self
            .iter()
            .filter(|a| a.rule == rule)
            .map(|a| a.entities.clone())
            .collect();
        out.sort();
        out
    }
}

impl Agenda for ActivationList {
    fn add_activation(&mut self, activation: Activation) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = |a: &Activation, s: u64| (a.salience, a.time_tag, s);
        let new_key = key(&activation, seq);
        let at = self
            .entries
            .iter()
            .position(|(a, s)| key(a, *s) < new_key)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, (activation, seq));
    }

    fn remove_activation(&mut self, rule: RuleId, basis: MatchId) {
        if let Some(at) = self
            .entries
            .iter()
            .position(|(a, _)| a.rule == rule && a.basis == basis)
        {
            self.entries.remove(at);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}
