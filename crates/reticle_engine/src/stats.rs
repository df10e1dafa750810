//! Network-wide counters and per-rule match summaries.

use std::fmt;

use crate::network::{Network, Owner};
use crate::rule::RuleId;

/// Sizes of the network and its memories.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Live join nodes, terminals included.
    pub joins: usize,
    /// Live pattern headers.
    pub patterns: usize,
    /// Alpha network nodes across both trees.
    pub alpha_nodes: usize,
    /// Alpha memory entries.
    pub alpha_matches: usize,
    /// Partial matches held in join memories.
    pub beta_matches: usize,
    /// Matches whose release waits for a rule action to finish.
    pub garbage: usize,
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Joins: {}, Patterns: {} (alpha nodes: {}), Matches: {} alpha / {} beta, Garbage: {}",
            self.joins,
            self.patterns,
            self.alpha_nodes,
            self.alpha_matches,
            self.beta_matches,
            self.garbage
        )
    }
}

/// Partial-match counts for one rule disjunct, as the `matches` command
/// reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleMatches {
    /// Alpha matches per pattern, in the order patterns were built.
    pub patterns: Vec<usize>,
    /// Rows held in the left memory of each condition's join after the
    /// first, then of the terminal.
    pub partial: Vec<usize>,
    /// Rows in the terminal, that is activations raised or fired.
    pub activations: usize,
}

impl Network {
    pub(crate) fn stats(&self) -> NetworkStats {
        NetworkStats {
            joins: self.joins.len(),
            patterns: self.patterns.len(),
            alpha_nodes: self.facts.node_count() + self.objects.node_count(),
            alpha_matches: self.alpha.count(),
            beta_matches: self
                .matches
                .iter()
                .filter(|(_, pm)| matches!(pm.owner, Owner::Join(_)) && pm.bcount() > 0)
                .count(),
            garbage: self.garbage.len(),
        }
    }

    pub(crate) fn rule_matches(&self, rule: RuleId) -> Vec<RuleMatches> {
        let Some(rule) = self.rules.get(rule) else {
            return Vec::new();
        };
        rule.disjuncts
            .iter()
            .map(|d| {
                let left_count = |join| {
                    self.joins
                        .get(join)
                        .and_then(|node| node.left_memory.as_ref())
                        .map_or(0, |m| {
                            m.entries(&self.matches)
                                .into_iter()
                                .filter(|id| self.matches[*id].bcount() > 0)
                                .count()
                        })
                };
                let mut partial: Vec<usize> = d.joins.iter().skip(1).map(|j| left_count(*j)).collect();
                let activations = left_count(d.terminal);
                partial.push(activations);
                RuleMatches {
                    patterns: d
                        .patterns
                        .iter()
                        .map(|p| self.pattern_entries(*p).len())
                        .collect(),
                    partial,
                    activations,
                }
            })
            .collect()
    }
}
