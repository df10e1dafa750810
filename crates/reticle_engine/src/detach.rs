//! Rule removal: joins are detached bottom-up until one still feeds
//! another rule.

use crate::alpha::AlphaNodeRef;
use crate::drive::Propagator;
use crate::network::{JoinId, MatchId, Network, PatternId, RightEntry};
use crate::rule::RuleId;

impl Propagator<'_> {
    /// Removes a rule, its activations, and every node no other rule uses.
    pub(crate) fn remove_rule(&mut self, rule: RuleId) {
        let Some(terminals) = self
            .net
            .rules
            .get(rule)
            .map(|r| r.disjuncts.iter().map(|d| d.terminal).collect::<Vec<_>>())
        else {
            return;
        };
        for terminal in terminals {
            self.detach_join(terminal);
        }
        if let Some(removed) = self.net.rules.remove(rule) {
            self.net.rule_names.remove(&removed.name);
            tracing::debug!(rule = self.wm.interner().name(removed.name), "rule removed");
        }
    }

    fn detach_join(&mut self, join: JoinId) {
        let Some(node) = self.net.joins.get(join) else {
            return;
        };
        if !node.next_links.is_empty() {
            return;
        }
        let (prev, right_entry) = (node.last_level, node.right_entry);
        self.flush_join(join);
        self.net.joins.remove(join);
        tracing::trace!(?join, "join detached");

        if let Some(prev) = prev {
            if let Some(p) = self.net.joins.get_mut(prev) {
                p.next_links.retain(|l| l.join != join);
            }
        }
        match right_entry {
            Some(RightEntry::Pattern(pattern)) => {
                let unused = self.net.patterns.get_mut(pattern).is_some_and(|header| {
                    header.entry_joins.retain(|j| *j != join);
                    header.entry_joins.is_empty()
                });
                if unused {
                    self.net.remove_pattern(pattern);
                }
            }
            Some(RightEntry::Join(source)) => {
                if let Some(s) = self.net.joins.get_mut(source) {
                    s.next_links.retain(|l| l.join != join);
                }
                self.detach_join(source);
            }
            None => {}
        }
        if let Some(prev) = prev {
            self.detach_join(prev);
        }
    }

    /// Discards every row stored in a join's memories. Support edges are
    /// dropped without retracting anything.
    fn flush_join(&mut self, join: JoinId) {
        let node = &self.net.joins[join];
        let mut rows: Vec<MatchId> = Vec::new();
        for memory in [node.left_memory.as_ref(), node.right_memory.as_ref()]
            .into_iter()
            .flatten()
        {
            rows.extend(memory.entries(&self.net.matches));
        }
        for row in rows {
            if self.net.matches[row].activation {
                self.remove_activation(row);
            }
            self.net.remove_blocked_link(row);
            while let Some(blocked) = self.net.matches[row].block_list {
                self.net.remove_blocked_link(blocked);
            }
            self.net.remove_pm_dependencies(row);
            self.net.unlink_row(row);
            self.net.release(row);
        }
    }
}

impl Network {
    /// Removes a pattern no join enters, with its alpha memory and tree path.
    pub(crate) fn remove_pattern(&mut self, pattern: PatternId) {
        for alpha in self.pattern_entries(pattern) {
            while let Some(blocked) = self.matches[alpha].block_list {
                self.remove_blocked_link(blocked);
            }
            self.remove_alpha_match(alpha);
        }
        let Some(header) = self.patterns.remove(pattern) else {
            return;
        };
        match header.node {
            AlphaNodeRef::Fact(node) => self.facts.remove_stop(node, pattern),
            AlphaNodeRef::Object(node) => self.objects.remove_stop(node, pattern),
        }
        tracing::trace!(?pattern, "pattern removed");
    }
}
