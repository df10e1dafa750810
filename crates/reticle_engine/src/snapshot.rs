//! Structural snapshot of the join network.
//!
//! One marking pass assigns dense IDs: rules in definition order, then for
//! each disjunct the joins from the terminal up the left chain, descending
//! into the sub-network behind every join entered from the right. Links are
//! numbered in join order. The snapshot describes
//! structure only; no partial match is recorded.

// Dense IDs are u32 - networks never approach 4 billion nodes
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use reticle_foundation::EntityKind;
#[cfg(feature = "serde")]
use reticle_foundation::{Error, ErrorKind, Result};

use crate::agenda::Agenda;
use crate::engine::Engine;
use crate::expr::{Expr, Side};
use crate::network::{JoinId, Network, PatternId, RightEntry};

/// One rule.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleRecord {
    /// Dense rule ID.
    pub id: u32,
    /// Rule name.
    pub name: String,
    /// Agenda priority.
    pub salience: i32,
    /// Terminal join of each disjunct.
    pub terminals: Vec<u32>,
    /// Logical join of each disjunct, if any.
    pub logical_joins: Vec<Option<u32>>,
}

/// One join node.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JoinRecord {
    /// Dense join ID.
    pub id: u32,
    /// No left input.
    pub first_join: bool,
    /// `not`.
    pub negated: bool,
    /// `exists`.
    pub exists: bool,
    /// Entered from a sub-network.
    pub join_from_the_right: bool,
    /// Holds logical support.
    pub logical: bool,
    /// Binds in produced rows.
    pub depth: u16,
    /// Join test.
    pub network_test: Option<String>,
    /// Secondary test.
    pub secondary_test: Option<String>,
    /// Left hash expressions.
    pub left_hash: Vec<String>,
    /// Right hash expressions.
    pub right_hash: Vec<String>,
    /// Left input.
    pub last_level: Option<u32>,
    /// Right input when it is a sub-network.
    pub right_join: Option<u32>,
    /// Right input when it is a pattern.
    pub right_pattern: Option<u32>,
    /// Outgoing links.
    pub links: Vec<u32>,
    /// Rule activated by this join, for terminals.
    pub rule: Option<u32>,
}

/// One edge between joins.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkRecord {
    /// Dense link ID.
    pub id: u32,
    /// Source join.
    pub from: u32,
    /// Destination join.
    pub to: u32,
    /// Enters the destination's right input.
    pub enter_right: bool,
}

/// One pattern header.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatternRecord {
    /// Dense pattern ID.
    pub id: u32,
    /// True for instance patterns.
    pub object: bool,
    /// Joins entered by this pattern.
    pub entry_joins: Vec<u32>,
}

/// The whole structure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    /// Rules in ID order.
    pub rules: Vec<RuleRecord>,
    /// Joins in ID order.
    pub joins: Vec<JoinRecord>,
    /// Links in ID order.
    pub links: Vec<LinkRecord>,
    /// Patterns in ID order.
    pub patterns: Vec<PatternRecord>,
}

struct Tagger<'a> {
    net: &'a Network,
    joins: HashMap<JoinId, u32>,
    order: Vec<JoinId>,
}

impl Tagger<'_> {
    fn tag_from(&mut self, start: JoinId) {
        let mut cursor = Some(start);
        while let Some(join) = cursor {
            if self.joins.contains_key(&join) {
                return;
            }
            let node = &self.net.joins[join];
            self.joins.insert(join, self.order.len() as u32);
            self.order.push(join);
            if let Some(RightEntry::Join(source)) = node.right_entry {
                self.tag_from(source);
            }
            cursor = node.last_level;
        }
    }
}

impl Snapshot {
    /// Tags and records the network of an engine.
    #[must_use]
    pub fn capture<A: Agenda>(engine: &Engine<A>) -> Self {
        let net = engine.network();
        let interner = engine.working_memory().interner();
        let mut tagger = Tagger {
            net,
            joins: HashMap::new(),
            order: Vec::new(),
        };

        let mut rule_ids = HashMap::new();
        let rules: Vec<_> = net.rules.iter().collect();
        for (dense, (id, rule)) in rules.iter().enumerate() {
            rule_ids.insert(*id, dense as u32);
            for disjunct in &rule.disjuncts {
                tagger.tag_from(disjunct.terminal);
            }
        }

        let mut pattern_ids: HashMap<PatternId, u32> = HashMap::new();
        let mut patterns = Vec::new();
        for (id, header) in net.patterns.iter() {
            let dense = patterns.len() as u32;
            pattern_ids.insert(id, dense);
            patterns.push(PatternRecord {
                id: dense,
                object: header.kind == EntityKind::Instance,
                entry_joins: header
                    .entry_joins
                    .iter()
                    .filter_map(|j| tagger.joins.get(j).copied())
                    .collect(),
            });
        }

        let show = |e: &Expr| format!("{e:?}");
        let mut joins = Vec::with_capacity(tagger.order.len());
        let mut links = Vec::new();
        for (dense, join) in tagger.order.iter().enumerate() {
            let node = &net.joins[*join];
            let mut link_ids = Vec::new();
            for link in &node.next_links {
                let Some(to) = tagger.joins.get(&link.join).copied() else {
                    continue;
                };
                let id = links.len() as u32;
                links.push(LinkRecord {
                    id,
                    from: dense as u32,
                    to,
                    enter_right: link.enter == Side::Right,
                });
                link_ids.push(id);
            }
            let (right_join, right_pattern) = match node.right_entry {
                Some(RightEntry::Join(s)) => (tagger.joins.get(&s).copied(), None),
                Some(RightEntry::Pattern(p)) => (None, pattern_ids.get(&p).copied()),
                None => (None, None),
            };
            joins.push(JoinRecord {
                id: dense as u32,
                first_join: node.first_join,
                negated: node.negated,
                exists: node.exists,
                join_from_the_right: node.join_from_the_right,
                logical: node.logical_join,
                depth: node.depth,
                network_test: node.network_test.as_ref().map(show),
                secondary_test: node.secondary_test.as_ref().map(show),
                left_hash: node.left_hash.iter().map(show).collect(),
                right_hash: node.right_hash.iter().map(show).collect(),
                last_level: node.last_level.and_then(|j| tagger.joins.get(&j).copied()),
                right_join,
                right_pattern,
                links: link_ids,
                rule: node.rule_to_activate.and_then(|r| rule_ids.get(&r).copied()),
            });
        }

        let rules = rules
            .iter()
            .map(|(id, rule)| RuleRecord {
                id: rule_ids[id],
                name: interner.name(rule.name).to_string(),
                salience: rule.salience,
                terminals: rule
                    .disjuncts
                    .iter()
                    .filter_map(|d| tagger.joins.get(&d.terminal).copied())
                    .collect(),
                logical_joins: rule
                    .disjuncts
                    .iter()
                    .map(|d| d.logical_join.and_then(|j| tagger.joins.get(&j).copied()))
                    .collect(),
            })
            .collect();

        Self {
            rules,
            joins,
            links,
            patterns,
        }
    }

    /// Serializes to `MessagePack`.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if encoding fails.
    #[cfg(feature = "serde")]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))
    }

    /// Deserializes from `MessagePack`.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if decoding fails.
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::new(ErrorKind::Serialization(e.to_string())))
    }
}
