//! The fact pattern network.

use std::collections::HashMap;

use reticle_storage::{PatternEntity, SlotKey, TemplateId, WorkingMemory};

use crate::network::PatternId;

use super::pattern::SlotPattern;
use super::tree::{AlphaTree, NodeId, TreeMatch, compile_slots};

/// A pattern over facts of one template.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FactPattern {
    /// The template matched.
    pub template: TemplateId,
    /// Slot constraints, in slot order.
    pub slots: Vec<SlotPattern>,
}

impl FactPattern {
    /// A pattern matching every fact of a template.
    #[must_use]
    pub fn new(template: TemplateId) -> Self {
        Self {
            template,
            slots: Vec::new(),
        }
    }

    /// Adds a slot constraint.
    #[must_use]
    pub fn with_slot(mut self, slot: SlotPattern) -> Self {
        self.slots.push(slot);
        self
    }

    /// Adds a whole-slot constant constraint on a slot position.
    #[must_use]
    pub fn with_constant(self, position: u16, value: impl Into<reticle_foundation::Value>) -> Self {
        self.with_slot(SlotPattern::constant(SlotKey::Position(position), value))
    }
}

/// Discrimination trees for facts, one root per template.
#[derive(Debug)]
pub(crate) struct FactNetwork {
    tree: AlphaTree,
    roots: HashMap<TemplateId, NodeId>,
}

impl Default for FactNetwork {
    fn default() -> Self {
        Self {
            tree: AlphaTree::new(true),
            roots: HashMap::new(),
        }
    }
}

impl FactNetwork {
    /// Adds (or finds) the path for a pattern and returns its terminal node.
    pub(crate) fn add_pattern(&mut self, pattern: &FactPattern) -> NodeId {
        let root = match self.roots.get(&pattern.template) {
            Some(root) => *root,
            None => {
                let root = self.tree.add_root();
                self.roots.insert(pattern.template, root);
                root
            }
        };
        self.tree.add_path(root, compile_slots(&pattern.slots))
    }

    pub(crate) fn stops(&self, node: NodeId) -> &[PatternId] {
        &self.tree.node(node).stops
    }

    pub(crate) fn add_stop(&mut self, node: NodeId, pattern: PatternId) {
        self.tree.node_mut(node).stops.push(pattern);
    }

    pub(crate) fn remove_stop(&mut self, node: NodeId, pattern: PatternId) {
        if !self.tree.remove_stop(node, pattern) {
            return;
        }
        let bare: Vec<(TemplateId, NodeId)> = self
            .roots
            .iter()
            .filter(|(_, root)| self.is_bare_root(**root))
            .map(|(t, r)| (*t, *r))
            .collect();
        for (template, root) in bare {
            self.roots.remove(&template);
            self.tree.remove_root(root);
        }
    }

    fn is_bare_root(&self, root: NodeId) -> bool {
        let node = self.tree.node(root);
        node.children.is_empty() && node.selectors.is_empty() && node.stops.is_empty()
    }

    pub(crate) fn mark_path(&mut self, node: NodeId, out: &mut Vec<NodeId>) {
        self.tree.mark_path(node, out);
    }

    pub(crate) fn clear_initialize(&mut self) {
        self.tree.clear_initialize();
    }

    pub(crate) fn stops_below(&self, node: NodeId) -> Vec<PatternId> {
        self.tree.stops_below(node)
    }

    pub(crate) fn node_count(&self) -> usize {
        self.tree.len()
    }

    /// Runs a fact through its template's tree.
    pub(crate) fn match_fact(
        &self,
        wm: &WorkingMemory,
        fact: &reticle_storage::Fact,
        only_initializing: bool,
    ) -> TreeMatch {
        match self.roots.get(&fact.template) {
            Some(root) => self.tree.match_entity(
                *root,
                wm,
                fact as &dyn PatternEntity,
                only_initializing,
            ),
            None => TreeMatch::default(),
        }
    }
}
