//! The object pattern network.

use std::collections::HashMap;

use reticle_storage::{ClassId, Instance, PatternEntity, WorkingMemory};

use crate::network::PatternId;

use super::pattern::SlotPattern;
use super::tree::{AlphaTree, NodeId, TreeMatch, compile_slots};

/// A pattern over instances of a class and its subclasses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectPattern {
    /// The class matched, including its subclasses.
    pub class: ClassId,
    /// Slot constraints, addressed by slot name or pseudo slot.
    pub slots: Vec<SlotPattern>,
}

impl ObjectPattern {
    /// A pattern matching every instance of a class.
    #[must_use]
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            slots: Vec::new(),
        }
    }

    /// Adds a slot constraint.
    #[must_use]
    pub fn with_slot(mut self, slot: SlotPattern) -> Self {
        self.slots.push(slot);
        self
    }
}

/// The single discrimination tree shared by all object patterns.
#[derive(Debug)]
pub(crate) struct ObjectNetwork {
    tree: AlphaTree,
    root: Option<NodeId>,
    /// Class restriction checked at each pattern terminal.
    classes: HashMap<PatternId, ClassId>,
}

impl Default for ObjectNetwork {
    fn default() -> Self {
        Self {
            tree: AlphaTree::new(false),
            root: None,
            classes: HashMap::new(),
        }
    }
}

impl ObjectNetwork {
    pub(crate) fn add_pattern(&mut self, pattern: &ObjectPattern) -> NodeId {
        let root = match self.root {
            Some(root) => root,
            None => {
                let root = self.tree.add_root();
                self.root = Some(root);
                root
            }
        };
        self.tree.add_path(root, compile_slots(&pattern.slots))
    }

    pub(crate) fn stops(&self, node: NodeId) -> &[PatternId] {
        &self.tree.node(node).stops
    }

    pub(crate) fn class_of(&self, pattern: PatternId) -> Option<ClassId> {
        self.classes.get(&pattern).copied()
    }

    pub(crate) fn add_stop(&mut self, node: NodeId, pattern: PatternId, class: ClassId) {
        self.tree.node_mut(node).stops.push(pattern);
        self.classes.insert(pattern, class);
    }

    pub(crate) fn remove_stop(&mut self, node: NodeId, pattern: PatternId) {
        self.classes.remove(&pattern);
        if self.tree.remove_stop(node, pattern) {
            if let Some(root) = self.root.take() {
                self.tree.remove_root(root);
            }
        }
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

    /// Runs an instance through the tree, keeping only terminals whose class
    /// restriction the instance satisfies.
    pub(crate) fn match_instance(
        &self,
        wm: &WorkingMemory,
        instance: &Instance,
        only_initializing: bool,
    ) -> TreeMatch {
        let Some(root) = self.root else {
            return TreeMatch::default();
        };
        let mut result =
            self.tree
                .match_entity(root, wm, instance as &dyn PatternEntity, only_initializing);
        result.hits.retain(|(pattern, _)| {
            self.classes
                .get(pattern)
                .is_some_and(|class| wm.is_subclass(instance.class, *class))
        });
        result
    }
}
