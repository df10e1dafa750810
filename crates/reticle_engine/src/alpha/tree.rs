//! The discrimination tree behind both alpha networks.
//!
//! Matching walks the tree with an explicit worklist instead of recursion.
//! Each task expands one node that has already passed: its pattern
//! terminals are reported, then its children are tested and the survivors
//! are queued. Multifield constraints fork one task per candidate span, each
//! carrying its own marker list.

// Allow usize/u16 conversions - slot patterns are small
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;

use reticle_foundation::{Error, Value};
use reticle_storage::{PatternEntity, SlotKey, WorkingMemory};

use crate::expr::{EvalContext, field_position};
use crate::network::arena::{Arena, arena_key};
use crate::network::{MultifieldMarker, PatternId};

use super::pattern::{FieldTest, SlotConstraint, SlotPattern};

arena_key!(
    /// Handle to an alpha tree node.
    NodeId,
    "n"
);

/// Where in a slot a node looks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum NodeKind {
    /// Tree root; always passes.
    Root,
    /// The slot's whole value.
    Whole,
    /// One element bound by the constraint at `field`.
    Single { field: u16, leave: u16, end: bool },
    /// A span bound by the constraint at `field`.
    Multi { field: u16, leave: u16, end: bool },
    /// The slot must be an empty multifield.
    Empty,
}

/// What a node checks: a place in a slot and a test.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeTest {
    pub(crate) slot: SlotKey,
    pub(crate) kind: NodeKind,
    pub(crate) test: FieldTest,
}

impl NodeTest {
    fn root() -> Self {
        Self {
            slot: SlotKey::InstanceName,
            kind: NodeKind::Root,
            test: FieldTest::Any,
        }
    }

    /// Position key used for selector tables and sibling blocking.
    fn place(&self) -> (SlotKey, NodeKind) {
        (self.slot, self.kind)
    }

    fn hashable(&self) -> bool {
        self.test.is_constant() && matches!(self.kind, NodeKind::Whole | NodeKind::Single { .. })
    }
}

/// Lowers slot constraints into the node tests of one tree path.
pub(crate) fn compile_slots(slots: &[SlotPattern]) -> Vec<NodeTest> {
    let mut out = Vec::new();
    for slot in slots {
        match &slot.constraint {
            SlotConstraint::Whole(FieldTest::Any) => {}
            SlotConstraint::Whole(test) => out.push(NodeTest {
                slot: slot.slot,
                kind: NodeKind::Whole,
                test: test.clone(),
            }),
            SlotConstraint::Sequence(fields) if fields.is_empty() => out.push(NodeTest {
                slot: slot.slot,
                kind: NodeKind::Empty,
                test: FieldTest::Any,
            }),
            SlotConstraint::Sequence(fields) => {
                let last = fields.len() - 1;
                for (i, constraint) in fields.iter().enumerate() {
                    let leave = fields[i + 1..].iter().filter(|f| !f.multifield).count() as u16;
                    let field = i as u16;
                    let end = i == last;
                    let kind = if constraint.multifield {
                        NodeKind::Multi { field, leave, end }
                    } else {
                        NodeKind::Single { field, leave, end }
                    };
                    out.push(NodeTest {
                        slot: slot.slot,
                        kind,
                        test: constraint.test.clone(),
                    });
                }
            }
        }
    }
    out
}

#[derive(Debug)]
pub(crate) struct AlphaNode {
    pub(crate) test: NodeTest,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Constant children reached by hashing the tested value.
    pub(crate) selectors: HashMap<(SlotKey, NodeKind), HashMap<Value, NodeId>>,
    pub(crate) stops: Vec<PatternId>,
    pub(crate) initialize: bool,
}

impl AlphaNode {
    fn new(test: NodeTest, parent: Option<NodeId>) -> Self {
        Self {
            test,
            parent,
            children: Vec::new(),
            selectors: HashMap::new(),
            stops: Vec::new(),
            initialize: true,
        }
    }

    fn is_bare(&self) -> bool {
        self.children.is_empty() && self.selectors.is_empty() && self.stops.is_empty()
    }
}

/// Result of running one entity through a tree.
#[derive(Debug, Default)]
pub(crate) struct TreeMatch {
    pub(crate) hits: Vec<(PatternId, Vec<MultifieldMarker>)>,
    pub(crate) errors: Vec<(NodeId, SlotKey, Error)>,
}

struct Task {
    node: NodeId,
    markers: Vec<MultifieldMarker>,
}

/// A discrimination tree.
#[derive(Debug)]
pub(crate) struct AlphaTree {
    nodes: Arena<NodeId, AlphaNode>,
    /// Hash constant tests through selector tables instead of testing each
    /// constant child.
    use_selectors: bool,
}

impl AlphaTree {
    pub(crate) fn new(use_selectors: bool) -> Self {
        Self {
            nodes: Arena::new(),
            use_selectors,
        }
    }

    pub(crate) fn add_root(&mut self) -> NodeId {
        self.nodes.insert(AlphaNode::new(NodeTest::root(), None))
    }

    pub(crate) fn node(&self, id: NodeId) -> &AlphaNode {
        &self.nodes[id]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut AlphaNode {
        &mut self.nodes[id]
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Finds or creates the path for a sequence of tests, returning its last node.
    pub(crate) fn add_path(&mut self, root: NodeId, tests: Vec<NodeTest>) -> NodeId {
        let mut current = root;
        for test in tests {
            current = self.find_or_add_child(current, test);
        }
        current
    }

    fn find_or_add_child(&mut self, parent: NodeId, test: NodeTest) -> NodeId {
        if let (true, true, FieldTest::Constant(value)) =
            (self.use_selectors, test.hashable(), &test.test)
        {
            if let Some(existing) = self.nodes[parent]
                .selectors
                .get(&test.place())
                .and_then(|table| table.get(value))
            {
                return *existing;
            }
            let (place, value) = (test.place(), value.clone());
            let child = self.nodes.insert(AlphaNode::new(test, Some(parent)));
            self.nodes[parent]
                .selectors
                .entry(place)
                .or_default()
                .insert(value, child);
            return child;
        }
        if let Some(existing) = self.nodes[parent]
            .children
            .iter()
            .find(|c| self.nodes[**c].test == test)
        {
            return *existing;
        }
        let constant = test.test.is_constant();
        let child = self.nodes.insert(AlphaNode::new(test, Some(parent)));
        let siblings = &self.nodes[parent].children;
        // Constant tests go ahead of everything else.
        let at = if constant {
            siblings
                .iter()
                .position(|c| !self.nodes[*c].test.test.is_constant())
                .unwrap_or(siblings.len())
        } else {
            siblings.len()
        };
        self.nodes[parent].children.insert(at, child);
        child
    }

    /// Marks a node and its ancestors for an incremental pass. Returns the
    /// nodes whose flag was newly set.
    pub(crate) fn mark_path(&mut self, node: NodeId, out: &mut Vec<NodeId>) {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            let n = &mut self.nodes[id];
            if !n.initialize {
                n.initialize = true;
                out.push(id);
            }
            cursor = n.parent;
        }
    }

    /// Clears every incremental flag.
    pub(crate) fn clear_initialize(&mut self) {
        for id in self.nodes.keys() {
            self.nodes[id].initialize = false;
        }
    }

    /// Detaches a pattern terminal and prunes nodes left without purpose.
    /// Returns true if the root itself became bare.
    pub(crate) fn remove_stop(&mut self, node: NodeId, pattern: PatternId) -> bool {
        self.nodes[node].stops.retain(|p| *p != pattern);
        let mut cursor = node;
        loop {
            if !self.nodes[cursor].is_bare() {
                return false;
            }
            let Some(parent) = self.nodes[cursor].parent else {
                return true;
            };
            let Some(removed) = self.nodes.remove(cursor) else {
                return false;
            };
            let p = &mut self.nodes[parent];
            p.children.retain(|c| *c != cursor);
            if let FieldTest::Constant(value) = &removed.test.test {
                if let Some(table) = p.selectors.get_mut(&removed.test.place()) {
                    table.remove(value);
                    if table.is_empty() {
                        p.selectors.remove(&removed.test.place());
                    }
                }
            }
            cursor = parent;
        }
    }

    pub(crate) fn remove_root(&mut self, root: NodeId) {
        self.nodes.remove(root);
    }

    /// Every pattern terminal at or below a node.
    pub(crate) fn stops_below(&self, node: NodeId) -> Vec<PatternId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let n = &self.nodes[id];
            out.extend(n.stops.iter().copied());
            stack.extend(n.children.iter().copied());
            for table in n.selectors.values() {
                stack.extend(table.values().copied());
            }
        }
        out
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Runs an entity through the tree below `root`.
    ///
    /// With `only_initializing` set, only nodes flagged for an incremental
    /// pass are entered.
    pub(crate) fn match_entity(
        &self,
        root: NodeId,
        wm: &WorkingMemory,
        entity: &dyn PatternEntity,
        only_initializing: bool,
    ) -> TreeMatch {
        let mut result = TreeMatch::default();
        if only_initializing && !self.nodes[root].initialize {
            return result;
        }
        let mut stack = vec![Task {
            node: root,
            markers: Vec::new(),
        }];
        while let Some(task) = stack.pop() {
            let node = &self.nodes[task.node];
            for stop in &node.stops {
                result.hits.push((*stop, task.markers.clone()));
            }

            let mut next: Vec<Task> = Vec::new();
            if self.use_selectors {
                for (place, table) in &node.selectors {
                    let probe = NodeTest {
                        slot: place.0,
                        kind: place.1,
                        test: FieldTest::Any,
                    };
                    let Some(value) = probe.locate(entity, &task.markers) else {
                        continue;
                    };
                    if let Some(child) = table.get(&value) {
                        if !only_initializing || self.nodes[*child].initialize {
                            next.push(Task {
                                node: *child,
                                markers: task.markers.clone(),
                            });
                        }
                    }
                }
            }

            let mut blocked: Option<(SlotKey, NodeKind)> = None;
            for child_id in &node.children {
                let child = &self.nodes[*child_id];
                if only_initializing && !child.initialize {
                    continue;
                }
                let constant = child.test.test.is_constant();
                if constant && blocked == Some(child.test.place()) {
                    continue;
                }
                let before = next.len();
                self.expand(*child_id, wm, entity, &task.markers, &mut next, &mut result);
                if constant && next.len() > before && child.test.hashable() {
                    blocked = Some(child.test.place());
                }
            }
            stack.extend(next.into_iter().rev());
        }
        result
    }

    /// Tests one child and queues a task per way it can match.
    fn expand(
        &self,
        id: NodeId,
        wm: &WorkingMemory,
        entity: &dyn PatternEntity,
        markers: &[MultifieldMarker],
        out: &mut Vec<Task>,
        result: &mut TreeMatch,
    ) {
        let test = &self.nodes[id].test;
        let Some(value) = entity.slot_value(test.slot) else {
            return;
        };
        let mut check = |markers: Vec<MultifieldMarker>, subject: Option<Value>| {
            let ok = match &test.test {
                FieldTest::Any => Ok(true),
                FieldTest::Constant(c) => Ok(subject.as_ref() == Some(c)),
                FieldTest::Test(expr) => expr.test(&EvalContext::pattern(wm, entity, &markers)),
            };
            match ok {
                Ok(true) => out.push(Task { node: id, markers }),
                Ok(false) => {}
                Err(err) => result.errors.push((id, test.slot, err)),
            }
        };
        match test.kind {
            NodeKind::Root => check(markers.to_vec(), None),
            NodeKind::Whole => check(markers.to_vec(), Some(value.clone())),
            NodeKind::Empty => {
                if value.as_multifield().is_some_and(|mf| mf.is_empty()) {
                    check(markers.to_vec(), None);
                }
            }
            NodeKind::Single { .. } => {
                if let Some(v) = test.locate(entity, markers) {
                    check(markers.to_vec(), Some(v));
                }
            }
            NodeKind::Multi { field, leave, end } => {
                let Some(mf) = value.as_multifield() else {
                    return;
                };
                let start = field_position(markers, test.slot, field);
                let needed = start + usize::from(leave);
                if needed > mf.len() {
                    return;
                }
                let longest = mf.len() - needed;
                let lengths: Vec<usize> = if end { vec![longest] } else { (0..=longest).rev().collect() };
                for len in lengths {
                    let mut extended = markers.to_vec();
                    extended.push(MultifieldMarker {
                        slot: test.slot,
                        field,
                        start,
                        len,
                    });
                    let span = Value::Multifield(mf.slice(start, start + len));
                    check(extended, Some(span));
                }
            }
        }
    }
}

impl NodeTest {
    /// The single value a whole-slot or single-element test examines, if
    /// the slot's shape allows the test at all.
    fn locate(&self, entity: &dyn PatternEntity, markers: &[MultifieldMarker]) -> Option<Value> {
        let value = entity.slot_value(self.slot)?;
        match self.kind {
            NodeKind::Whole => Some(value.clone()),
            NodeKind::Single { field, leave, end } => {
                let mf = value.as_multifield()?;
                let pos = field_position(markers, self.slot, field);
                let fits = if end {
                    pos + 1 == mf.len()
                } else {
                    pos + 1 + usize::from(leave) <= mf.len()
                };
                if fits { mf.get(pos).cloned() } else { None }
            }
            _ => None,
        }
    }
}
