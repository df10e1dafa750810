//! Alpha networks: per-entity discrimination of facts and instances.
//!
//! Both networks share one tree implementation. Facts are routed by
//! template to a root and use hashed selector tables for constant tests;
//! instances share a single root, use the sibling short-circuit after a
//! constant test succeeds, and filter by class at the pattern terminal.

mod fact;
mod object;
mod pattern;
mod tree;

pub use fact::FactPattern;
pub use object::ObjectPattern;
pub use pattern::{FieldConstraint, FieldTest, SlotConstraint, SlotPattern};

pub(crate) use fact::FactNetwork;
pub(crate) use object::ObjectNetwork;
pub(crate) use tree::NodeId;

/// The terminal node of a pattern in one of the alpha networks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum AlphaNodeRef {
    Fact(NodeId),
    Object(NodeId),
}
