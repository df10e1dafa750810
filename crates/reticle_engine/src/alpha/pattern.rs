//! Constraint descriptions shared by fact and object patterns.

use reticle_foundation::Value;
use reticle_storage::SlotKey;

use crate::expr::Expr;

/// The test applied to one field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldTest {
    /// Matches anything.
    Any,
    /// Matches one literal value.
    Constant(Value),
    /// Matches when the expression is truthy.
    Test(Expr),
}

impl FieldTest {
    pub(crate) fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }
}

/// One element constraint within a multifield slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldConstraint {
    /// True if the constraint binds zero or more elements.
    pub multifield: bool,
    /// The test applied to the bound element or span.
    pub test: FieldTest,
}

impl FieldConstraint {
    /// Matches exactly one element.
    #[must_use]
    pub fn single(test: FieldTest) -> Self {
        Self {
            multifield: false,
            test,
        }
    }

    /// Matches a span of zero or more elements.
    #[must_use]
    pub fn multi(test: FieldTest) -> Self {
        Self {
            multifield: true,
            test,
        }
    }

    /// Matches exactly one element equal to a constant.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::single(FieldTest::Constant(value.into()))
    }

    /// Matches any one element.
    #[must_use]
    pub fn any() -> Self {
        Self::single(FieldTest::Any)
    }

    /// Matches any span.
    #[must_use]
    pub fn any_multi() -> Self {
        Self::multi(FieldTest::Any)
    }
}

/// The constraint on one slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotConstraint {
    /// A test on the slot's whole value.
    Whole(FieldTest),
    /// Element-by-element constraints on a multifield slot. The sequence
    /// must cover every element; an empty sequence matches only an empty
    /// multifield.
    Sequence(Vec<FieldConstraint>),
}

/// A constraint on one slot of a pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotPattern {
    /// The slot constrained.
    pub slot: SlotKey,
    /// The constraint.
    pub constraint: SlotConstraint,
}

impl SlotPattern {
    /// A whole-slot constraint.
    #[must_use]
    pub fn whole(slot: SlotKey, test: FieldTest) -> Self {
        Self {
            slot,
            constraint: SlotConstraint::Whole(test),
        }
    }

    /// A whole-slot equality with a constant.
    #[must_use]
    pub fn constant(slot: SlotKey, value: impl Into<Value>) -> Self {
        Self::whole(slot, FieldTest::Constant(value.into()))
    }

    /// An element sequence.
    #[must_use]
    pub fn sequence(slot: SlotKey, fields: Vec<FieldConstraint>) -> Self {
        Self {
            slot,
            constraint: SlotConstraint::Sequence(fields),
        }
    }

    /// Slots read by this constraint, including slots its tests read.
    pub(crate) fn referenced_slots(&self, out: &mut Vec<SlotKey>) {
        out.push(self.slot);
        let mut visit = |test: &FieldTest| {
            if let FieldTest::Test(expr) = test {
                expr.visit_fields(&mut |input, field| {
                    if input.is_none() {
                        if let Some(slot) = field.depends_on() {
                            out.push(slot);
                        }
                    }
                });
            }
        };
        match &self.constraint {
            SlotConstraint::Whole(test) => visit(test),
            SlotConstraint::Sequence(fields) => fields.iter().for_each(|f| visit(&f.test)),
        }
    }
}
