//! Expressions evaluated by the pattern and join networks.
//!
//! An [`Expr`] reads fields from the entity under test (alpha network) or
//! from the left and right partial matches of a join. Evaluation is a plain
//! function of an explicit [`EvalContext`]; there is no ambient state.

// Allow index casts between u16/usize/isize - patterns are small
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod native;
mod registry;

pub use registry::FunctionRegistry;

use std::fmt;
use std::hash::{Hash, Hasher};

use reticle_foundation::{Error, ErrorKind, Result, Value};
use reticle_storage::{PatternEntity, SlotKey, WorkingMemory};

use crate::network::{Bind, MultifieldMarker};

/// Multiplier applied per hash expression when combining values.
const HASH_MULTIPLIER: u64 = 509;

// =============================================================================
// Native Functions
// =============================================================================

/// A function callable from expressions.
#[derive(Clone, Copy)]
pub struct NativeFn {
    /// The name the function is registered under.
    pub name: &'static str,
    /// The implementation.
    pub func: fn(&[Value]) -> Result<Value>,
}

impl NativeFn {
    /// Creates a native function.
    #[must_use]
    pub const fn new(name: &'static str, func: fn(&[Value]) -> Result<Value>) -> Self {
        Self { name, func }
    }
}

impl PartialEq for NativeFn {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for NativeFn {}

impl Hash for NativeFn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<native {}>", self.name)
    }
}

// =============================================================================
// Field References
// =============================================================================

/// Which partial match of a join a variable reads from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    /// The left (beta) input.
    Left,
    /// The right (alpha or sub-network) input.
    Right,
}

/// How a slot is read.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FieldAccess {
    /// The slot's whole value.
    Whole,
    /// The element bound by the single-field constraint at this index of the
    /// slot's pattern.
    Single(u16),
    /// The span bound by the multifield constraint at this index.
    Multi(u16),
    /// The entity itself, as a `Value::Entity`.
    Address,
}

/// A read of one slot of one entity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FieldRef {
    /// The slot read.
    pub slot: SlotKey,
    /// How the slot is read.
    pub access: FieldAccess,
}

impl FieldRef {
    /// Reads a whole slot.
    #[must_use]
    pub const fn slot(slot: SlotKey) -> Self {
        Self {
            slot,
            access: FieldAccess::Whole,
        }
    }

    /// Reads the value bound by a single-field constraint.
    #[must_use]
    pub const fn single(slot: SlotKey, field: u16) -> Self {
        Self {
            slot,
            access: FieldAccess::Single(field),
        }
    }

    /// Reads the span bound by a multifield constraint.
    #[must_use]
    pub const fn multi(slot: SlotKey, field: u16) -> Self {
        Self {
            slot,
            access: FieldAccess::Multi(field),
        }
    }

    /// Reads the entity address.
    #[must_use]
    pub const fn address() -> Self {
        Self {
            slot: SlotKey::InstanceName,
            access: FieldAccess::Address,
        }
    }

    /// The slot this reference depends on, if any.
    #[must_use]
    pub fn depends_on(&self) -> Option<SlotKey> {
        match self.access {
            FieldAccess::Address => None,
            _ => Some(self.slot),
        }
    }

    fn read(&self, entity: &dyn PatternEntity, markers: &[MultifieldMarker]) -> Result<Value> {
        if self.access == FieldAccess::Address {
            return Ok(Value::Entity(entity.entity_ref()));
        }
        let value = entity.slot_value(self.slot).ok_or_else(|| {
            Error::new(ErrorKind::Evaluation(format!(
                "{} has no slot {:?}",
                entity.entity_ref(),
                self.slot
            )))
        })?;
        match self.access {
            FieldAccess::Whole | FieldAccess::Address => Ok(value.clone()),
            FieldAccess::Single(field) => {
                let Value::Multifield(mf) = value else {
                    return if field == 0 {
                        Ok(value.clone())
                    } else {
                        Err(Error::type_mismatch(
                            reticle_foundation::Type::Multifield,
                            value.value_type(),
                        ))
                    };
                };
                let pos = field_position(markers, self.slot, field);
                mf.get(pos).cloned().ok_or_else(|| {
                    Error::new(ErrorKind::IndexOutOfBounds {
                        index: pos,
                        length: mf.len(),
                    })
                })
            }
            FieldAccess::Multi(field) => {
                let Value::Multifield(mf) = value else {
                    return Err(Error::type_mismatch(
                        reticle_foundation::Type::Multifield,
                        value.value_type(),
                    ));
                };
                let marker = markers
                    .iter()
                    .find(|m| m.slot == self.slot && m.field == field)
                    .ok_or_else(|| {
                        Error::internal(format!("no multifield marker for field {field}"))
                    })?;
                Ok(Value::Multifield(mf.slice(marker.start, marker.end())))
            }
        }
    }
}

/// Position of the element matched by the constraint at `field`, given the
/// spans bound by earlier multifield constraints of the same slot.
pub(crate) fn field_position(markers: &[MultifieldMarker], slot: SlotKey, field: u16) -> usize {
    let mut pos = field as isize;
    for m in markers.iter().filter(|m| m.slot == slot && m.field < field) {
        pos += m.len as isize - 1;
    }
    pos.max(0) as usize
}

// =============================================================================
// Expressions
// =============================================================================

/// A test or value expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    /// A literal.
    Constant(Value),
    /// A field of the entity under test in the pattern network.
    Field(FieldRef),
    /// A field of the entity bound at `pattern` in a join input.
    Var {
        /// Which join input.
        side: Side,
        /// Bind index within that input.
        pattern: u16,
        /// The field read.
        field: FieldRef,
    },
    /// A function call.
    Call(NativeFn, Vec<Expr>),
    /// True when every operand is truthy.
    And(Vec<Expr>),
    /// True when any operand is truthy.
    Or(Vec<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
}

impl Expr {
    /// A literal expression.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    /// A field of the pattern's own entity.
    #[must_use]
    pub const fn field(field: FieldRef) -> Self {
        Self::Field(field)
    }

    /// A field of a left-input bind.
    #[must_use]
    pub const fn left(pattern: u16, field: FieldRef) -> Self {
        Self::Var {
            side: Side::Left,
            pattern,
            field,
        }
    }

    /// A field of a right-input bind.
    #[must_use]
    pub const fn right(pattern: u16, field: FieldRef) -> Self {
        Self::Var {
            side: Side::Right,
            pattern,
            field,
        }
    }

    /// A call to a builtin function.
    ///
    /// # Errors
    ///
    /// Returns `UndefinedFunction` if no builtin has this name.
    pub fn call(name: &str, args: Vec<Expr>) -> Result<Self> {
        native::builtin(name)
            .map(|f| Self::Call(f, args))
            .ok_or_else(|| Error::undefined_function(name))
    }

    /// Visits every field reference with the input it reads from.
    /// Pattern-local fields report `None`.
    pub fn visit_fields(&self, visit: &mut impl FnMut(Option<(Side, u16)>, &FieldRef)) {
        match self {
            Self::Constant(_) => {}
            Self::Field(f) => visit(None, f),
            Self::Var {
                side,
                pattern,
                field,
            } => visit(Some((*side, *pattern)), field),
            Self::Call(_, args) | Self::And(args) | Self::Or(args) => {
                for arg in args {
                    arg.visit_fields(visit);
                }
            }
            Self::Not(inner) => inner.visit_fields(visit),
        }
    }

    /// Evaluates the expression.
    pub(crate) fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        match self {
            Self::Constant(v) => Ok(v.clone()),
            Self::Field(field) => {
                let entity = ctx.entity.ok_or_else(|| {
                    Error::internal("pattern field read outside the pattern network")
                })?;
                field.read(entity, ctx.markers)
            }
            Self::Var {
                side,
                pattern,
                field,
            } => ctx.read_bind(*side, *pattern, field),
            Self::Call(func, args) => {
                let values = args
                    .iter()
                    .map(|a| a.evaluate(ctx))
                    .collect::<Result<Vec<_>>>()?;
                (func.func)(&values)
            }
            Self::And(args) => {
                for arg in args {
                    if !arg.evaluate(ctx)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Self::Or(args) => {
                for arg in args {
                    if arg.evaluate(ctx)?.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Self::Not(inner) => Ok(Value::Bool(!inner.evaluate(ctx)?.is_truthy())),
        }
    }

    /// Evaluates the expression as a test.
    pub(crate) fn test(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        self.evaluate(ctx).map(|v| v.is_truthy())
    }
}

/// Combines hash expressions into a bucket hash.
///
/// An expression that fails to evaluate contributes nothing; the join test
/// will reject the pair anyway.
pub(crate) fn hash_exprs(exprs: &[Expr], ctx: &EvalContext<'_>) -> u64 {
    let mut hash = 0u64;
    let mut multiplier = 1u64;
    for expr in exprs {
        match expr.evaluate(ctx) {
            Ok(value) => hash = hash.wrapping_add(value.hash_code().wrapping_mul(multiplier)),
            Err(err) => tracing::trace!(%err, "hash expression failed"),
        }
        multiplier = multiplier.wrapping_mul(HASH_MULTIPLIER);
    }
    hash
}

/// Hash of a bind prefix by entity and span identity.
pub(crate) fn hash_prefix(binds: &[Bind]) -> u64 {
    let mut hash = 0u64;
    let mut multiplier = 1u64;
    for bind in binds {
        if let Some(alpha) = bind {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            alpha.entity.hash(&mut hasher);
            alpha.markers.hash(&mut hasher);
            hash = hash.wrapping_add(hasher.finish().wrapping_mul(multiplier));
        }
        multiplier = multiplier.wrapping_mul(HASH_MULTIPLIER);
    }
    hash
}

// =============================================================================
// Evaluation Context
// =============================================================================

/// Everything an expression may read.
pub(crate) struct EvalContext<'a> {
    pub(crate) wm: &'a WorkingMemory,
    pub(crate) entity: Option<&'a dyn PatternEntity>,
    pub(crate) markers: &'a [MultifieldMarker],
    pub(crate) lhs: &'a [Bind],
    pub(crate) rhs: &'a [Bind],
}

impl<'a> EvalContext<'a> {
    /// Context for a pattern-network test on one entity.
    pub(crate) fn pattern(
        wm: &'a WorkingMemory,
        entity: &'a dyn PatternEntity,
        markers: &'a [MultifieldMarker],
    ) -> Self {
        Self {
            wm,
            entity: Some(entity),
            markers,
            lhs: &[],
            rhs: &[],
        }
    }

    /// Context for a join test between two partial matches.
    pub(crate) fn join(wm: &'a WorkingMemory, lhs: &'a [Bind], rhs: &'a [Bind]) -> Self {
        Self {
            wm,
            entity: None,
            markers: &[],
            lhs,
            rhs,
        }
    }

    fn read_bind(&self, side: Side, pattern: u16, field: &FieldRef) -> Result<Value> {
        let binds = match side {
            Side::Left => self.lhs,
            Side::Right => self.rhs,
        };
        let alpha = binds
            .get(usize::from(pattern))
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                Error::new(ErrorKind::Evaluation(format!(
                    "no {side:?} binding at pattern {pattern}"
                )))
            })?;
        let entity = self
            .wm
            .entity(alpha.entity)
            .ok_or_else(|| Error::entity_not_found(alpha.entity))?;
        field.read(entity, &alpha.markers)
    }
}
