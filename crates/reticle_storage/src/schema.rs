//! Slot layouts for templates (facts) and classes (instances).

use std::collections::HashMap;
use std::sync::Arc;

use reticle_foundation::{Error, ErrorKind, Result, SymbolId, Type, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a template in working memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemplateId(pub u32);

/// Index of a class in working memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassId(pub u32);

/// Declaration of one slot.
#[derive(Clone, Debug, PartialEq)]
pub struct SlotSchema {
    /// Slot name.
    pub name: SymbolId,
    /// Declared value type.
    pub ty: Type,
    /// True for variable-length slots.
    pub multifield: bool,
    /// Value used when the slot is not supplied.
    pub default: Value,
}

impl SlotSchema {
    /// Creates a single-field slot defaulting to nil.
    #[must_use]
    pub fn single(name: SymbolId, ty: Type) -> Self {
        Self {
            name,
            ty,
            multifield: false,
            default: Value::Nil,
        }
    }

    /// Creates a multifield slot defaulting to the empty multifield.
    #[must_use]
    pub fn multi(name: SymbolId) -> Self {
        Self {
            name,
            ty: Type::Multifield,
            multifield: true,
            default: Value::Multifield(reticle_foundation::Multifield::new()),
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    /// Checks that a value fits this slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSlotValue` when the value's type is not accepted.
    pub fn check(&self, value: &Value, slot_name: &str) -> Result<()> {
        let actual = value.value_type();
        let ok = if self.multifield {
            actual == Type::Multifield
        } else {
            actual != Type::Multifield && (value.is_nil() || self.ty.accepts(&actual))
        };
        if ok {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::InvalidSlotValue {
                slot: slot_name.to_string(),
                message: format!("expected {}, got {actual}", self.ty),
            }))
        }
    }
}

/// Ordered slot list with name lookup, shared by every instance of a class.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotLayout {
    slots: Vec<SlotSchema>,
    by_name: HashMap<SymbolId, usize>,
}

impl SlotLayout {
    /// Builds a layout from slots in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDefinition` if a slot name repeats.
    pub fn new(slots: Vec<SlotSchema>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            if by_name.insert(slot.name, i).is_some() {
                return Err(Error::new(ErrorKind::DuplicateDefinition(format!(
                    "slot #{}",
                    slot.name.index()
                ))));
            }
        }
        Ok(Self { slots, by_name })
    }

    /// Returns the position of a slot.
    #[must_use]
    pub fn position(&self, name: SymbolId) -> Option<usize> {
        self.by_name.get(&name).copied()
    }

    /// Returns the slots in declaration order.
    #[must_use]
    pub fn slots(&self) -> &[SlotSchema] {
        &self.slots
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A fact template.
#[derive(Clone, Debug)]
pub struct TemplateSchema {
    /// Template name.
    pub name: SymbolId,
    /// Slot layout.
    pub layout: SlotLayout,
}

/// A class definition. Subclasses inherit their parent's slots first.
#[derive(Clone, Debug)]
pub struct ClassSchema {
    /// Class name.
    pub name: SymbolId,
    /// Direct superclass, if any.
    pub parent: Option<ClassId>,
    /// Inherited plus own slots.
    pub layout: Arc<SlotLayout>,
}
