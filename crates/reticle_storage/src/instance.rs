//! Object instances of user-defined classes.

use std::fmt::Write as _;
use std::sync::Arc;

use reticle_foundation::{EntityRef, Interner, SymbolId, Value};

use crate::entity::{PatternEntity, SlotKey};
use crate::schema::{ClassId, SlotLayout};

/// One object instance.
#[derive(Clone, Debug)]
pub struct Instance {
    /// The instance's reference.
    pub id: EntityRef,
    /// The instance's class.
    pub class: ClassId,
    /// Shared slot layout of the class.
    pub layout: Arc<SlotLayout>,
    /// Slot values in layout order.
    pub values: Vec<Value>,
    /// The instance name as a value.
    pub name: Value,
    /// The class name as a value.
    pub class_name: Value,
    /// Recency tag.
    pub time_tag: u64,
}

impl Instance {
    /// Returns the instance name symbol.
    #[must_use]
    pub fn name_symbol(&self) -> Option<SymbolId> {
        self.name.as_symbol()
    }
}

impl PatternEntity for Instance {
    fn entity_ref(&self) -> EntityRef {
        self.id
    }

    fn time_tag(&self) -> u64 {
        self.time_tag
    }

    fn slot_value(&self, slot: SlotKey) -> Option<&Value> {
        match slot {
            SlotKey::Named(name) => self.layout.position(name).and_then(|i| self.values.get(i)),
            SlotKey::InstanceName => Some(&self.name),
            SlotKey::Class => Some(&self.class_name),
            SlotKey::Position(_) => None,
        }
    }

    fn describe(&self, interner: &Interner) -> String {
        let mut out = format!(
            "[{}] of {}",
            self.name.display(interner),
            self.class_name.display(interner)
        );
        for (slot, value) in self.layout.slots().iter().zip(&self.values) {
            let _ = write!(out, " ({} {})", interner.name(slot.name), value.display(interner));
        }
        out
    }
}
