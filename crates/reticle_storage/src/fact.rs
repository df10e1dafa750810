//! Ordered records built from templates.

use std::fmt::Write as _;

use reticle_foundation::{EntityRef, Interner, SymbolId, Value};

use crate::entity::{PatternEntity, SlotKey};
use crate::schema::TemplateId;

/// One fact.
#[derive(Clone, Debug, PartialEq)]
pub struct Fact {
    /// The fact's reference.
    pub id: EntityRef,
    /// The template it was built from.
    pub template: TemplateId,
    /// Template name, kept for diagnostics.
    pub template_name: SymbolId,
    /// Slot names in template order, kept for diagnostics.
    pub slot_names: Vec<SymbolId>,
    /// Slot values in template order.
    pub values: Vec<Value>,
    /// Recency tag.
    pub time_tag: u64,
}

impl PatternEntity for Fact {
    fn entity_ref(&self) -> EntityRef {
        self.id
    }

    fn time_tag(&self) -> u64 {
        self.time_tag
    }

    fn slot_value(&self, slot: SlotKey) -> Option<&Value> {
        match slot {
            SlotKey::Position(i) => self.values.get(usize::from(i)),
            SlotKey::Named(name) => self
                .slot_names
                .iter()
                .position(|&n| n == name)
                .and_then(|i| self.values.get(i)),
            SlotKey::InstanceName | SlotKey::Class => None,
        }
    }

    fn describe(&self, interner: &Interner) -> String {
        let mut out = format!("{} ({}", self.id, interner.name(self.template_name));
        for (name, value) in self.slot_names.iter().zip(&self.values) {
            let _ = write!(out, " ({} {})", interner.name(*name), value.display(interner));
        }
        out.push(')');
        out
    }
}
