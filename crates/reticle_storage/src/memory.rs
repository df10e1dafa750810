//! The live set of facts and instances.

// Allow u64 to usize casts - we target 64-bit systems
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::sync::Arc;

use reticle_foundation::{
    EntityId, EntityKind, EntityRef, Error, ErrorKind, Interner, Result, SymbolId, Value,
};

use crate::entity::PatternEntity;
use crate::fact::Fact;
use crate::instance::Instance;
use crate::schema::{ClassId, ClassSchema, SlotLayout, SlotSchema, TemplateId, TemplateSchema};
use crate::store::EntityStore;

/// Outcome of inserting a fact.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FactInsert {
    /// A new fact was created.
    New(EntityRef),
    /// An identical fact already exists; nothing was created.
    Duplicate(EntityRef),
}

impl FactInsert {
    /// Returns the fact reference either way.
    #[must_use]
    pub fn entity(self) -> EntityRef {
        match self {
            Self::New(e) | Self::Duplicate(e) => e,
        }
    }
}

/// Working memory: templates, classes, and the entities built from them.
#[derive(Debug)]
pub struct WorkingMemory {
    interner: Interner,
    templates: Vec<TemplateSchema>,
    template_names: HashMap<SymbolId, TemplateId>,
    classes: Vec<ClassSchema>,
    class_names: HashMap<SymbolId, ClassId>,
    fact_store: EntityStore,
    facts: Vec<Option<Fact>>,
    fact_index: HashMap<(TemplateId, Vec<Value>), EntityId>,
    instance_store: EntityStore,
    instances: Vec<Option<Instance>>,
    instance_names: HashMap<SymbolId, EntityId>,
    next_time_tag: u64,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkingMemory {
    /// Creates an empty working memory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interner: Interner::new(),
            templates: Vec::new(),
            template_names: HashMap::new(),
            classes: Vec::new(),
            class_names: HashMap::new(),
            fact_store: EntityStore::new(EntityKind::Fact),
            facts: Vec::new(),
            fact_index: HashMap::new(),
            instance_store: EntityStore::new(EntityKind::Instance),
            instances: Vec::new(),
            instance_names: HashMap::new(),
            next_time_tag: 1,
        }
    }

    /// Returns the symbol interner.
    #[must_use]
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Returns the symbol interner mutably.
    pub fn interner_mut(&mut self) -> &mut Interner {
        &mut self.interner
    }

    /// Interns a symbol.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.interner.intern(name)
    }

    fn tick(&mut self) -> u64 {
        let tag = self.next_time_tag;
        self.next_time_tag += 1;
        tag
    }

    // =========================================================================
    // Templates and facts
    // =========================================================================

    /// Defines a fact template.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDefinition` if the name is taken or a slot repeats.
    pub fn deftemplate(&mut self, name: &str, slots: Vec<SlotSchema>) -> Result<TemplateId> {
        let sym = self.interner.intern(name);
        if self.template_names.contains_key(&sym) {
            return Err(Error::new(ErrorKind::DuplicateDefinition(name.to_string())));
        }
        let layout = SlotLayout::new(slots)?;
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(TemplateSchema { name: sym, layout });
        self.template_names.insert(sym, id);
        Ok(id)
    }

    /// Looks up a template by name.
    #[must_use]
    pub fn template_id(&self, name: &str) -> Option<TemplateId> {
        let sym = self.interner.get(name)?;
        self.template_names.get(&sym).copied()
    }

    /// Returns a template.
    #[must_use]
    pub fn template(&self, id: TemplateId) -> Option<&TemplateSchema> {
        self.templates.get(id.0 as usize)
    }

    /// Returns the position of a template slot.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTemplate` or `UnknownSlot`.
    pub fn slot_position(&self, template: TemplateId, slot: &str) -> Result<u16> {
        let schema = self.template_or_err(template)?;
        self.interner
            .get(slot)
            .and_then(|sym| schema.layout.position(sym))
            .and_then(|pos| u16::try_from(pos).ok())
            .ok_or_else(|| Error::unknown_slot(self.interner.name(schema.name), slot))
    }

    fn template_or_err(&self, id: TemplateId) -> Result<&TemplateSchema> {
        self.template(id)
            .ok_or_else(|| Error::new(ErrorKind::UnknownTemplate(format!("#{}", id.0))))
    }

    /// Builds a full value vector from named slot values plus defaults.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` or `InvalidSlotValue`.
    pub fn build_fact_values(
        &self,
        template: TemplateId,
        slots: &[(&str, Value)],
    ) -> Result<Vec<Value>> {
        let schema = self.template_or_err(template)?;
        let mut values: Vec<Value> =
            schema.layout.slots().iter().map(|s| s.default.clone()).collect();
        for (name, value) in slots {
            let pos = usize::from(self.slot_position(template, name)?);
            values[pos] = value.clone();
        }
        Ok(values)
    }

    fn check_fact_values(&self, template: TemplateId, values: &[Value]) -> Result<()> {
        let schema = self.template_or_err(template)?;
        if values.len() != schema.layout.len() {
            return Err(Error::arity_mismatch(
                format!("{} slots", schema.layout.len()),
                values.len(),
            ));
        }
        for (slot, value) in schema.layout.slots().iter().zip(values) {
            slot.check(value, self.interner.name(slot.name))?;
        }
        Ok(())
    }

    /// Returns the live fact identical to the given one, if any.
    #[must_use]
    pub fn find_duplicate(&self, template: TemplateId, values: &[Value]) -> Option<EntityRef> {
        self.fact_index
            .get(&(template, values.to_vec()))
            .map(|&id| EntityRef::fact(id))
    }

    /// Inserts a fact.
    ///
    /// With `allow_duplicates` false an identical live fact is returned as
    /// [`FactInsert::Duplicate`] and nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the values do not fit the template.
    pub fn insert_fact(
        &mut self,
        template: TemplateId,
        values: Vec<Value>,
        allow_duplicates: bool,
    ) -> Result<FactInsert> {
        self.check_fact_values(template, &values)?;
        if !allow_duplicates {
            if let Some(existing) = self.find_duplicate(template, &values) {
                return Ok(FactInsert::Duplicate(existing));
            }
        }
        let schema = self.template_or_err(template)?;
        let template_name = schema.name;
        let slot_names = schema.layout.slots().iter().map(|s| s.name).collect();
        let id = self.fact_store.spawn();
        let time_tag = self.tick();
        let entity = EntityRef::fact(id);
        self.fact_index
            .entry((template, values.clone()))
            .or_insert(id);
        let fact = Fact {
            id: entity,
            template,
            template_name,
            slot_names,
            values,
            time_tag,
        };
        let idx = id.index as usize;
        if idx >= self.facts.len() {
            self.facts.resize_with(idx + 1, || None);
        }
        self.facts[idx] = Some(fact);
        Ok(FactInsert::New(entity))
    }

    /// Removes a fact.
    ///
    /// # Errors
    ///
    /// Returns an error if the fact is not live.
    pub fn remove_fact(&mut self, id: EntityId) -> Result<Fact> {
        self.fact_store.destroy(id)?;
        let fact = self.facts[id.index as usize]
            .take()
            .ok_or_else(|| Error::internal("fact slot empty for live id"))?;
        let key = (fact.template, fact.values.clone());
        if self.fact_index.get(&key) == Some(&id) {
            self.fact_index.remove(&key);
        }
        Ok(fact)
    }

    /// Returns a live fact.
    #[must_use]
    pub fn fact(&self, id: EntityId) -> Option<&Fact> {
        if !self.fact_store.exists(id) {
            return None;
        }
        self.facts.get(id.index as usize)?.as_ref()
    }

    /// Returns the number of live facts.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.fact_store.len()
    }

    // =========================================================================
    // Classes and instances
    // =========================================================================

    /// Defines a class. A subclass inherits its parent's slots ahead of its own.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDefinition` or `UnknownClass`.
    pub fn defclass(
        &mut self,
        name: &str,
        parent: Option<&str>,
        slots: Vec<SlotSchema>,
    ) -> Result<ClassId> {
        let sym = self.interner.intern(name);
        if self.class_names.contains_key(&sym) {
            return Err(Error::new(ErrorKind::DuplicateDefinition(name.to_string())));
        }
        let parent_id = match parent {
            Some(p) => Some(
                self.class_id(p)
                    .ok_or_else(|| Error::new(ErrorKind::UnknownClass(p.to_string())))?,
            ),
            None => None,
        };
        let mut all_slots = parent_id
            .and_then(|p| self.class(p))
            .map(|c| c.layout.slots().to_vec())
            .unwrap_or_default();
        all_slots.extend(slots);
        let layout = Arc::new(SlotLayout::new(all_slots)?);
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassSchema {
            name: sym,
            parent: parent_id,
            layout,
        });
        self.class_names.insert(sym, id);
        Ok(id)
    }

    /// Looks up a class by name.
    #[must_use]
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        let sym = self.interner.get(name)?;
        self.class_names.get(&sym).copied()
    }

    /// Returns a class.
    #[must_use]
    pub fn class(&self, id: ClassId) -> Option<&ClassSchema> {
        self.classes.get(id.0 as usize)
    }

    /// Returns true if `class` is `ancestor` or inherits from it.
    #[must_use]
    pub fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.class(c).and_then(|schema| schema.parent);
        }
        false
    }

    /// Returns `ancestor` and every class that inherits from it.
    #[must_use]
    pub fn subclasses(&self, ancestor: ClassId) -> Vec<ClassId> {
        (0..self.classes.len() as u32)
            .map(ClassId)
            .filter(|&c| self.is_subclass(c, ancestor))
            .collect()
    }

    /// Creates an instance. Unsupplied slots take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDefinition` if the name is in use, or a slot error.
    pub fn insert_instance(
        &mut self,
        name: SymbolId,
        class: ClassId,
        slots: &[(SymbolId, Value)],
    ) -> Result<EntityRef> {
        if self.instance_names.contains_key(&name) {
            return Err(Error::new(ErrorKind::DuplicateDefinition(
                self.interner.name(name).to_string(),
            )));
        }
        let schema = self
            .class(class)
            .ok_or_else(|| Error::new(ErrorKind::UnknownClass(format!("#{}", class.0))))?;
        let layout = Arc::clone(&schema.layout);
        let class_name = Value::Symbol(schema.name);
        let mut values: Vec<Value> = layout.slots().iter().map(|s| s.default.clone()).collect();
        for (slot, value) in slots {
            let pos = layout.position(*slot).ok_or_else(|| {
                Error::unknown_slot(self.interner.name(schema.name), self.interner.name(*slot))
            })?;
            layout.slots()[pos].check(value, self.interner.name(*slot))?;
            values[pos] = value.clone();
        }
        let id = self.instance_store.spawn();
        let time_tag = self.tick();
        let entity = EntityRef::instance(id);
        let idx = id.index as usize;
        if idx >= self.instances.len() {
            self.instances.resize_with(idx + 1, || None);
        }
        self.instances[idx] = Some(Instance {
            id: entity,
            class,
            layout,
            values,
            name: Value::Symbol(name),
            class_name,
            time_tag,
        });
        self.instance_names.insert(name, id);
        Ok(entity)
    }

    /// Writes slot values on an instance and returns the slots whose value changed.
    ///
    /// The time tag is refreshed only if something changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance is not live or a slot is invalid.
    pub fn update_instance(
        &mut self,
        id: EntityId,
        changes: &[(SymbolId, Value)],
    ) -> Result<Vec<SymbolId>> {
        self.instance_store.validate(id)?;
        let tag = self.next_time_tag;
        let interner = &self.interner;
        let instance = self.instances[id.index as usize]
            .as_mut()
            .ok_or_else(|| Error::internal("instance slot empty for live id"))?;
        let mut changed = Vec::new();
        for (slot, value) in changes {
            let pos = instance.layout.position(*slot).ok_or_else(|| {
                Error::unknown_slot(
                    instance.class_name.display(interner).to_string(),
                    interner.name(*slot),
                )
            })?;
            instance.layout.slots()[pos].check(value, interner.name(*slot))?;
            if instance.values[pos] != *value {
                instance.values[pos] = value.clone();
                if !changed.contains(slot) {
                    changed.push(*slot);
                }
            }
        }
        if !changed.is_empty() {
            instance.time_tag = tag;
            self.next_time_tag += 1;
        }
        Ok(changed)
    }

    /// Removes an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance is not live.
    pub fn remove_instance(&mut self, id: EntityId) -> Result<Instance> {
        self.instance_store.destroy(id)?;
        let instance = self.instances[id.index as usize]
            .take()
            .ok_or_else(|| Error::internal("instance slot empty for live id"))?;
        if let Some(name) = instance.name_symbol() {
            self.instance_names.remove(&name);
        }
        Ok(instance)
    }

    /// Returns a live instance.
    #[must_use]
    pub fn instance(&self, id: EntityId) -> Option<&Instance> {
        if !self.instance_store.exists(id) {
            return None;
        }
        self.instances.get(id.index as usize)?.as_ref()
    }

    /// Finds a live instance by name.
    #[must_use]
    pub fn instance_by_name(&self, name: SymbolId) -> Option<EntityRef> {
        self.instance_names.get(&name).map(|&id| EntityRef::instance(id))
    }

    /// Returns the number of live instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instance_store.len()
    }

    // =========================================================================
    // Kind-independent access
    // =========================================================================

    /// Returns a live entity through the capability interface.
    #[must_use]
    pub fn entity(&self, entity: EntityRef) -> Option<&dyn PatternEntity> {
        match entity.kind {
            EntityKind::Fact => self.fact(entity.id).map(|f| f as &dyn PatternEntity),
            EntityKind::Instance => self.instance(entity.id).map(|i| i as &dyn PatternEntity),
        }
    }

    /// Returns true if the entity is live.
    #[must_use]
    pub fn contains(&self, entity: EntityRef) -> bool {
        match entity.kind {
            EntityKind::Fact => self.fact_store.exists(entity.id),
            EntityKind::Instance => self.instance_store.exists(entity.id),
        }
    }

    /// Returns every live entity of a kind, oldest first.
    #[must_use]
    pub fn live_entities(&self, kind: EntityKind) -> Vec<EntityRef> {
        let mut tagged: Vec<(u64, EntityRef)> = match kind {
            EntityKind::Fact => self
                .facts
                .iter()
                .flatten()
                .map(|f| (f.time_tag, f.id))
                .collect(),
            EntityKind::Instance => self
                .instances
                .iter()
                .flatten()
                .map(|i| (i.time_tag, i.id))
                .collect(),
        };
        tagged.sort_unstable_by_key(|(tag, _)| *tag);
        tagged.into_iter().map(|(_, e)| e).collect()
    }

    /// Renders an entity for diagnostics.
    #[must_use]
    pub fn describe(&self, entity: EntityRef) -> String {
        self.entity(entity)
            .map_or_else(|| format!("{entity} (retracted)"), |e| e.describe(&self.interner))
    }

    /// Removes every fact and instance. Definitions are kept.
    pub fn clear(&mut self) {
        self.fact_store.clear();
        self.facts.iter_mut().for_each(|f| *f = None);
        self.fact_index.clear();
        self.instance_store.clear();
        self.instances.iter_mut().for_each(|i| *i = None);
        self.instance_names.clear();
    }
}
