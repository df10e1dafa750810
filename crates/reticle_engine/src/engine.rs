//! The engine facade: working memory, the network, and the agenda, kept in
//! step.
//!
//! Every entity change goes to working memory first and then through the
//! network, unless pattern matching is delayed, in which case the network
//! update is queued. Entities that lose their last logical support are
//! retracted once the current top-level operation, or the current rule
//! action, has finished.

use reticle_foundation::{EntityKind, EntityRef, Error, ErrorKind, Result, SymbolId, Value};
use reticle_storage::{ClassId, FactInsert, SlotKey, SlotSchema, TemplateId, WorkingMemory};

use crate::agenda::{ActivationList, Agenda};
use crate::config::EngineConfig;
use crate::diagnostics::ErrorTrail;
use crate::drive::Propagator;
use crate::network::{JoinId, JoinInfo, MatchId, Network};
use crate::queue::{PendingAction, PendingActions};
use crate::rule::{RuleId, RuleSpec};
use crate::stats::{NetworkStats, RuleMatches};
use crate::trace::{TraceEvent, Tracer};

/// A forward-chaining matcher over facts and object instances.
///
/// `A` receives activation changes; [`ActivationList`] is used when the
/// caller brings no agenda of its own.
pub struct Engine<A: Agenda = ActivationList> {
    wm: WorkingMemory,
    net: Network,
    agenda: A,
    tracer: Tracer,
    config: EngineConfig,
    pending: PendingActions,
    delayed: bool,
}

impl Engine<ActivationList> {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_agenda(config, ActivationList::new())
    }
}

impl Default for Engine<ActivationList> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Agenda> Engine<A> {
    /// Creates an engine reporting activations to `agenda`.
    #[must_use]
    pub fn with_agenda(config: EngineConfig, agenda: A) -> Self {
        Self {
            wm: WorkingMemory::new(),
            net: Network::new(&config),
            agenda,
            tracer: Tracer::new(config.trace.clone()),
            config,
            pending: PendingActions::new(),
            delayed: false,
        }
    }

    fn propagator(&mut self) -> Propagator<'_> {
        Propagator {
            net: &mut self.net,
            wm: &self.wm,
            agenda: &mut self.agenda,
            tracer: &mut self.tracer,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns working memory.
    #[must_use]
    pub fn working_memory(&self) -> &WorkingMemory {
        &self.wm
    }

    pub(crate) fn network(&self) -> &Network {
        &self.net
    }

    /// Returns the agenda.
    #[must_use]
    pub fn agenda(&self) -> &A {
        &self.agenda
    }

    /// Returns the agenda mutably, e.g. to pop the next activation.
    pub fn agenda_mut(&mut self) -> &mut A {
        &mut self.agenda
    }

    /// Returns the watch facility.
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Returns the watch facility mutably.
    pub fn tracer_mut(&mut self) -> &mut Tracer {
        &mut self.tracer
    }

    /// Interns a symbol.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.wm.intern(name)
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Defines a fact template.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDefinition` if the name is taken or a slot repeats.
    pub fn deftemplate(&mut self, name: &str, slots: Vec<SlotSchema>) -> Result<TemplateId> {
        self.wm.deftemplate(name, slots)
    }

    /// Defines a class, optionally inheriting from `parent`.
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
        self.wm.defclass(name, parent, slots)
    }

    // =========================================================================
    // Facts
    // =========================================================================

    /// Asserts a fact with a full value vector.
    ///
    /// Without fact duplication an identical live fact is returned instead
    /// of a new one. Inside a rule action with a logical block, the new
    /// fact is supported by the action's logical row; if that row is
    /// already gone nothing is asserted and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the values do not fit the template.
    pub fn assert_fact(&mut self, template: TemplateId, values: Vec<Value>) -> Result<Option<EntityRef>> {
        self.tracer.begin_operation();
        let entity = match self
            .wm
            .insert_fact(template, values, self.config.fact_duplication)?
        {
            FactInsert::Duplicate(existing) => {
                self.net.add_logical_dependencies(existing, true);
                tracing::debug!(entity = %existing, "duplicate fact");
                return Ok(Some(existing));
            }
            FactInsert::New(entity) => entity,
        };
        if !self.net.add_logical_dependencies(entity, false) {
            self.wm.remove_fact(entity.id)?;
            tracing::debug!(%entity, "fact dropped: logical support is gone");
            return Ok(None);
        }
        tracing::debug!(%entity, "fact asserted");
        self.tracer.record(TraceEvent::FactAsserted { entity });
        self.network_assert(entity, None);
        self.finish_operation()?;
        Ok(Some(entity))
    }

    /// Asserts a fact from named slot values; other slots take defaults.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSlot` or a slot value error.
    pub fn assert_named(
        &mut self,
        template: TemplateId,
        slots: &[(&str, Value)],
    ) -> Result<Option<EntityRef>> {
        let values = self.wm.build_fact_values(template, slots)?;
        self.assert_fact(template, values)
    }

    /// Replaces slot values of a fact: the old fact is retracted and a new
    /// one asserted.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the fact is not live, or a slot error.
    pub fn modify_fact(
        &mut self,
        fact: EntityRef,
        changes: &[(&str, Value)],
    ) -> Result<Option<EntityRef>> {
        let current = self
            .wm
            .fact(fact.id)
            .filter(|_| fact.kind == EntityKind::Fact)
            .ok_or_else(|| Error::entity_not_found(fact))?;
        let template = current.template;
        let mut values = current.values.clone();
        for (name, value) in changes {
            let pos = usize::from(self.wm.slot_position(template, name)?);
            values[pos] = value.clone();
        }
        self.retract(fact)?;
        self.assert_fact(template, values)
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Creates a named instance of a class.
    ///
    /// Logical support works as for [`assert_fact`](Self::assert_fact).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDefinition` if the name is in use, or a slot error.
    pub fn make_instance(
        &mut self,
        name: &str,
        class: ClassId,
        slots: &[(&str, Value)],
    ) -> Result<Option<EntityRef>> {
        self.tracer.begin_operation();
        let name = self.wm.intern(name);
        let slots = self.intern_slots(slots);
        let entity = self.wm.insert_instance(name, class, &slots)?;
        if !self.net.add_logical_dependencies(entity, false) {
            self.wm.remove_instance(entity.id)?;
            tracing::debug!(%entity, "instance dropped: logical support is gone");
            return Ok(None);
        }
        tracing::debug!(%entity, "instance created");
        self.tracer.record(TraceEvent::InstanceCreated { entity });
        self.network_assert(entity, None);
        self.finish_operation()?;
        Ok(Some(entity))
    }

    /// Writes slot values on an instance and returns the slots that
    /// actually changed.
    ///
    /// Only patterns sensitive to a changed slot are re-evaluated; every
    /// other match of the instance, and everything built on it, stays.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the instance is not live, or a slot error.
    pub fn modify_instance(
        &mut self,
        instance: EntityRef,
        changes: &[(&str, Value)],
    ) -> Result<Vec<SymbolId>> {
        if instance.kind != EntityKind::Instance || !self.wm.contains(instance) {
            return Err(Error::entity_not_found(instance));
        }
        self.tracer.begin_operation();
        let changes = self.intern_slots(changes);
        let changed = self.wm.update_instance(instance.id, &changes)?;
        if changed.is_empty() {
            return Ok(changed);
        }
        let keys: Vec<SlotKey> = changed.iter().map(|s| SlotKey::Named(*s)).collect();
        tracing::debug!(entity = %instance, slots = keys.len(), "instance modified");
        self.tracer.record(TraceEvent::InstanceModified {
            entity: instance,
            slots: changed.clone(),
        });
        if self.delayed {
            self.pending.push_modify(instance, &keys);
        } else {
            let mut prop = self.propagator();
            prop.retract_entity(instance, Some(&keys));
            prop.assert_entity(instance, Some(&keys));
        }
        self.finish_operation()?;
        Ok(changed)
    }

    /// Deletes an instance.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the instance is not live.
    pub fn unmake_instance(&mut self, instance: EntityRef) -> Result<()> {
        if instance.kind != EntityKind::Instance {
            return Err(Error::entity_not_found(instance));
        }
        self.retract(instance)
    }

    /// Finds a live instance by name.
    #[must_use]
    pub fn instance_by_name(&self, name: &str) -> Option<EntityRef> {
        self.wm
            .interner()
            .get(name)
            .and_then(|sym| self.wm.instance_by_name(sym))
    }

    fn intern_slots(&mut self, slots: &[(&str, Value)]) -> Vec<(SymbolId, Value)> {
        slots
            .iter()
            .map(|(name, value)| (self.wm.intern(name), value.clone()))
            .collect()
    }

    // =========================================================================
    // Retraction
    // =========================================================================

    /// Retracts a fact or deletes an instance.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if the entity is not live.
    pub fn retract(&mut self, entity: EntityRef) -> Result<()> {
        if !self.wm.contains(entity) {
            return Err(Error::entity_not_found(entity));
        }
        self.tracer.begin_operation();
        self.remove_entity(entity)?;
        self.finish_operation()
    }

    /// The network is updated before working memory: join tests run while
    /// unblocking may still read the departing entity.
    fn remove_entity(&mut self, entity: EntityRef) -> Result<()> {
        if self.delayed {
            self.pending.push_retract(entity);
        } else {
            self.propagator().retract_entity(entity, None);
        }
        match entity.kind {
            EntityKind::Fact => {
                self.wm.remove_fact(entity.id)?;
                self.tracer.record(TraceEvent::FactRetracted { entity });
            }
            EntityKind::Instance => {
                self.wm.remove_instance(entity.id)?;
                self.tracer.record(TraceEvent::InstanceDeleted { entity });
            }
        }
        self.net.remove_entity_dependencies(entity);
        tracing::debug!(%entity, "entity retracted");
        Ok(())
    }

    fn network_assert(&mut self, entity: EntityRef, changed: Option<&[SlotKey]>) {
        if self.delayed {
            match changed {
                Some(slots) => self.pending.push_modify(entity, slots),
                None => self.pending.push_assert(entity),
            }
        } else {
            self.propagator().assert_entity(entity, changed);
        }
    }

    /// Runs queued logical retractions unless a rule action is in progress,
    /// then reports the first structural fault the operation hit.
    fn finish_operation(&mut self) -> Result<()> {
        if !self.net.logical.firing {
            self.force_logical_retractions();
        }
        self.take_fault()
    }

    fn take_fault(&mut self) -> Result<()> {
        match self.net.fault.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Retracts every entity that lost its last logical support. Cascades
    /// are handled in the same pass.
    fn force_logical_retractions(&mut self) {
        if self.net.logical.draining {
            return;
        }
        self.net.logical.draining = true;
        while let Some(entity) = self.net.logical.pending.pop_front() {
            if !self.wm.contains(entity) || self.net.is_logically_supported(entity) {
                continue;
            }
            tracing::debug!(%entity, "logical retraction");
            self.tracer.record(TraceEvent::LogicalRetraction { entity });
            if let Err(err) = self.remove_entity(entity) {
                self.net.structural_fault(err);
            }
        }
        self.net.logical.draining = false;
    }

    // =========================================================================
    // Delayed Pattern Matching
    // =========================================================================

    /// Turns delayed pattern matching on or off.
    ///
    /// While delayed, working memory changes immediately but the network
    /// does not; queued changes are applied when the delay is lifted.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if applying the queued changes broke a network
    /// invariant.
    pub fn delay_pattern_matching(&mut self, delay: bool) -> Result<()> {
        if delay {
            self.delayed = true;
            return Ok(());
        }
        if !self.delayed {
            return Ok(());
        }
        self.delayed = false;
        self.tracer.begin_operation();
        self.drain_pending();
        self.finish_operation()
    }

    /// Returns true while pattern matching is delayed.
    #[must_use]
    pub fn is_pattern_matching_delayed(&self) -> bool {
        self.delayed
    }

    /// Network updates waiting for the delay to be lifted.
    #[must_use]
    pub fn pending_actions(&self) -> &PendingActions {
        &self.pending
    }

    /// Applies queued changes: every retraction (including the partial
    /// retraction of a modify) in one batch, then the asserts in order.
    fn drain_pending(&mut self) {
        let actions = self.pending.take();
        if actions.is_empty() {
            return;
        }
        tracing::debug!(count = actions.len(), "applying delayed pattern matching");
        let mut alphas = Vec::new();
        for action in &actions {
            match action {
                PendingAction::Retract(entity) => {
                    alphas.extend(self.net.entity_alphas(*entity, None));
                }
                PendingAction::Modify(entity, slots) => {
                    alphas.extend(self.net.entity_alphas(*entity, Some(slots)));
                }
                PendingAction::Assert(_) => {}
            }
        }
        let mut prop = self.propagator();
        prop.network_retract(&alphas);
        for action in actions {
            match action {
                PendingAction::Assert(entity) => prop.assert_entity(entity, None),
                PendingAction::Modify(entity, slots) => prop.assert_entity(entity, Some(&slots)),
                PendingAction::Retract(_) => {}
            }
        }
    }

    fn ensure_not_delayed(&self, operation: &str) -> Result<()> {
        if self.delayed {
            return Err(Error::new(ErrorKind::JoinOperationInProgress(
                operation.to_string(),
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Compiles a rule into the network.
    ///
    /// Joins identical to existing ones are shared. With incremental reset
    /// enabled the new joins are primed from live data, so the rule sees
    /// entities asserted before it was added.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCondition` for a malformed rule, `DuplicateDefinition`
    /// if the name is taken, or `JoinOperationInProgress` while pattern
    /// matching is delayed.
    pub fn add_rule(&mut self, spec: &RuleSpec) -> Result<RuleId> {
        spec.validate()?;
        self.ensure_not_delayed("add_rule")?;
        let name = self.wm.intern(&spec.name);
        if self.net.rule_names.contains_key(&name) {
            return Err(Error::new(ErrorKind::DuplicateDefinition(spec.name.clone())));
        }
        self.tracer.begin_operation();
        let (rule, log) = match self.net.install_rule(spec, name) {
            Ok(installed) => installed,
            Err(err) => {
                if let Some(partial) = self.net.rule_names.get(&name).copied() {
                    self.propagator().remove_rule(partial);
                }
                return Err(err);
            }
        };
        if self.config.incremental_reset {
            self.propagator().incremental_reset(&log);
        } else {
            self.net.clear_initialize(&log);
        }
        self.tracer.record(TraceEvent::RuleAdded {
            rule: name,
            new_joins: log.joins.len(),
        });
        self.finish_operation()?;
        Ok(rule)
    }

    /// Removes a rule, its activations, and every join and pattern no
    /// other rule uses.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRule` if the rule is not installed, or
    /// `JoinOperationInProgress` while pattern matching is delayed.
    pub fn remove_rule(&mut self, rule: RuleId) -> Result<()> {
        let name = self
            .net
            .rules
            .get(rule)
            .map(|r| r.name)
            .ok_or_else(|| Error::new(ErrorKind::UnknownRule(format!("{rule:?}"))))?;
        self.ensure_not_delayed("remove_rule")?;
        self.tracer.begin_operation();
        self.propagator().remove_rule(rule);
        self.tracer.record(TraceEvent::RuleRemoved { rule: name });
        self.take_fault()
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        let sym = self.wm.interner().get(name)?;
        self.net.rule_names.get(&sym).copied()
    }

    /// Returns a rule's name.
    #[must_use]
    pub fn rule_name(&self, rule: RuleId) -> Option<&str> {
        self.net
            .rules
            .get(rule)
            .map(|r| self.wm.interner().name(r.name))
    }

    /// Number of installed rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.net.rules.len()
    }

    // =========================================================================
    // Firing Scope
    // =========================================================================

    /// Runs a rule action for the activation whose terminal row is `basis`.
    ///
    /// For the duration of `action` the basis row is kept alive even if
    /// the action retracts what it matched, and entities the action
    /// creates are logically supported by the rule's logical row, if the
    /// rule has a logical block. Rows destroyed meanwhile are freed, and
    /// unsupported entities retracted, when the action returns.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if `basis` is not a live activation row.
    pub fn fire_with<R>(&mut self, basis: MatchId, action: impl FnOnce(&mut Self) -> R) -> Result<R> {
        let terminal = self
            .net
            .matches
            .get(basis)
            .filter(|pm| pm.activation && !pm.deleting)
            .and_then(|pm| pm.join())
            .ok_or_else(|| Error::internal("activation row is gone"))?;
        let rule = self
            .net
            .joins
            .get(terminal)
            .and_then(|node| node.rule_to_activate)
            .ok_or_else(|| Error::internal("activation row outside a terminal join"))?;
        let logical_join = self.net.rules[rule]
            .disjuncts
            .iter()
            .find(|d| d.terminal == terminal)
            .and_then(|d| d.logical_join);
        let support = logical_join.and_then(|join| self.net.find_logical_bind(basis, join));

        let saved = (self.net.logical.firing, self.net.logical.current);
        self.net.matches[basis].busy = true;
        self.net.logical.firing = true;
        self.net.logical.current = support;
        tracing::debug!(rule = self.wm.interner().name(self.net.rules[rule].name), ?basis, "firing");

        let result = action(self);

        if let Some(pm) = self.net.matches.get_mut(basis) {
            pm.busy = false;
        }
        (self.net.logical.firing, self.net.logical.current) = saved;
        self.net.flush_garbage();
        self.finish_operation()?;
        Ok(result)
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Removes every entity and partial match, empties the agenda, and
    /// re-primes the leading `not`/`exists` conditions of every rule.
    ///
    /// # Errors
    ///
    /// Returns `JoinOperationInProgress` while pattern matching is delayed.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_not_delayed("reset")?;
        self.tracer.begin_operation();
        let alphas: Vec<MatchId> = self.net.entity_matches.values().flatten().copied().collect();
        tracing::debug!(alpha_matches = alphas.len(), "reset");
        {
            let mut prop = self.propagator();
            prop.network_retract(&alphas);
            prop.clear_placeholders();
        }
        self.wm.clear();
        self.net.logical.clear();
        self.agenda.clear();
        self.propagator().prime_placeholders();
        self.net.flush_garbage();
        self.take_fault()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Network-wide counters.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        self.net.stats()
    }

    /// Partial-match counts per disjunct of a rule.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRule` if the rule is not installed.
    pub fn matches(&self, rule: RuleId) -> Result<Vec<RuleMatches>> {
        if !self.net.rules.contains(rule) {
            return Err(Error::new(ErrorKind::UnknownRule(format!("{rule:?}"))));
        }
        Ok(self.net.rule_matches(rule))
    }

    /// Top-level joins of every disjunct of a rule, terminals last.
    #[must_use]
    pub fn rule_joins(&self, rule: RuleId) -> Vec<JoinId> {
        self.net.rules.get(rule).map_or_else(Vec::new, |r| {
            r.disjuncts
                .iter()
                .flat_map(|d| d.joins.iter().copied().chain(std::iter::once(d.terminal)))
                .collect()
        })
    }

    /// Describes one join.
    #[must_use]
    pub fn join_info(&self, join: JoinId) -> Option<JoinInfo> {
        self.net.joins.get(join).map(|node| node.info())
    }

    /// Recent constraint evaluation failures, oldest first.
    #[must_use]
    pub fn error_trails(&self) -> &[ErrorTrail] {
        &self.net.trails
    }

    /// Forgets recorded evaluation failures.
    pub fn clear_error_trails(&mut self) {
        self.net.trails.clear();
    }

    /// Entities bound by an activation row, in condition order.
    #[must_use]
    pub fn activation_entities(&self, basis: MatchId) -> Option<Vec<Option<EntityRef>>> {
        self.net.matches.get(basis).map(|pm| pm.entities())
    }

    /// True if the entity currently depends on logical support.
    #[must_use]
    pub fn is_logically_supported(&self, entity: EntityRef) -> bool {
        self.net.is_logically_supported(entity)
    }
}
