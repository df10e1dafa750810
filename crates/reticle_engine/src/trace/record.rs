//! Trace event and record types.
//!
//! These are the "watch" events of the matcher: entity churn, agenda churn,
//! rule lifecycle, and evaluation problems.

use std::fmt;

use reticle_foundation::{EntityRef, SymbolId};

use crate::network::MatchId;

// =============================================================================
// Trace Event
// =============================================================================

/// Events that can be traced while the network runs.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    /// A fact entered working memory.
    FactAsserted {
        /// The new fact.
        entity: EntityRef,
    },

    /// A fact left working memory.
    FactRetracted {
        /// The retracted fact.
        entity: EntityRef,
    },

    /// An instance was created.
    InstanceCreated {
        /// The new instance.
        entity: EntityRef,
    },

    /// An instance had slots overwritten.
    InstanceModified {
        /// The instance.
        entity: EntityRef,
        /// Slots whose value changed.
        slots: Vec<SymbolId>,
    },

    /// An instance was deleted.
    InstanceDeleted {
        /// The deleted instance.
        entity: EntityRef,
    },

    /// A rule became satisfied.
    ActivationAdded {
        /// The rule.
        rule: SymbolId,
        /// The terminal row.
        basis: MatchId,
        /// Bound entities, `None` for not/exists slots.
        entities: Vec<Option<EntityRef>>,
    },

    /// A rule stopped being satisfied.
    ActivationRemoved {
        /// The rule.
        rule: SymbolId,
        /// The terminal row.
        basis: MatchId,
    },

    /// A rule was compiled into the network.
    RuleAdded {
        /// The rule.
        rule: SymbolId,
        /// Joins allocated for it (shared joins are not counted).
        new_joins: usize,
    },

    /// A rule was detached from the network.
    RuleRemoved {
        /// The rule.
        rule: SymbolId,
    },

    /// An entity lost its last logical support and was retracted.
    LogicalRetraction {
        /// The entity.
        entity: EntityRef,
    },

    /// A constraint failed to evaluate.
    EvaluationError {
        /// Error text.
        message: String,
        /// Entity under test, when known.
        entity: Option<EntityRef>,
        /// Rules whose network contains the failing node.
        rules: Vec<SymbolId>,
    },
}

impl TraceEvent {
    /// Returns a short name for the event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FactAsserted { .. } => "fact-asserted",
            Self::FactRetracted { .. } => "fact-retracted",
            Self::InstanceCreated { .. } => "instance-created",
            Self::InstanceModified { .. } => "instance-modified",
            Self::InstanceDeleted { .. } => "instance-deleted",
            Self::ActivationAdded { .. } => "activation-added",
            Self::ActivationRemoved { .. } => "activation-removed",
            Self::RuleAdded { .. } => "rule-added",
            Self::RuleRemoved { .. } => "rule-removed",
            Self::LogicalRetraction { .. } => "logical-retraction",
            Self::EvaluationError { .. } => "evaluation-error",
        }
    }

    /// Returns the watch category this event belongs to.
    #[must_use]
    pub fn watch_item(&self) -> WatchItem {
        match self {
            Self::FactAsserted { .. } | Self::FactRetracted { .. } => WatchItem::Facts,
            Self::InstanceCreated { .. }
            | Self::InstanceModified { .. }
            | Self::InstanceDeleted { .. } => WatchItem::Instances,
            Self::ActivationAdded { .. } | Self::ActivationRemoved { .. } => {
                WatchItem::Activations
            }
            Self::RuleAdded { .. } | Self::RuleRemoved { .. } => WatchItem::Rules,
            Self::LogicalRetraction { .. } => WatchItem::Support,
            Self::EvaluationError { .. } => WatchItem::Errors,
        }
    }
}

/// Arrow-style watch line: `==>` for additions, `<==` for removals.
impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FactAsserted { entity } | Self::InstanceCreated { entity } => {
                write!(f, "==> {entity}")
            }
            Self::FactRetracted { entity } | Self::InstanceDeleted { entity } => {
                write!(f, "<== {entity}")
            }
            Self::InstanceModified { entity, slots } => {
                write!(f, "::= {entity} {slots:?}")
            }
            Self::ActivationAdded { rule, entities, .. } => {
                write!(f, "==> Activation {rule:?}:")?;
                for entity in entities {
                    match entity {
                        Some(e) => write!(f, " {e}")?,
                        None => f.write_str(" *")?,
                    }
                }
                Ok(())
            }
            Self::ActivationRemoved { rule, .. } => write!(f, "<== Activation {rule:?}"),
            Self::RuleAdded { rule, new_joins } => {
                write!(f, "+rule {rule:?} ({new_joins} new joins)")
            }
            Self::RuleRemoved { rule } => write!(f, "-rule {rule:?}"),
            Self::LogicalRetraction { entity } => write!(f, "<== {entity} (unsupported)"),
            Self::EvaluationError { message, entity, .. } => match entity {
                Some(e) => write!(f, "[ERROR] {e}: {message}"),
                None => write!(f, "[ERROR] {message}"),
            },
        }
    }
}

/// A category that can be watched independently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WatchItem {
    /// Fact assertion and retraction.
    Facts,
    /// Instance creation, modification, and deletion.
    Instances,
    /// Agenda churn.
    Activations,
    /// Rules entering and leaving the network.
    Rules,
    /// Retractions caused by lost logical support.
    Support,
    /// Evaluation errors.
    Errors,
}

impl WatchItem {
    /// Every category.
    pub const ALL: [WatchItem; 6] = [
        Self::Facts,
        Self::Instances,
        Self::Activations,
        Self::Rules,
        Self::Support,
        Self::Errors,
    ];
}

// =============================================================================
// Trace Record
// =============================================================================

/// A sequenced trace record.
#[derive(Clone, Debug)]
pub struct TraceRecord {
    /// Unique record ID within the session.
    pub id: u64,
    /// Top-level operation that produced the event.
    pub operation: u64,
    /// Timestamp in nanoseconds since the tracer was created.
    pub timestamp_ns: u64,
    /// The trace event.
    pub event: TraceEvent,
}

impl TraceRecord {
    /// Creates a new trace record.
    #[must_use]
    pub fn new(id: u64, operation: u64, timestamp_ns: u64, event: TraceEvent) -> Self {
        Self {
            id,
            operation,
            timestamp_ns,
            event,
        }
    }

    /// Returns the event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}
