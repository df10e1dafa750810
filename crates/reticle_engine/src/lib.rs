//! Rete pattern network, join propagation, and truth maintenance for Reticle.
//!
//! This crate provides:
//! - [`Engine`] - Working memory kept in step with the join network
//! - [`RuleSpec`] / [`Condition`] - Compiled rule left-hand sides
//! - [`FactPattern`] / [`ObjectPattern`] - Alpha constraints per entity kind
//! - [`Expr`] - Join and pattern test expressions
//! - [`Agenda`] / [`ActivationList`] - Where activations are reported
//! - [`Tracer`] - The watch facility
//! - [`Snapshot`] - Structural snapshot of the network

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agenda;
pub mod alpha;
mod build;
pub mod config;
mod detach;
pub mod diagnostics;
mod drive;
pub mod engine;
pub mod expr;
mod incremental;
mod logical;
pub mod network;
pub mod queue;
mod retract;
pub mod rule;
pub mod snapshot;
pub mod stats;
pub mod trace;

pub use agenda::{Activation, ActivationList, Agenda};
pub use alpha::{FactPattern, FieldConstraint, FieldTest, ObjectPattern, SlotConstraint, SlotPattern};
pub use config::EngineConfig;
pub use diagnostics::ErrorTrail;
pub use engine::Engine;
pub use expr::{Expr, FieldAccess, FieldRef, FunctionRegistry, NativeFn, Side};
pub use network::{JoinId, JoinInfo, JoinStats, MatchId, PatternId};
pub use queue::{PendingAction, PendingActions};
pub use rule::{Condition, ConditionEntry, RuleId, RuleSpec};
pub use snapshot::{JoinRecord, LinkRecord, PatternRecord, RuleRecord, Snapshot};
pub use stats::{NetworkStats, RuleMatches};
pub use trace::{TraceEvent, TraceOutput, TraceRecord, Tracer, TracerConfig, WatchItem};
