//! Working memory of facts and object instances for Reticle.
//!
//! This crate provides:
//! - [`EntityStore`] - Generational allocation of fact and instance slots
//! - [`TemplateSchema`] / [`ClassSchema`] - Slot layouts for facts and instances
//! - [`Fact`] / [`Instance`] - The two entity kinds the pattern network matches
//! - [`PatternEntity`] - The capability interface the network uses to read fields
//! - [`WorkingMemory`] - The live set of entities with duplicate detection

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod entity;
mod fact;
mod instance;
mod memory;
mod schema;
mod store;

pub use entity::{PatternEntity, SlotKey};
pub use fact::Fact;
pub use instance::Instance;
pub use memory::{FactInsert, WorkingMemory};
pub use schema::{ClassId, ClassSchema, SlotLayout, SlotSchema, TemplateId, TemplateSchema};
pub use store::EntityStore;
