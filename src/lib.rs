//! Reticle - Rete-style forward-chaining matcher
//!
//! This crate re-exports all layers of the Reticle system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: reticle_engine     : Alpha networks, joins, retraction, truth maintenance
//! Layer 1: reticle_storage    : Facts, instances, templates, classes
//! Layer 0: reticle_foundation : Core types (Value, EntityRef, Error)
//! ```

pub use reticle_engine as engine;
pub use reticle_foundation as foundation;
pub use reticle_storage as storage;
