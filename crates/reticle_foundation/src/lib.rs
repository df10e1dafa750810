//! Core values, identifiers, and errors for Reticle.
//!
//! This crate provides:
//! - [`Value`] - The field value type stored in facts and instances
//! - [`Multifield`] - Persistent variable-length field values
//! - [`EntityId`] / [`EntityRef`] - Generational working-memory identifiers
//! - [`Type`] - Slot type descriptors
//! - [`Error`] - Rich error types with context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod entity;
mod error;
mod intern;
mod multifield;
mod types;
mod value;

pub use entity::{EntityId, EntityKind, EntityRef};
pub use error::{Error, ErrorContext, ErrorKind};
pub use intern::{Interner, SymbolId};
pub use multifield::Multifield;
pub use types::Type;
pub use value::Value;

/// Result type alias using the Reticle error type.
pub type Result<T> = std::result::Result<T, Error>;
