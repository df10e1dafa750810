//! Error types for the Reticle system.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

use crate::entity::EntityRef;
use crate::types::Type;

/// The main error type for Reticle operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates an entity not found error.
    #[must_use]
    pub fn entity_not_found(entity: EntityRef) -> Self {
        Self::new(ErrorKind::EntityNotFound(entity))
    }

    /// Creates a stale entity reference error.
    #[must_use]
    pub fn stale_entity(entity: EntityRef) -> Self {
        Self::new(ErrorKind::StaleEntity(entity))
    }

    /// Creates an undefined function error.
    #[must_use]
    pub fn undefined_function(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedFunction(name.into()))
    }

    /// Creates an arity mismatch error.
    #[must_use]
    pub fn arity_mismatch(expected: impl Into<String>, actual: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch {
            expected: expected.into(),
            actual,
        })
    }

    /// Creates an unknown slot error.
    #[must_use]
    pub fn unknown_slot(owner: impl Into<String>, slot: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownSlot {
            owner: owner.into(),
            slot: slot.into(),
        })
    }

    /// Creates an invalid condition error.
    #[must_use]
    pub fn invalid_condition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCondition(message.into()))
    }

    /// Creates an internal invariant violation error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this error reports a broken network invariant.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::Internal(_))
    }
}

/// Categorized error kinds.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Type mismatch during runtime type checking.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: Type,
        /// The actual type encountered.
        actual: Type,
    },

    /// Entity was not found in working memory.
    #[error("entity not found: {0:?}")]
    EntityNotFound(EntityRef),

    /// Entity reference is stale (generation mismatch).
    #[error("stale entity reference: {0:?}")]
    StaleEntity(EntityRef),

    /// Symbol was not defined.
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    /// Function was not registered.
    #[error("undefined function: {0}")]
    UndefinedFunction(String),

    /// Wrong number of arguments to function.
    #[error("arity mismatch: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Description of expected arity.
        expected: String,
        /// Actual number of arguments.
        actual: usize,
    },

    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Index out of bounds.
    #[error("index out of bounds: {index} (length {length})")]
    IndexOutOfBounds {
        /// The index that was accessed.
        index: usize,
        /// The actual length of the collection.
        length: usize,
    },

    /// No template with this name.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// No class with this name.
    #[error("unknown class: {0}")]
    UnknownClass(String),

    /// Slot not declared by the template or class.
    #[error("unknown slot {slot} in {owner}")]
    UnknownSlot {
        /// Template or class name.
        owner: String,
        /// The slot that was not found.
        slot: String,
    },

    /// A slot value does not fit the slot declaration.
    #[error("invalid value for slot {slot}: {message}")]
    InvalidSlotValue {
        /// The slot being written.
        slot: String,
        /// What was wrong.
        message: String,
    },

    /// A construct with this name already exists.
    #[error("duplicate definition: {0}")]
    DuplicateDefinition(String),

    /// No rule with this identifier or name.
    #[error("unknown rule: {0}")]
    UnknownRule(String),

    /// A condition list cannot be turned into a network.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// A working-memory change was requested while it cannot be honoured.
    #[error("join operation in progress: {0}")]
    JoinOperationInProgress(String),

    /// Expression evaluation failed.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Snapshot encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error (a network invariant does not hold).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule or construct name.
    pub source: Option<String>,
    /// Entity being processed, if any.
    pub entity: Option<EntityRef>,
    /// Slot or field being tested, if any.
    pub slot: Option<String>,
    /// Chain of joins or rules the error passed through.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source construct.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the entity being processed.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Sets the slot being tested.
    #[must_use]
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "in {source}")?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " while matching {entity}")?;
        }
        if let Some(slot) = &self.slot {
            write!(f, " slot {slot}")?;
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  of {frame}")?;
            }
        }
        Ok(())
    }
}
