//! Integration tests for Error
//!
//! Tests error kinds, helper constructors, context, and display.

use reticle_foundation::{EntityId, EntityRef, Error, ErrorContext, ErrorKind, Type};

#[test]
fn helpers_build_the_matching_kind() {
    assert!(matches!(
        Error::type_mismatch(Type::Int, Type::String).kind,
        ErrorKind::TypeMismatch { .. }
    ));
    assert!(matches!(
        Error::undefined_function("frob").kind,
        ErrorKind::UndefinedFunction(ref name) if name == "frob"
    ));
    assert!(matches!(
        Error::invalid_condition("empty").kind,
        ErrorKind::InvalidCondition(_)
    ));
    assert!(Error::internal("broken link").is_internal());
    assert!(!Error::new(ErrorKind::DivisionByZero).is_internal());
}

#[test]
fn display_uses_the_kind() {
    let err = Error::new(ErrorKind::IndexOutOfBounds {
        index: 4,
        length: 2,
    });
    assert_eq!(err.to_string(), "index out of bounds: 4 (length 2)");
    let err = Error::new(ErrorKind::JoinOperationInProgress("add_rule".into()));
    assert!(err.to_string().contains("add_rule"));
}

#[test]
fn context_is_attached() {
    let fact = EntityRef::fact(EntityId::new(3, 1));
    let err = Error::entity_not_found(fact).with_context(
        ErrorContext::new()
            .with_source("rule-a")
            .with_entity(fact)
            .with_slot("x"),
    );
    let context = err.context.expect("context");
    assert_eq!(context.source.as_deref(), Some("rule-a"));
    assert_eq!(context.entity, Some(fact));
    assert_eq!(context.slot.as_deref(), Some("x"));
}
