//! Integration tests for Value types
//!
//! Tests truthiness, equality, hashing, ordering, and display.

use reticle_foundation::{EntityId, EntityRef, Interner, Multifield, SymbolId, Type, Value};
use std::collections::HashSet;

// =============================================================================
// Construction
// =============================================================================

#[test]
fn conversions_pick_the_obvious_variant() {
    assert_eq!(Value::from(3i64), Value::Int(3));
    assert_eq!(Value::from(3i32), Value::Int(3));
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from("a").as_str(), Some("a"));
    let fact = EntityRef::fact(EntityId::new(1, 1));
    assert_eq!(Value::from(fact).as_entity(), Some(fact));
}

#[test]
fn value_types() {
    assert_eq!(Value::Nil.value_type(), Type::Nil);
    assert_eq!(Value::Int(1).value_type(), Type::Int);
    assert_eq!(Value::Float(1.5).value_type(), Type::Float);
    assert_eq!(
        Value::from(vec![Value::Int(1)]).value_type(),
        Type::Multifield
    );
}

// =============================================================================
// Truthiness
// =============================================================================

#[test]
fn only_nil_false_and_false_symbol_are_falsy() {
    assert!(!Value::Nil.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(!Value::Symbol(SymbolId::FALSE).is_truthy());
    assert!(Value::Int(0).is_truthy());
    assert!(Value::from("").is_truthy());
    assert!(Value::Multifield(Multifield::new()).is_truthy());
}

// =============================================================================
// Equality and Hashing
// =============================================================================

#[test]
fn equal_values_hash_equal() {
    let a = Value::from(vec![Value::Int(1), Value::from("x")]);
    let b = Value::from(vec![Value::Int(1), Value::from("x")]);
    assert_eq!(a, b);
    assert_eq!(a.hash_code(), b.hash_code());

    let set: HashSet<Value> = [a, b, Value::Int(1)].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn floats_compare_by_bits() {
    assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    assert_ne!(Value::Int(1), Value::Float(1.0));
}

#[test]
fn numbers_order_across_int_and_float() {
    assert!(Value::Int(1) < Value::Float(1.5));
    assert!(Value::Float(2.5) > Value::Int(2));
    assert_eq!(Value::Int(1).partial_cmp(&Value::from("1")), None);
}

// =============================================================================
// Display
// =============================================================================

#[test]
fn display_resolves_symbols() {
    let mut interner = Interner::new();
    let red = interner.intern("red");
    let value = Value::from(vec![Value::Symbol(red), Value::Int(2)]);
    assert_eq!(value.display(&interner).to_string(), "(red 2)");
    assert_eq!(Value::from("s").to_string(), "\"s\"");
}

#[test]
fn reserved_symbols_are_preinterned() {
    let interner = Interner::new();
    assert_eq!(interner.get("nil"), Some(SymbolId::NIL));
    assert_eq!(interner.get("TRUE"), Some(SymbolId::TRUE));
    assert_eq!(interner.get("FALSE"), Some(SymbolId::FALSE));
}
