//! Integration tests for Multifield
//!
//! Tests persistence, slicing, and membership.

use reticle_foundation::{Multifield, Value};

fn ints(values: &[i64]) -> Multifield {
    values.iter().copied().map(Value::Int).collect()
}

#[test]
fn push_back_leaves_original_untouched() {
    let a = ints(&[1, 2]);
    let b = a.push_back(Value::Int(3));
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 3);
    assert_eq!(b.get(2), Some(&Value::Int(3)));
}

#[test]
fn slice_is_end_exclusive() {
    let mf = ints(&[1, 2, 3, 4]);
    assert_eq!(mf.slice(1, 3), ints(&[2, 3]));
    assert!(mf.slice(2, 2).is_empty());
}

#[test]
fn slice_clamps_out_of_range_bounds() {
    let mf = ints(&[1, 2, 3]);
    assert_eq!(mf.slice(1, 10), ints(&[2, 3]));
    assert!(mf.slice(5, 2).is_empty());
}

#[test]
fn membership() {
    let mf = ints(&[4, 5, 4]);
    assert!(mf.contains(&Value::Int(5)));
    assert_eq!(mf.position(&Value::Int(4)), Some(0));
    assert_eq!(mf.position(&Value::Int(9)), None);
}

#[test]
fn display_is_parenthesized() {
    assert_eq!(ints(&[1, 2]).to_string(), "(1 2)");
    assert_eq!(Multifield::new().to_string(), "()");
}
