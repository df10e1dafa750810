//! Builtin functions available to network tests.
//!
//! Predicates return `Value::Bool`. Multifield functions use 1-based
//! indices.

#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;

use reticle_foundation::{Error, ErrorKind, Result, SymbolId, Type, Value};

use super::NativeFn;

// =============================================================================
// Helpers
// =============================================================================

fn type_error(expected: Type, actual: Option<&Value>) -> Error {
    Error::type_mismatch(expected, actual.map_or(Type::Nil, Value::value_type))
}

fn at_least(args: &[Value], n: usize, name: &str) -> Result<()> {
    if args.len() < n {
        return Err(Error::arity_mismatch(format!("{name}: at least {n}"), args.len()));
    }
    Ok(())
}

fn exactly(args: &[Value], n: usize, name: &str) -> Result<()> {
    if args.len() != n {
        return Err(Error::arity_mismatch(format!("{name}: {n}"), args.len()));
    }
    Ok(())
}

fn numeric(value: &Value) -> Result<f64> {
    value
        .as_number()
        .ok_or_else(|| type_error(Type::Number, Some(value)))
}

fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = (numeric(a)?, numeric(b)?);
            Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal))
        }
    }
}

fn chain_compare(args: &[Value], name: &str, pred: fn(Ordering) -> bool) -> Result<Value> {
    at_least(args, 1, name)?;
    for pair in args.windows(2) {
        if !pred(compare(&pair[0], &pair[1])?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn fold_numeric(
    args: &[Value],
    name: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    at_least(args, 1, name)?;
    let mut acc = args[0].clone();
    numeric(&acc)?;
    for arg in &args[1..] {
        acc = match (&acc, arg) {
            (Value::Int(x), Value::Int(y)) => match int_op(*x, *y) {
                Some(v) => Value::Int(v),
                None => Value::Float(float_op(*x as f64, *y as f64)),
            },
            _ => Value::Float(float_op(numeric(&acc)?, numeric(arg)?)),
        };
    }
    Ok(acc)
}

fn multifield_arg<'a>(args: &'a [Value], index: usize) -> Result<&'a reticle_foundation::Multifield> {
    args.get(index)
        .and_then(Value::as_multifield)
        .ok_or_else(|| type_error(Type::Multifield, args.get(index)))
}

// =============================================================================
// Equality and Comparison
// =============================================================================

/// `eq`: every argument equals the first.
pub(crate) fn native_eq(args: &[Value]) -> Result<Value> {
    at_least(args, 2, "eq")?;
    Ok(Value::Bool(args[1..].iter().all(|v| *v == args[0])))
}

/// `neq`: no other argument equals the first.
pub(crate) fn native_neq(args: &[Value]) -> Result<Value> {
    at_least(args, 2, "neq")?;
    Ok(Value::Bool(args[1..].iter().all(|v| *v != args[0])))
}

/// `=`: numeric equality.
pub(crate) fn native_num_eq(args: &[Value]) -> Result<Value> {
    chain_compare(args, "=", |o| o == Ordering::Equal)
}

/// `<>`: numeric inequality against the first argument.
pub(crate) fn native_num_neq(args: &[Value]) -> Result<Value> {
    at_least(args, 2, "<>")?;
    for other in &args[1..] {
        if compare(&args[0], other)? == Ordering::Equal {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

pub(crate) fn native_lt(args: &[Value]) -> Result<Value> {
    chain_compare(args, "<", |o| o == Ordering::Less)
}

pub(crate) fn native_le(args: &[Value]) -> Result<Value> {
    chain_compare(args, "<=", |o| o != Ordering::Greater)
}

pub(crate) fn native_gt(args: &[Value]) -> Result<Value> {
    chain_compare(args, ">", |o| o == Ordering::Greater)
}

pub(crate) fn native_ge(args: &[Value]) -> Result<Value> {
    chain_compare(args, ">=", |o| o != Ordering::Less)
}

// =============================================================================
// Arithmetic
// =============================================================================

pub(crate) fn native_add(args: &[Value]) -> Result<Value> {
    fold_numeric(args, "+", i64::checked_add, |a, b| a + b)
}

pub(crate) fn native_sub(args: &[Value]) -> Result<Value> {
    if args.len() == 1 {
        return match &args[0] {
            Value::Int(x) => Ok(Value::Int(-x)),
            other => Ok(Value::Float(-numeric(other)?)),
        };
    }
    fold_numeric(args, "-", i64::checked_sub, |a, b| a - b)
}

pub(crate) fn native_mul(args: &[Value]) -> Result<Value> {
    fold_numeric(args, "*", i64::checked_mul, |a, b| a * b)
}

/// `/`: always produces a float, as division does in rule tests.
pub(crate) fn native_div(args: &[Value]) -> Result<Value> {
    at_least(args, 2, "/")?;
    let mut acc = numeric(&args[0])?;
    for arg in &args[1..] {
        let d = numeric(arg)?;
        if d == 0.0 {
            return Err(Error::new(ErrorKind::DivisionByZero));
        }
        acc /= d;
    }
    Ok(Value::Float(acc))
}

pub(crate) fn native_mod(args: &[Value]) -> Result<Value> {
    exactly(args, 2, "mod")?;
    match (&args[0], &args[1]) {
        (Value::Int(_), Value::Int(0)) => Err(Error::new(ErrorKind::DivisionByZero)),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x % y)),
        (a, b) => {
            let d = numeric(b)?;
            if d == 0.0 {
                return Err(Error::new(ErrorKind::DivisionByZero));
            }
            Ok(Value::Float(numeric(a)? % d))
        }
    }
}

// =============================================================================
// Logic
// =============================================================================

pub(crate) fn native_not(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "not")?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

// =============================================================================
// Multifield
// =============================================================================

pub(crate) fn native_length(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "length$")?;
    match &args[0] {
        Value::Multifield(mf) => Ok(Value::Int(mf.len() as i64)),
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(type_error(Type::Multifield, Some(other))),
    }
}

/// `nth$`: `(nth$ index multifield)` with a 1-based index.
pub(crate) fn native_nth(args: &[Value]) -> Result<Value> {
    exactly(args, 2, "nth$")?;
    let index = args[0]
        .as_int()
        .ok_or_else(|| type_error(Type::Int, args.first()))?;
    let mf = multifield_arg(args, 1)?;
    if index < 1 || index as usize > mf.len() {
        return Err(Error::new(ErrorKind::IndexOutOfBounds {
            index: index.max(0) as usize,
            length: mf.len(),
        }));
    }
    Ok(mf.get(index as usize - 1).cloned().unwrap_or(Value::Nil))
}

/// `member$`: 1-based position of a value, or the symbol FALSE.
pub(crate) fn native_member(args: &[Value]) -> Result<Value> {
    exactly(args, 2, "member$")?;
    let mf = multifield_arg(args, 1)?;
    Ok(mf
        .position(&args[0])
        .map_or(Value::Symbol(SymbolId::FALSE), |i| Value::Int(i as i64 + 1)))
}

// =============================================================================
// Type Predicates
// =============================================================================

pub(crate) fn native_integerp(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "integerp")?;
    Ok(Value::Bool(matches!(args[0], Value::Int(_))))
}

pub(crate) fn native_floatp(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "floatp")?;
    Ok(Value::Bool(matches!(args[0], Value::Float(_))))
}

pub(crate) fn native_numberp(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "numberp")?;
    Ok(Value::Bool(matches!(args[0], Value::Int(_) | Value::Float(_))))
}

pub(crate) fn native_symbolp(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "symbolp")?;
    Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
}

pub(crate) fn native_stringp(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "stringp")?;
    Ok(Value::Bool(matches!(args[0], Value::String(_))))
}

pub(crate) fn native_multifieldp(args: &[Value]) -> Result<Value> {
    exactly(args, 1, "multifieldp")?;
    Ok(Value::Bool(matches!(args[0], Value::Multifield(_))))
}

/// The builtin table.
pub(crate) const BUILTINS: &[NativeFn] = &[
    NativeFn::new("eq", native_eq),
    NativeFn::new("neq", native_neq),
    NativeFn::new("=", native_num_eq),
    NativeFn::new("<>", native_num_neq),
    NativeFn::new("<", native_lt),
    NativeFn::new("<=", native_le),
    NativeFn::new(">", native_gt),
    NativeFn::new(">=", native_ge),
    NativeFn::new("+", native_add),
    NativeFn::new("-", native_sub),
    NativeFn::new("*", native_mul),
    NativeFn::new("/", native_div),
    NativeFn::new("mod", native_mod),
    NativeFn::new("not", native_not),
    NativeFn::new("length$", native_length),
    NativeFn::new("nth$", native_nth),
    NativeFn::new("member$", native_member),
    NativeFn::new("integerp", native_integerp),
    NativeFn::new("floatp", native_floatp),
    NativeFn::new("numberp", native_numberp),
    NativeFn::new("symbolp", native_symbolp),
    NativeFn::new("stringp", native_stringp),
    NativeFn::new("multifieldp", native_multifieldp),
];

/// Finds a builtin by name.
pub(crate) fn builtin(name: &str) -> Option<NativeFn> {
    BUILTINS.iter().find(|f| f.name == name).copied()
}
