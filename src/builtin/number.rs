/// Arithmetic and numeric comparison.
///
/// Exact integers stay exact until a result overflows `i64` or mixes with an
/// inexact operand, at which point the result becomes an `f64`.
use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::RunTime;
use crate::value::SchemeValue;
use num_traits::{CheckedAdd, CheckedMul, CheckedSub, ToPrimitive};
use std::cmp::Ordering;

fn expect_number(value: &SchemeValue) -> Result<(), SchemeError> {
    match value {
        SchemeValue::Int(_) | SchemeValue::Float(_) => Ok(()),
        _ => Err(SchemeError::wrong_type(value, "Number")),
    }
}

pub fn to_f64(value: &SchemeValue) -> f64 {
    match value {
        SchemeValue::Int(i) => i.to_f64().unwrap_or(f64::NAN),
        SchemeValue::Float(f) => *f,
        _ => f64::NAN,
    }
}

/// Apply an operator exactly when both operands are exact and the result
/// fits, inexactly otherwise.
fn arith(
    a: &SchemeValue,
    b: &SchemeValue,
    exact: fn(&i64, &i64) -> Option<i64>,
    inexact: fn(f64, f64) -> f64,
) -> SchemeValue {
    if let (SchemeValue::Int(x), SchemeValue::Int(y)) = (a, b) {
        if let Some(result) = exact(x, y) {
            return SchemeValue::Int(result);
        }
    }
    SchemeValue::Float(inexact(to_f64(a), to_f64(b)))
}

fn add(a: &SchemeValue, b: &SchemeValue) -> SchemeValue {
    arith(a, b, <i64 as CheckedAdd>::checked_add, |x, y| x + y)
}

fn sub(a: &SchemeValue, b: &SchemeValue) -> SchemeValue {
    arith(a, b, <i64 as CheckedSub>::checked_sub, |x, y| x - y)
}

fn mul(a: &SchemeValue, b: &SchemeValue) -> SchemeValue {
    arith(a, b, <i64 as CheckedMul>::checked_mul, |x, y| x * y)
}

fn div(a: &SchemeValue, b: &SchemeValue) -> Result<SchemeValue, SchemeError> {
    if let (SchemeValue::Int(x), SchemeValue::Int(y)) = (a, b) {
        if *y == 0 {
            return Err(SchemeError::wrong_type(b, "NonZero"));
        }
        if x.checked_rem(*y) == Some(0) {
            if let Some(q) = x.checked_div(*y) {
                return Ok(SchemeValue::Int(q));
            }
        }
    }
    Ok(SchemeValue::Float(to_f64(a) / to_f64(b)))
}

/// Left fold over at least one argument.
fn fold(
    args: &[SchemeValue],
    op: impl Fn(&SchemeValue, &SchemeValue) -> Result<SchemeValue, SchemeError>,
) -> Result<SchemeValue, SchemeError> {
    for arg in args {
        expect_number(arg)?;
    }
    let mut acc = args[0].clone();
    for arg in &args[1..] {
        acc = op(&acc, arg)?;
    }
    Ok(acc)
}

/// (+ n ...)
pub fn plus_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    if args.is_empty() {
        return Ok(SchemeValue::Int(0));
    }
    fold(args, |a, b| Ok(add(a, b)))
}

/// (- n ...); a single argument is negated
pub fn minus_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    match args.len() {
        0 => Err(SchemeError::wrong_args(0, ">=1")),
        1 => {
            expect_number(&args[0])?;
            Ok(sub(&SchemeValue::Int(0), &args[0]))
        }
        _ => fold(args, |a, b| Ok(sub(a, b))),
    }
}

/// (* n ...)
pub fn times_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    if args.is_empty() {
        return Ok(SchemeValue::Int(1));
    }
    fold(args, |a, b| Ok(mul(a, b)))
}

/// (/ n ...); a single argument is inverted
pub fn div_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    match args.len() {
        0 => Err(SchemeError::wrong_args(0, ">=1")),
        1 => {
            expect_number(&args[0])?;
            div(&SchemeValue::Int(1), &args[0])
        }
        _ => fold(args, div),
    }
}

fn compare(
    args: &[SchemeValue],
    holds: fn(Ordering) -> bool,
) -> Result<SchemeValue, SchemeError> {
    if args.len() < 2 {
        return Ok(SchemeValue::Bool(true));
    }
    for arg in args {
        expect_number(arg)?;
    }
    for pair in args.windows(2) {
        let ordering = match (&pair[0], &pair[1]) {
            (SchemeValue::Int(a), SchemeValue::Int(b)) => Some(a.cmp(b)),
            (a, b) => to_f64(a).partial_cmp(&to_f64(b)),
        };
        if !ordering.is_some_and(holds) {
            return Ok(SchemeValue::Bool(false));
        }
    }
    Ok(SchemeValue::Bool(true))
}

pub fn num_eq_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    compare(args, Ordering::is_eq)
}

pub fn lt_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    compare(args, Ordering::is_lt)
}

pub fn le_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    compare(args, Ordering::is_le)
}

pub fn gt_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    compare(args, Ordering::is_gt)
}

pub fn ge_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    compare(args, Ordering::is_ge)
}

pub fn register_number_builtins(env: &EnvRef) {
    register_builtin_family!(env,
        "+" => plus_b,
        "-" => minus_b,
        "*" => times_b,
        "/" => div_b,
        "=" => num_eq_b,
        "<" => lt_b,
        "<=" => le_b,
        ">" => gt_b,
        ">=" => ge_b,
    );
}
