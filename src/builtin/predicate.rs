use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::{RunTime, expect_n_args};
use crate::value::{SchemeValue, eq, equal, eqv};

fn equivalence(
    args: &[SchemeValue],
    same: fn(&SchemeValue, &SchemeValue) -> bool,
) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    Ok(SchemeValue::Bool(same(&args[0], &args[1])))
}

pub fn eq_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    equivalence(args, eq)
}

pub fn eqv_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    equivalence(args, eqv)
}

pub fn equal_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    equivalence(args, equal)
}

pub fn not_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    Ok(SchemeValue::Bool(args[0].is_false()))
}

/// Predicates applicable to any value: a non-number answers `#f`.
fn any_number(
    args: &[SchemeValue],
    holds: fn(&SchemeValue) -> bool,
) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    let result = match &args[0] {
        n @ (SchemeValue::Int(_) | SchemeValue::Float(_)) => holds(n),
        _ => false,
    };
    Ok(SchemeValue::Bool(result))
}

/// Predicates defined only on numbers.
fn only_number(
    args: &[SchemeValue],
    holds: fn(&SchemeValue) -> Result<bool, SchemeError>,
) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    match &args[0] {
        n @ (SchemeValue::Int(_) | SchemeValue::Float(_)) => Ok(SchemeValue::Bool(holds(n)?)),
        other => Err(SchemeError::wrong_type(other, "Number")),
    }
}

fn is_integral(value: &SchemeValue) -> bool {
    match value {
        SchemeValue::Int(_) => true,
        SchemeValue::Float(f) => f.fract() == 0.0,
        _ => false,
    }
}

fn parity(value: &SchemeValue) -> Result<i64, SchemeError> {
    match value {
        SchemeValue::Int(i) => Ok(i.rem_euclid(2)),
        SchemeValue::Float(f) if f.fract() == 0.0 => Ok(f.rem_euclid(2.0) as i64),
        other => Err(SchemeError::wrong_type(other, "Integer")),
    }
}

pub fn number_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    any_number(args, |_| true)
}

pub fn integer_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    any_number(args, is_integral)
}

/// `real?`, `rational?` and `complex?` share this: every number is real.
pub fn real_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    any_number(args, |_| true)
}

pub fn exact_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    only_number(args, |n| Ok(matches!(n, SchemeValue::Int(_))))
}

pub fn inexact_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    only_number(args, |n| Ok(matches!(n, SchemeValue::Float(_))))
}

pub fn zero_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    only_number(args, |n| {
        Ok(match n {
            SchemeValue::Int(i) => *i == 0,
            SchemeValue::Float(f) => *f == 0.0,
            _ => false,
        })
    })
}

pub fn odd_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    only_number(args, |n| Ok(parity(n)? == 1))
}

pub fn even_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    only_number(args, |n| Ok(parity(n)? == 0))
}

macro_rules! type_predicates {
    ($($func:ident => $pattern:pat),* $(,)?) => {
        $(
            pub fn $func(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
                expect_n_args(args, 1)?;
                Ok(SchemeValue::Bool(matches!(&args[0], $pattern)))
            }
        )*
    };
}

type_predicates!(
    boolean_q => SchemeValue::Bool(_),
    symbol_q => SchemeValue::Symbol(_),
    string_q => SchemeValue::Str(_),
    pair_q => SchemeValue::Pair(_),
    char_q => SchemeValue::Char(_),
    vector_q => SchemeValue::Vector(_),
    null_q => SchemeValue::Nil,
);

/// Continuations count as procedures; special forms do not.
pub fn procedure_q(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    Ok(SchemeValue::Bool(args[0].is_procedure()))
}

pub fn register_predicate_builtins(env: &EnvRef) {
    register_builtin_family!(env,
        "eq?" => eq_q,
        "eqv?" => eqv_q,
        "equal?" => equal_q,
        "not" => not_b,
        "number?" => number_q,
        "integer?" => integer_q,
        "real?" => real_q,
        "rational?" => real_q,
        "complex?" => real_q,
        "exact?" => exact_q,
        "inexact?" => inexact_q,
        "zero?" => zero_q,
        "odd?" => odd_q,
        "even?" => even_q,
        "boolean?" => boolean_q,
        "symbol?" => symbol_q,
        "string?" => string_q,
        "pair?" => pair_q,
        "procedure?" => procedure_q,
        "char?" => char_q,
        "vector?" => vector_q,
        "null?" => null_q,
    );
}
