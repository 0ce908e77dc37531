/// Vector primitives. Every access is bounds checked.
use super::string::{expect_count, expect_index};
use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::{RunTime, expect_args_range, expect_n_args};
use crate::value::{SchemeValue, new_vector};
use std::cell::RefCell;
use std::rc::Rc;

fn expect_vector(value: &SchemeValue) -> Result<Rc<RefCell<Vec<SchemeValue>>>, SchemeError> {
    match value {
        SchemeValue::Vector(v) => Ok(v.clone()),
        other => Err(SchemeError::wrong_type(other, "Vector")),
    }
}

/// (vector obj ...)
pub fn vector_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    Ok(new_vector(args.to_vec()))
}

/// (make-vector k [fill])
/// Without a fill the slots hold the unspecified value. A size the
/// allocator refuses is reported as a `Length` error.
pub fn make_vector_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_args_range(args, 1, 2)?;
    let count = expect_count(&args[0])?;
    let fill = args.get(1).cloned().unwrap_or(SchemeValue::Unspecified);
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|_| SchemeError::wrong_type(&args[0], "Length"))?;
    items.resize(count, fill);
    Ok(new_vector(items))
}

/// (vector-length vector)
pub fn vector_length_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    let len = expect_vector(&args[0])?.borrow().len();
    Ok(SchemeValue::Int(len as i64))
}

/// (vector-ref vector k)
pub fn vector_ref_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    let v = expect_vector(&args[0])?;
    let v = v.borrow();
    let index = expect_index(&args[1], v.len())?;
    Ok(v[index].clone())
}

/// (vector-set! vector k obj)
pub fn vector_set_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 3)?;
    let v = expect_vector(&args[0])?;
    let mut v = v.borrow_mut();
    let index = expect_index(&args[1], v.len())?;
    v[index] = args[2].clone();
    Ok(SchemeValue::Unspecified)
}

pub fn register_vector_builtins(env: &EnvRef) {
    register_builtin_family!(env,
        "vector" => vector_b,
        "make-vector" => make_vector_b,
        "vector-length" => vector_length_b,
        "vector-ref" => vector_ref_b,
        "vector-set!" => vector_set_b,
    );
}
