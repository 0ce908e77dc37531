/// String primitives. Strings are shared and mutable; indices count characters.
use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::{RunTime, expect_args_range, expect_n_args};
use crate::value::{SchemeValue, new_string};
use std::cell::RefCell;
use std::rc::Rc;

fn expect_string(value: &SchemeValue) -> Result<Rc<RefCell<String>>, SchemeError> {
    match value {
        SchemeValue::Str(s) => Ok(s.clone()),
        other => Err(SchemeError::wrong_type(other, "String")),
    }
}

/// Resolve `index` against a sequence of `len` items.
pub(crate) fn expect_index(index: &SchemeValue, len: usize) -> Result<usize, SchemeError> {
    let i = index
        .as_int()
        .ok_or_else(|| SchemeError::wrong_type(index, "Integer"))?;
    usize::try_from(i)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| SchemeError::wrong_type(index, "Index"))
}

/// Resolve the requested size of a new string or vector.
pub(crate) fn expect_count(count: &SchemeValue) -> Result<usize, SchemeError> {
    match count {
        SchemeValue::Int(n) => {
            usize::try_from(*n).map_err(|_| SchemeError::wrong_type(count, "Integer"))
        }
        other => Err(SchemeError::wrong_type(other, "Integer")),
    }
}

/// (make-string k [char])
/// A size the allocator refuses is reported as a `Length` error.
pub fn make_string_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_args_range(args, 1, 2)?;
    let count = expect_count(&args[0])?;
    let fill = match args.get(1) {
        None => ' ',
        Some(SchemeValue::Char(c)) => *c,
        Some(other) => return Err(SchemeError::wrong_type(other, "Character")),
    };
    let too_long = || SchemeError::wrong_type(&args[0], "Length");
    let bytes = count.checked_mul(fill.len_utf8()).ok_or_else(too_long)?;
    let mut text = String::new();
    text.try_reserve_exact(bytes).map_err(|_| too_long())?;
    text.extend(std::iter::repeat_n(fill, count));
    Ok(new_string(&text))
}

/// (string-length string)
pub fn string_length_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    let s = expect_string(&args[0])?;
    let len = s.borrow().chars().count();
    Ok(SchemeValue::Int(len as i64))
}

/// (string-ref string k)
pub fn string_ref_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    let s = expect_string(&args[0])?;
    let s = s.borrow();
    let index = expect_index(&args[1], s.chars().count())?;
    s.chars()
        .nth(index)
        .map(SchemeValue::Char)
        .ok_or_else(|| SchemeError::wrong_type(&args[1], "Index"))
}

/// (string-set! string k char)
pub fn string_set_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 3)?;
    let s = expect_string(&args[0])?;
    let c = match &args[2] {
        SchemeValue::Char(c) => *c,
        other => return Err(SchemeError::wrong_type(other, "Character")),
    };
    let mut s = s.borrow_mut();
    let index = expect_index(&args[1], s.chars().count())?;
    let updated: String = s
        .chars()
        .enumerate()
        .map(|(i, old)| if i == index { c } else { old })
        .collect();
    *s = updated;
    Ok(SchemeValue::Unspecified)
}

pub fn register_string_builtins(env: &EnvRef) {
    register_builtin_family!(env,
        "make-string" => make_string_b,
        "string-length" => string_length_b,
        "string-ref" => string_ref_b,
        "string-set!" => string_set_b,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_value;

    fn call(
        f: fn(&mut RunTime, &[SchemeValue]) -> Result<SchemeValue, SchemeError>,
        args: &[SchemeValue],
    ) -> String {
        let mut rt = RunTime::new();
        match f(&mut rt, args) {
            Ok(v) => print_value(&v),
            Err(e) => e.to_string(),
        }
    }

    #[test]
    fn test_make_string() {
        assert_eq!(call(make_string_b, &[SchemeValue::Int(3)]), "\"   \"");
        assert_eq!(
            call(make_string_b, &[SchemeValue::Int(2), SchemeValue::Char('x')]),
            "\"xx\""
        );
        assert_eq!(call(make_string_b, &[SchemeValue::Int(0)]), "\"\"");
        assert_eq!(
            call(make_string_b, &[SchemeValue::Float(1.0)]),
            "Wrong argument type: 1.0 is not Integer"
        );
        assert_eq!(
            call(make_string_b, &[SchemeValue::Int(1), SchemeValue::Int(1)]),
            "Wrong argument type: 1 is not Character"
        );
        assert_eq!(call(make_string_b, &[]), "Wrong number of args. Got: 0, expected: 1-2");
    }

    #[test]
    fn test_make_string_too_large() {
        assert_eq!(
            call(make_string_b, &[SchemeValue::Int(4611686018427387904)]),
            "Wrong argument type: 4611686018427387904 is not Length"
        );
        assert_eq!(
            call(make_string_b, &[SchemeValue::Int(i64::MAX), SchemeValue::Char('λ')]),
            "Wrong argument type: 9223372036854775807 is not Length"
        );
        assert_eq!(
            call(make_string_b, &[SchemeValue::Int(2), SchemeValue::Char('λ')]),
            "\"λλ\""
        );
    }

    #[test]
    fn test_string_access() {
        let s = new_string("héllo");
        assert_eq!(call(string_length_b, &[s.clone()]), "5");
        assert_eq!(call(string_ref_b, &[s.clone(), SchemeValue::Int(1)]), "#\\é");
        assert_eq!(
            call(string_ref_b, &[s.clone(), SchemeValue::Int(5)]),
            "Wrong argument type: 5 is not Index"
        );
        assert_eq!(
            call(string_set_b, &[s.clone(), SchemeValue::Int(0), SchemeValue::Char('j')]),
            "#<undefined>"
        );
        assert_eq!(print_value(&s), "\"jéllo\"");
        assert_eq!(
            call(string_length_b, &[SchemeValue::Int(1)]),
            "Wrong argument type: 1 is not String"
        );
    }
}
