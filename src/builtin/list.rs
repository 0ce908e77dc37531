/// Pair and list primitives.
use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::{RunTime, expect_n_args};
use crate::value::{
    Pair, SchemeValue, car, cdr, cons, eq, equal, eqv, expect_list, list_from_slice,
    list_with_tail,
};
use std::rc::Rc;

/// (cons a b)
pub fn cons_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    Ok(cons(args[0].clone(), args[1].clone()))
}

/// (list a ...)
pub fn list_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    Ok(list_from_slice(args))
}

pub fn car_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    car(&args[0])
}

pub fn cdr_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    cdr(&args[0])
}

/// Walk a `c[ad]+r` path from the innermost accessor outwards.
fn walk_cxr(path: &str, value: &SchemeValue) -> Result<SchemeValue, SchemeError> {
    let mut current = value.clone();
    for step in path.chars().rev() {
        current = match step {
            'a' => car(&current)?,
            _ => cdr(&current)?,
        };
    }
    Ok(current)
}

macro_rules! cxr_family {
    ($($func:ident => $path:literal),* $(,)?) => {
        $(
            fn $func(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
                expect_n_args(args, 1)?;
                walk_cxr($path, &args[0])
            }
        )*

        fn register_cxr_builtins(env: &EnvRef) {
            register_builtin_family!(env, $(concat!("c", $path, "r") => $func),*);
        }
    };
}

cxr_family!(
    caar_b => "aa", cadr_b => "ad", cdar_b => "da", cddr_b => "dd",
    caaar_b => "aaa", caadr_b => "aad", cadar_b => "ada", caddr_b => "add",
    cdaar_b => "daa", cdadr_b => "dad", cddar_b => "dda", cdddr_b => "ddd",
    caaaar_b => "aaaa", caaadr_b => "aaad", caadar_b => "aada", caaddr_b => "aadd",
    cadaar_b => "adaa", cadadr_b => "adad", caddar_b => "adda", cadddr_b => "addd",
    cdaaar_b => "daaa", cdaadr_b => "daad", cdadar_b => "dada", cdaddr_b => "dadd",
    cddaar_b => "ddaa", cddadr_b => "ddad", cdddar_b => "ddda", cddddr_b => "dddd",
);

/// (set-car! pair value)
pub fn set_car_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    match &args[0] {
        SchemeValue::Pair(p) => {
            p.set_car(args[1].clone());
            Ok(SchemeValue::Unspecified)
        }
        other => Err(SchemeError::wrong_type(other, "Pair")),
    }
}

/// (set-cdr! pair value)
pub fn set_cdr_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    match &args[0] {
        SchemeValue::Pair(p) => {
            p.set_cdr(args[1].clone());
            Ok(SchemeValue::Unspecified)
        }
        other => Err(SchemeError::wrong_type(other, "Pair")),
    }
}

/// (append list ... tail)
/// Copies every argument but the last, which becomes the shared tail.
pub fn append_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    let Some((tail, leading)) = args.split_last() else {
        return Ok(SchemeValue::Nil);
    };
    let mut items = Vec::new();
    for list in leading {
        items.extend(expect_list(list)?);
    }
    Ok(list_with_tail(&items, tail.clone()))
}

fn last_pair(list: &SchemeValue) -> Option<Rc<Pair>> {
    let mut current = match list {
        SchemeValue::Pair(p) => p.clone(),
        _ => return None,
    };
    loop {
        match current.cdr() {
            SchemeValue::Pair(next) => current = next,
            _ => return Some(current),
        }
    }
}

/// (append! list ... tail)
/// Links the arguments together in place; empty lists are skipped.
pub fn append_bang_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    let Some((tail, leading)) = args.split_last() else {
        return Ok(SchemeValue::Nil);
    };
    for list in leading {
        expect_list(list)?;
    }
    let mut result = tail.clone();
    for list in leading.iter().rev() {
        if let Some(last) = last_pair(list) {
            last.set_cdr(result);
            result = list.clone();
        }
    }
    Ok(result)
}

/// (reverse list)
pub fn reverse_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    let items = expect_list(&args[0])?;
    Ok(items
        .into_iter()
        .fold(SchemeValue::Nil, |acc, item| cons(item, acc)))
}

/// (length list)
pub fn length_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 1)?;
    let len = expect_list(&args[0])?.len();
    Ok(SchemeValue::Int(len as i64))
}

fn assoc_with(
    args: &[SchemeValue],
    same: fn(&SchemeValue, &SchemeValue) -> bool,
) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    let alist = &args[1];
    let entries = expect_list(alist).map_err(|_| SchemeError::wrong_type(alist, "AList"))?;
    for entry in entries {
        let key = car(&entry).map_err(|_| SchemeError::wrong_type(alist, "AList"))?;
        if same(&args[0], &key) {
            return Ok(entry);
        }
    }
    Ok(SchemeValue::Bool(false))
}

fn member_with(
    args: &[SchemeValue],
    same: fn(&SchemeValue, &SchemeValue) -> bool,
) -> Result<SchemeValue, SchemeError> {
    expect_n_args(args, 2)?;
    let mut current = args[1].clone();
    loop {
        let next = match &current {
            SchemeValue::Nil => return Ok(SchemeValue::Bool(false)),
            SchemeValue::Pair(p) => {
                if same(&args[0], &p.car()) {
                    return Ok(current.clone());
                }
                p.cdr()
            }
            _ => return Err(SchemeError::wrong_type(&args[1], "List")),
        };
        current = next;
    }
}

pub fn assq_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    assoc_with(args, eq)
}

pub fn assv_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    assoc_with(args, eqv)
}

pub fn assoc_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    assoc_with(args, equal)
}

pub fn memq_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    member_with(args, eq)
}

pub fn memv_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    member_with(args, eqv)
}

pub fn member_b(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
    member_with(args, equal)
}

pub fn register_list_builtins(env: &EnvRef) {
    register_builtin_family!(env,
        "cons" => cons_b,
        "list" => list_b,
        "car" => car_b,
        "cdr" => cdr_b,
        "set-car!" => set_car_b,
        "set-cdr!" => set_cdr_b,
        "append" => append_b,
        "append!" => append_bang_b,
        "reverse" => reverse_b,
        "length" => length_b,
        "assq" => assq_b,
        "assv" => assv_b,
        "assoc" => assoc_b,
        "memq" => memq_b,
        "memv" => memv_b,
        "member" => member_b,
    );
    register_cxr_builtins(env);
}
