//! Scheme data.
//!
//! Every datum is a `SchemeValue`. Atoms are stored inline; strings, pairs,
//! vectors, procedures and promises live behind an `Rc` so that copies of a
//! value share the same object and mutations are visible to every holder.

use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::{CEKState, KontRef, RunTime};
use crate::symbol::{Symbol, intern_symbol};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Direct primitive: evaluated arguments in, value out.
pub type BuiltinFn = fn(&mut RunTime, &[SchemeValue]) -> Result<SchemeValue, SchemeError>;

/// Tail-aware primitive: receives the machine and the continuation its
/// result is owed to, and must leave the machine ready for the next step.
pub type SysBuiltinFn =
    fn(&mut RunTime, &[SchemeValue], &mut CEKState, KontRef) -> Result<(), SchemeError>;

/// Special form handler: receives the whole unevaluated form.
pub type SpecialFormFn = fn(&SchemeValue, &mut RunTime, &mut CEKState) -> Result<(), SchemeError>;

#[derive(Clone)]
pub enum SchemeValue {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(Rc<RefCell<String>>),
    Symbol(Symbol),
    Pair(Rc<Pair>),
    Vector(Rc<RefCell<Vec<SchemeValue>>>),
    Callable(Rc<Callable>),
    Promise(Rc<Promise>),
    Unspecified,
}

pub struct Pair {
    car: RefCell<SchemeValue>,
    cdr: RefCell<SchemeValue>,
}

impl Pair {
    pub fn car(&self) -> SchemeValue {
        self.car.borrow().clone()
    }

    pub fn cdr(&self) -> SchemeValue {
        self.cdr.borrow().clone()
    }

    pub fn set_car(&self, value: SchemeValue) {
        *self.car.borrow_mut() = value;
    }

    pub fn set_cdr(&self, value: SchemeValue) {
        *self.cdr.borrow_mut() = value;
    }
}

// Release nested structure through a worklist, so neither long cdr chains
// nor deep car nesting recurse on the host stack.
impl Drop for Pair {
    fn drop(&mut self) {
        let car = std::mem::replace(self.car.get_mut(), SchemeValue::Nil);
        let cdr = std::mem::replace(self.cdr.get_mut(), SchemeValue::Nil);
        if !car.is_compound() && !cdr.is_compound() {
            return;
        }
        let mut pending = vec![car, cdr];
        while let Some(value) = pending.pop() {
            match value {
                SchemeValue::Pair(rc) => {
                    if let Ok(mut pair) = Rc::try_unwrap(rc) {
                        pending.push(std::mem::replace(pair.car.get_mut(), SchemeValue::Nil));
                        pending.push(std::mem::replace(pair.cdr.get_mut(), SchemeValue::Nil));
                    }
                }
                SchemeValue::Vector(rc) => {
                    if let Ok(items) = Rc::try_unwrap(rc) {
                        pending.extend(items.into_inner());
                    }
                }
                _ => {}
            }
        }
    }
}

/// Formal parameters of a closure: fixed names plus an optional rest name.
#[derive(Clone, Debug, Default)]
pub struct Params {
    pub required: Vec<Symbol>,
    pub rest: Option<Symbol>,
}

impl Params {
    pub fn arity(&self) -> String {
        match self.rest {
            Some(_) => format!(">={}", self.required.len()),
            None => self.required.len().to_string(),
        }
    }
}

pub enum Callable {
    Builtin {
        name: &'static str,
        func: BuiltinFn,
    },
    SysBuiltin {
        name: &'static str,
        func: SysBuiltinFn,
    },
    SpecialForm {
        name: &'static str,
        func: SpecialFormFn,
    },
    Closure {
        name: Option<Symbol>,
        params: Params,
        body: Rc<[SchemeValue]>,
        env: EnvRef,
    },
    Continuation {
        kont: KontRef,
    },
}

/// A delayed expression, evaluated at most once.
pub struct Promise {
    pub expr: SchemeValue,
    pub env: EnvRef,
    pub result: RefCell<Option<SchemeValue>>,
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

pub fn new_pair(car: SchemeValue, cdr: SchemeValue) -> SchemeValue {
    SchemeValue::Pair(Rc::new(Pair {
        car: RefCell::new(car),
        cdr: RefCell::new(cdr),
    }))
}

pub fn new_string(s: &str) -> SchemeValue {
    SchemeValue::Str(Rc::new(RefCell::new(s.to_string())))
}

pub fn new_vector(items: Vec<SchemeValue>) -> SchemeValue {
    SchemeValue::Vector(Rc::new(RefCell::new(items)))
}

pub fn new_symbol(name: &str) -> SchemeValue {
    SchemeValue::Symbol(intern_symbol(name))
}

pub fn new_builtin(name: &'static str, func: BuiltinFn) -> SchemeValue {
    SchemeValue::Callable(Rc::new(Callable::Builtin { name, func }))
}

pub fn new_sys_builtin(name: &'static str, func: SysBuiltinFn) -> SchemeValue {
    SchemeValue::Callable(Rc::new(Callable::SysBuiltin { name, func }))
}

pub fn new_special_form(name: &'static str, func: SpecialFormFn) -> SchemeValue {
    SchemeValue::Callable(Rc::new(Callable::SpecialForm { name, func }))
}

pub fn new_closure(
    name: Option<Symbol>,
    params: Params,
    body: Rc<[SchemeValue]>,
    env: EnvRef,
) -> SchemeValue {
    SchemeValue::Callable(Rc::new(Callable::Closure {
        name,
        params,
        body,
        env,
    }))
}

pub fn new_continuation(kont: KontRef) -> SchemeValue {
    SchemeValue::Callable(Rc::new(Callable::Continuation { kont }))
}

pub fn new_promise(expr: SchemeValue, env: EnvRef) -> SchemeValue {
    SchemeValue::Promise(Rc::new(Promise {
        expr,
        env,
        result: RefCell::new(None),
    }))
}

/// Character from a literal body: a single character or a known name.
pub fn new_char(text: &str) -> Result<SchemeValue, SchemeError> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(SchemeValue::Char(c)),
        _ => match text.to_lowercase().as_str() {
            "space" => Ok(SchemeValue::Char(' ')),
            "newline" => Ok(SchemeValue::Char('\n')),
            _ => Err(SchemeError::SyntaxError),
        },
    }
}

// ============================================================================
// LIST HELPERS
// ============================================================================

pub fn cons(car: SchemeValue, cdr: SchemeValue) -> SchemeValue {
    new_pair(car, cdr)
}

pub fn car(value: &SchemeValue) -> Result<SchemeValue, SchemeError> {
    match value {
        SchemeValue::Pair(p) => Ok(p.car()),
        _ => Err(SchemeError::wrong_type(value, "Pair")),
    }
}

pub fn cdr(value: &SchemeValue) -> Result<SchemeValue, SchemeError> {
    match value {
        SchemeValue::Pair(p) => Ok(p.cdr()),
        _ => Err(SchemeError::wrong_type(value, "Pair")),
    }
}

pub fn list_from_slice(items: &[SchemeValue]) -> SchemeValue {
    list_with_tail(items, SchemeValue::Nil)
}

pub fn list_with_tail(items: &[SchemeValue], tail: SchemeValue) -> SchemeValue {
    items
        .iter()
        .rev()
        .fold(tail, |acc, item| new_pair(item.clone(), acc))
}

/// Collect a proper list. An improper tail is a syntax error.
pub fn list_to_vec(list: &SchemeValue) -> Result<Vec<SchemeValue>, SchemeError> {
    let mut result = Vec::new();
    let mut current = list.clone();
    loop {
        match current {
            SchemeValue::Nil => return Ok(result),
            SchemeValue::Pair(p) => {
                result.push(p.car());
                current = p.cdr();
            }
            _ => return Err(SchemeError::SyntaxError),
        }
    }
}

/// Like `list_to_vec`, but reports a non-list as a type error on `list`.
pub fn expect_list(list: &SchemeValue) -> Result<Vec<SchemeValue>, SchemeError> {
    list_to_vec(list).map_err(|_| SchemeError::wrong_type(list, "List"))
}

pub fn is_proper_list(list: &SchemeValue) -> bool {
    let mut current = list.clone();
    loop {
        match current {
            SchemeValue::Nil => return true,
            SchemeValue::Pair(p) => current = p.cdr(),
            _ => return false,
        }
    }
}

pub fn list_iter(list: &SchemeValue) -> ListIter {
    ListIter {
        current: list.clone(),
    }
}

/// Iterates the cars of a list, stopping at the first non-pair.
pub struct ListIter {
    current: SchemeValue,
}

impl Iterator for ListIter {
    type Item = SchemeValue;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.current, SchemeValue::Nil) {
            SchemeValue::Pair(p) => {
                self.current = p.cdr();
                Some(p.car())
            }
            _ => None,
        }
    }
}

// ============================================================================
// PREDICATES AND EQUIVALENCE
// ============================================================================

impl SchemeValue {
    pub fn is_true(&self) -> bool {
        !matches!(self, SchemeValue::Bool(false))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, SchemeValue::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, SchemeValue::Nil)
    }

    /// Pairs and vectors: values that can hold other values.
    pub fn is_compound(&self) -> bool {
        matches!(self, SchemeValue::Pair(_) | SchemeValue::Vector(_))
    }

    pub fn is_procedure(&self) -> bool {
        match self {
            SchemeValue::Callable(c) => !matches!(**c, Callable::SpecialForm { .. }),
            _ => false,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            SchemeValue::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(self, SchemeValue::Symbol(s) if s.is(name))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SchemeValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Identity. Immediate atoms compare by value; everything heap-allocated
/// compares by pointer.
pub fn eq(a: &SchemeValue, b: &SchemeValue) -> bool {
    use SchemeValue::*;
    match (a, b) {
        (Nil, Nil) | (Unspecified, Unspecified) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x.to_bits() == y.to_bits(),
        (Char(x), Char(y)) => x == y,
        (Symbol(x), Symbol(y)) => x == y,
        (Str(x), Str(y)) => Rc::ptr_eq(x, y),
        (Pair(x), Pair(y)) => Rc::ptr_eq(x, y),
        (Vector(x), Vector(y)) => Rc::ptr_eq(x, y),
        (Callable(x), Callable(y)) => Rc::ptr_eq(x, y),
        (Promise(x), Promise(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// `eq` plus numeric equality of equal exactness.
pub fn eqv(a: &SchemeValue, b: &SchemeValue) -> bool {
    match (a, b) {
        (SchemeValue::Float(x), SchemeValue::Float(y)) => x == y,
        _ => eq(a, b),
    }
}

/// Structural equality over pairs, vectors and strings.
pub fn equal(a: &SchemeValue, b: &SchemeValue) -> bool {
    let mut pending = vec![(a.clone(), b.clone())];
    while let Some((a, b)) = pending.pop() {
        match (&a, &b) {
            (SchemeValue::Pair(x), SchemeValue::Pair(y)) => {
                if !Rc::ptr_eq(x, y) {
                    pending.push((x.cdr(), y.cdr()));
                    pending.push((x.car(), y.car()));
                }
            }
            (SchemeValue::Str(x), SchemeValue::Str(y)) => {
                if *x.borrow() != *y.borrow() {
                    return false;
                }
            }
            (SchemeValue::Vector(x), SchemeValue::Vector(y)) => {
                if Rc::ptr_eq(x, y) {
                    continue;
                }
                let (x, y) = (x.borrow(), y.borrow());
                if x.len() != y.len() {
                    return false;
                }
                pending.extend(x.iter().cloned().zip(y.iter().cloned()).rev());
            }
            _ => {
                if !eqv(&a, &b) {
                    return false;
                }
            }
        }
    }
    true
}

impl fmt::Debug for SchemeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::printer::print_value(self))
    }
}

impl fmt::Display for SchemeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::printer::display_value(self))
    }
}
