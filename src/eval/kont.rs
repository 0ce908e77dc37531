//! Continuation frames and machine state.
//!
//! A continuation is an immutable linked chain of frames (`KontRef`). Every
//! frame that resumes evaluation carries the environment it resumes in, so a
//! captured chain is a complete description of "the rest of the computation"
//! and can be re-entered any number of times.

use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::printer::print_value;
use crate::symbol::Symbol;
use crate::value::{Promise, SchemeValue};
use std::rc::Rc;

pub type KontRef = Rc<Kont>;

pub enum Kont {
    Halt,
    AndOr {
        kind: AndOrKind,
        rest: SchemeValue, // remaining expressions, as a list
        env: EnvRef,
        next: KontRef,
    },
    Bind {
        symbol: Symbol,
        mode: BindMode,
        env: EnvRef,
        next: KontRef,
    },
    Cond {
        clauses: Rc<[CondClause]>,
        index: usize, // clause whose test is being evaluated
        env: EnvRef,
        next: KontRef,
    },
    EvalArg {
        proc: Option<SchemeValue>,
        remaining: SchemeValue, // operands not yet evaluated, as a list
        evaluated: SchemeValue, // operand values so far, newest first
        original_call: SchemeValue,
        env: EnvRef,
        next: KontRef,
    },
    Force {
        promise: Rc<Promise>,
        next: KontRef,
    },
    If {
        then_branch: SchemeValue,
        else_branch: Option<SchemeValue>,
        env: EnvRef,
        next: KontRef,
    },
    Map {
        proc: SchemeValue,
        lists: Vec<SchemeValue>, // tails still to be walked
        acc: SchemeValue,        // results so far, reversed
        for_each: bool,
        next: KontRef,
    },
    Seq {
        body: Rc<[SchemeValue]>,
        index: usize, // next expression to evaluate
        env: EnvRef,
        next: KontRef,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AndOrKind {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindMode {
    Define,
    Assign,
}

pub enum CondClause {
    /// `(test body...)`; an empty body yields the test value.
    Normal {
        test: SchemeValue,
        body: Rc<[SchemeValue]>,
    },
    /// `(test => receiver)`
    Arrow {
        test: SchemeValue,
        receiver: SchemeValue,
    },
    Else {
        body: Rc<[SchemeValue]>,
    },
}

thread_local! {
    static HALT: KontRef = Rc::new(Kont::Halt);
}

/// The shared terminal frame.
pub fn halt() -> KontRef {
    HALT.try_with(Rc::clone)
        .unwrap_or_else(|_| Rc::new(Kont::Halt))
}

impl Kont {
    pub fn next(&self) -> Option<&KontRef> {
        match self {
            Kont::Halt => None,
            Kont::AndOr { next, .. }
            | Kont::Bind { next, .. }
            | Kont::Cond { next, .. }
            | Kont::EvalArg { next, .. }
            | Kont::Force { next, .. }
            | Kont::If { next, .. }
            | Kont::Map { next, .. }
            | Kont::Seq { next, .. } => Some(next),
        }
    }

    fn take_next(&mut self) -> Option<KontRef> {
        match self {
            Kont::Halt => None,
            Kont::AndOr { next, .. }
            | Kont::Bind { next, .. }
            | Kont::Cond { next, .. }
            | Kont::EvalArg { next, .. }
            | Kont::Force { next, .. }
            | Kont::If { next, .. }
            | Kont::Map { next, .. }
            | Kont::Seq { next, .. } => Some(std::mem::replace(next, halt())),
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Kont::Halt)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kont::Halt => "Halt",
            Kont::AndOr { .. } => "AndOr",
            Kont::Bind { .. } => "Bind",
            Kont::Cond { .. } => "Cond",
            Kont::EvalArg { .. } => "EvalArg",
            Kont::Force { .. } => "Force",
            Kont::If { .. } => "If",
            Kont::Map { .. } => "Map",
            Kont::Seq { .. } => "Seq",
        }
    }

    /// Number of frames in the chain starting here, `Halt` included.
    pub fn depth(&self) -> usize {
        let mut count = 1;
        let mut current = self.next();
        while let Some(k) = current {
            count += 1;
            current = k.next();
        }
        count
    }
}

// Unlink long chains iteratively so dropping a deep continuation does not
// recurse once per frame.
impl Drop for Kont {
    fn drop(&mut self) {
        let mut next = self.take_next();
        while let Some(rc) = next {
            match Rc::try_unwrap(rc) {
                Ok(mut kont) => next = kont.take_next(),
                Err(_) => break,
            }
        }
    }
}

impl std::fmt::Debug for Kont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kont::Halt => write!(f, "Halt"),
            Kont::AndOr { kind, rest, .. } => {
                write!(f, "AndOr {{ kind: {:?}, rest: {} }}", kind, print_value(rest))
            }
            Kont::Bind { symbol, mode, .. } => {
                write!(f, "Bind {{ symbol: {}, mode: {:?} }}", symbol, mode)
            }
            Kont::Cond { clauses, index, .. } => {
                write!(f, "Cond {{ clause: {}/{} }}", index + 1, clauses.len())
            }
            Kont::EvalArg {
                proc,
                remaining,
                evaluated,
                ..
            } => write!(
                f,
                "EvalArg {{ proc: {}, remaining: {}, evaluated: {} }}",
                proc.as_ref().map(print_value).unwrap_or_else(|| "?".to_string()),
                print_value(remaining),
                print_value(evaluated)
            ),
            Kont::Force { promise, .. } => {
                write!(f, "Force {{ expr: {} }}", print_value(&promise.expr))
            }
            Kont::If {
                then_branch,
                else_branch,
                ..
            } => write!(
                f,
                "If {{ then: {}, else: {} }}",
                print_value(then_branch),
                else_branch.as_ref().map(print_value).unwrap_or_default()
            ),
            Kont::Map {
                proc,
                lists,
                for_each,
                ..
            } => write!(
                f,
                "Map {{ proc: {}, lists: {:?}, for_each: {} }}",
                print_value(proc),
                lists,
                for_each
            ),
            Kont::Seq { body, index, .. } => {
                write!(f, "Seq {{ at: {}/{} }}", index, body.len())
            }
        }
    }
}

pub enum Control {
    Expr(SchemeValue),  // Unevaluated expression
    Value(SchemeValue), // Fully evaluated result
}

pub struct CEKState {
    pub control: Control, // Current expression or value
    pub env: EnvRef,      // Environment the expression is evaluated in
    pub kont: KontRef,    // What to do with the value
}

impl CEKState {
    pub fn new(env: EnvRef) -> Self {
        CEKState {
            control: Control::Value(SchemeValue::Unspecified),
            env,
            kont: halt(),
        }
    }
}

// ============================================================================
// FRAME INSERTION
// ============================================================================
//
// Each helper links a new frame above the current continuation, capturing the
// current environment where the frame will resume evaluation.

/// Evaluate `expr` next, in the current environment.
pub fn insert_eval(state: &mut CEKState, expr: SchemeValue) {
    state.control = Control::Expr(expr);
}

/// Return a value without evaluation.
pub fn insert_value(state: &mut CEKState, value: SchemeValue) {
    state.control = Control::Value(value);
}

/// Evaluate `test`, then one of the branches.
pub fn insert_if(
    state: &mut CEKState,
    test: SchemeValue,
    then_branch: SchemeValue,
    else_branch: Option<SchemeValue>,
) {
    let prev = Rc::clone(&state.kont);
    state.kont = Rc::new(Kont::If {
        then_branch,
        else_branch,
        env: state.env.clone(),
        next: prev,
    });
    state.control = Control::Expr(test);
}

/// Evaluate a body in sequence; the last expression is in tail position.
pub fn insert_body(state: &mut CEKState, body: Rc<[SchemeValue]>) -> Result<(), SchemeError> {
    let first = body.first().cloned().ok_or(SchemeError::SyntaxError)?;
    if body.len() > 1 {
        let prev = Rc::clone(&state.kont);
        state.kont = Rc::new(Kont::Seq {
            body,
            index: 1,
            env: state.env.clone(),
            next: prev,
        });
    }
    state.control = Control::Expr(first);
    Ok(())
}

/// Bind a symbol to the value of `expr` once it has been evaluated.
pub fn insert_bind(state: &mut CEKState, symbol: Symbol, mode: BindMode, expr: SchemeValue) {
    let prev = Rc::clone(&state.kont);
    state.kont = Rc::new(Kont::Bind {
        symbol,
        mode,
        env: state.env.clone(),
        next: prev,
    });
    state.control = Control::Expr(expr);
}

/// Start on clause `index` of a `cond`.
pub fn insert_cond(
    state: &mut CEKState,
    clauses: Rc<[CondClause]>,
    index: usize,
) -> Result<(), SchemeError> {
    let test = match clauses.get(index) {
        None => {
            state.control = Control::Value(SchemeValue::Unspecified);
            return Ok(());
        }
        Some(CondClause::Else { body }) => return insert_body(state, body.clone()),
        Some(CondClause::Normal { test, .. }) | Some(CondClause::Arrow { test, .. }) => {
            test.clone()
        }
    };
    let prev = Rc::clone(&state.kont);
    state.kont = Rc::new(Kont::Cond {
        clauses,
        index,
        env: state.env.clone(),
        next: prev,
    });
    state.control = Control::Expr(test);
    Ok(())
}

/// Evaluate an `and`/`or` operand list; the last operand is in tail position.
pub fn insert_and_or(state: &mut CEKState, kind: AndOrKind, exprs: SchemeValue) {
    match &exprs {
        SchemeValue::Pair(p) => {
            let rest = p.cdr();
            if !rest.is_nil() {
                let prev = Rc::clone(&state.kont);
                state.kont = Rc::new(Kont::AndOr {
                    kind,
                    rest,
                    env: state.env.clone(),
                    next: prev,
                });
            }
            state.control = Control::Expr(p.car());
        }
        _ => state.control = Control::Value(SchemeValue::Bool(kind == AndOrKind::And)),
    }
}

/// Force a promise: evaluate its expression in its own environment and
/// remember the result.
pub fn insert_force(state: &mut CEKState, promise: Rc<Promise>) {
    let cached = promise.result.borrow().clone();
    match cached {
        Some(value) => state.control = Control::Value(value),
        None => {
            let prev = Rc::clone(&state.kont);
            state.env = promise.env.clone();
            state.control = Control::Expr(promise.expr.clone());
            state.kont = Rc::new(Kont::Force {
                promise,
                next: prev,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::new_global_env;

    #[test]
    fn test_deep_chain_drop() {
        let env = new_global_env();
        let mut kont = halt();
        for i in 0..1_000_000 {
            kont = Rc::new(Kont::Seq {
                body: Rc::from(vec![SchemeValue::Int(i)]),
                index: 0,
                env: env.clone(),
                next: kont,
            });
        }
        assert_eq!(kont.depth(), 1_000_001);
        drop(kont);
    }

    #[test]
    fn test_shared_tail_survives_drop() {
        let env = new_global_env();
        let shared = Rc::new(Kont::Bind {
            symbol: crate::symbol::intern_symbol("x"),
            mode: BindMode::Define,
            env: env.clone(),
            next: halt(),
        });
        let branch = Rc::new(Kont::Seq {
            body: Rc::from(vec![SchemeValue::Nil]),
            index: 0,
            env,
            next: shared.clone(),
        });
        drop(branch);
        assert_eq!(shared.name(), "Bind");
        assert!(shared.next().map(|k| k.is_halt()).unwrap_or(false));
    }

    #[test]
    fn test_insert_body_rejects_empty() {
        let mut state = CEKState::new(new_global_env());
        let empty: Rc<[SchemeValue]> = Rc::from(Vec::new());
        assert!(matches!(
            insert_body(&mut state, empty),
            Err(SchemeError::SyntaxError)
        ));
    }

    #[test]
    fn test_insert_and_or_empty() {
        let mut state = CEKState::new(new_global_env());
        insert_and_or(&mut state, AndOrKind::And, SchemeValue::Nil);
        assert!(matches!(state.control, Control::Value(SchemeValue::Bool(true))));
        insert_and_or(&mut state, AndOrKind::Or, SchemeValue::Nil);
        assert!(matches!(state.control, Control::Value(SchemeValue::Bool(false))));
        assert!(state.kont.is_halt());
    }
}
