/// Continuation-Passing Style (CPS) evaluator.
///
/// The machine state is (Control, Environment, Kontinuation). `step` performs
/// one transition; no transition recurses on the host stack, and a procedure
/// call in tail position replaces the control without pushing a frame, so
/// loops written as tail calls run in constant space.
use super::kont::{
    AndOrKind, BindMode, CEKState, CondClause, Control, Kont, KontRef, halt, insert_and_or,
    insert_body, insert_cond, insert_force,
};
use super::{RunTime, bind_params};
use crate::env::{EnvOps, EnvRef};
use crate::error::SchemeError;
use crate::symbol::Symbol;
use crate::utilities::debugger;
use crate::value::{Callable, Promise, SchemeValue, cons, is_proper_list, list_iter};
use std::rc::Rc;

/// CEK evaluator entry point for one top-level form (not used recursively).
///
pub fn eval_main(
    expr: SchemeValue,
    state: &mut CEKState,
    rt: &mut RunTime,
) -> Result<SchemeValue, SchemeError> {
    let top_env = state.env.clone();
    state.control = Control::Expr(expr);
    state.kont = halt();
    let result = run_cek(state, rt);
    // Leave the machine in the top-level scope whether or not the form failed.
    state.env = top_env;
    state.kont = halt();
    result
}

/// Run the CEK evaluator loop until a value reaches the halt frame.
///
fn run_cek(state: &mut CEKState, rt: &mut RunTime) -> Result<SchemeValue, SchemeError> {
    loop {
        step(state, rt)?;
        if let Control::Value(val) = &state.control {
            if state.kont.is_halt() {
                return Ok(val.clone());
            }
        }
    }
}

/// Perform one step of the CEK evaluation.
///
fn step(state: &mut CEKState, rt: &mut RunTime) -> Result<(), SchemeError> {
    debugger(state, rt);
    rt.steps += 1;

    let control = std::mem::replace(&mut state.control, Control::Value(SchemeValue::Unspecified));
    match control {
        Control::Expr(expr) => eval_cek(expr, rt, state),
        Control::Value(val) => {
            let kont = Rc::clone(&state.kont);
            dispatch_kont(state, rt, val, &kont)
        }
    }
}

/// Start evaluating `expr` in the current environment.
///
pub fn eval_cek(
    expr: SchemeValue,
    rt: &mut RunTime,
    state: &mut CEKState,
) -> Result<(), SchemeError> {
    match &expr {
        // Symbols are looked up in the environment
        SchemeValue::Symbol(sym) => {
            state.control = Control::Value(state.env.lookup(sym)?);
            Ok(())
        }
        // Pair: special form or application
        SchemeValue::Pair(pair) => {
            let head = pair.car();
            if let Some(func) = special_form_for(&head, &state.env) {
                return func(&expr, rt, state);
            }
            let operands = pair.cdr();
            if !is_proper_list(&operands) {
                return Err(SchemeError::SyntaxError);
            }
            let prev = Rc::clone(&state.kont);
            state.kont = Rc::new(Kont::EvalArg {
                proc: None,
                remaining: operands,
                evaluated: SchemeValue::Nil,
                original_call: expr.clone(),
                env: state.env.clone(),
                next: prev,
            });
            state.control = Control::Expr(head);
            Ok(())
        }
        // The empty list and vectors are not expressions
        SchemeValue::Nil | SchemeValue::Vector(_) => Err(SchemeError::SyntaxError),
        // Everything else evaluates to itself
        _ => {
            state.control = Control::Value(expr);
            Ok(())
        }
    }
}

/// The handler for `head` if it names a special form in `env`, or is one.
/// Forms rewritten by other special forms embed the handler directly so the
/// rewrite is immune to user rebinding.
fn special_form_for(head: &SchemeValue, env: &EnvRef) -> Option<crate::value::SpecialFormFn> {
    let value = match head {
        SchemeValue::Symbol(sym) => env.lookup_cell(sym)?.borrow().clone(),
        SchemeValue::Callable(_) => head.clone(),
        _ => return None,
    };
    match &value {
        SchemeValue::Callable(c) => match &**c {
            Callable::SpecialForm { func, .. } => Some(*func),
            _ => None,
        },
        _ => None,
    }
}

#[inline]
fn dispatch_kont(
    state: &mut CEKState,
    rt: &mut RunTime,
    val: SchemeValue,
    kont: &Kont,
) -> Result<(), SchemeError> {
    match kont {
        Kont::Halt => {
            state.control = Control::Value(val);
            Ok(())
        }
        Kont::AndOr {
            kind,
            rest,
            env,
            next,
        } => handle_and_or(state, val, *kind, rest, env, next),
        Kont::Bind {
            symbol,
            mode,
            env,
            next,
        } => handle_bind(state, val, symbol, *mode, env, next),
        Kont::Cond {
            clauses,
            index,
            env,
            next,
        } => handle_cond(state, val, clauses, *index, env, next),
        Kont::EvalArg {
            proc,
            remaining,
            evaluated,
            original_call,
            env,
            next,
        } => handle_eval_arg(
            state,
            rt,
            val,
            proc.as_ref(),
            remaining,
            evaluated,
            original_call,
            env,
            next,
        ),
        Kont::Force { promise, next } => handle_force(state, val, promise, next),
        Kont::If {
            then_branch,
            else_branch,
            env,
            next,
        } => handle_if(state, val, then_branch, else_branch.as_ref(), env, next),
        Kont::Map {
            proc,
            lists,
            acc,
            for_each,
            next,
        } => {
            let acc = if *for_each { acc.clone() } else { cons(val, acc.clone()) };
            map_step(state, rt, proc.clone(), lists.clone(), acc, *for_each, next.clone())
        }
        Kont::Seq {
            body,
            index,
            env,
            next,
        } => handle_seq(state, body, *index, env, next),
    }
}

fn resume(state: &mut CEKState, env: &EnvRef, next: &KontRef) {
    state.env = env.clone();
    state.kont = next.clone();
}

fn handle_and_or(
    state: &mut CEKState,
    val: SchemeValue,
    kind: AndOrKind,
    rest: &SchemeValue,
    env: &EnvRef,
    next: &KontRef,
) -> Result<(), SchemeError> {
    let short_circuit = match kind {
        AndOrKind::And => val.is_false(), // false ⇒ stop early
        AndOrKind::Or => val.is_true(),   // truthy ⇒ stop early
    };
    resume(state, env, next);
    if short_circuit {
        state.control = Control::Value(val);
    } else {
        insert_and_or(state, kind, rest.clone());
    }
    Ok(())
}

fn handle_bind(
    state: &mut CEKState,
    val: SchemeValue,
    symbol: &Symbol,
    mode: BindMode,
    env: &EnvRef,
    next: &KontRef,
) -> Result<(), SchemeError> {
    resume(state, env, next);
    match mode {
        BindMode::Define => {
            env.define(symbol.clone(), val);
            state.control = Control::Value(SchemeValue::Symbol(symbol.clone()));
        }
        BindMode::Assign => {
            env.assign(symbol, val)?;
            state.control = Control::Value(SchemeValue::Unspecified);
        }
    }
    Ok(())
}

fn handle_cond(
    state: &mut CEKState,
    val: SchemeValue,
    clauses: &Rc<[CondClause]>,
    index: usize,
    env: &EnvRef,
    next: &KontRef,
) -> Result<(), SchemeError> {
    resume(state, env, next);
    if val.is_false() {
        return insert_cond(state, clauses.clone(), index + 1);
    }
    match &clauses[index] {
        CondClause::Normal { body, .. } if body.is_empty() => {
            state.control = Control::Value(val);
            Ok(())
        }
        CondClause::Normal { body, .. } | CondClause::Else { body } => {
            insert_body(state, body.clone())
        }
        CondClause::Arrow { receiver, .. } => {
            // Evaluate the receiver, then call it with the test value.
            let prev = Rc::clone(&state.kont);
            state.kont = Rc::new(Kont::EvalArg {
                proc: None,
                remaining: SchemeValue::Nil,
                evaluated: cons(val, SchemeValue::Nil),
                original_call: receiver.clone(),
                env: env.clone(),
                next: prev,
            });
            state.control = Control::Expr(receiver.clone());
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_eval_arg(
    state: &mut CEKState,
    rt: &mut RunTime,
    val: SchemeValue,
    proc: Option<&SchemeValue>,
    remaining: &SchemeValue,
    evaluated: &SchemeValue,
    original_call: &SchemeValue,
    env: &EnvRef,
    next: &KontRef,
) -> Result<(), SchemeError> {
    let (proc, evaluated) = match proc {
        // `val` is the operator
        None => (val, evaluated.clone()),
        // `val` is the next operand; frames share the older values
        Some(p) => (p.clone(), cons(val, evaluated.clone())),
    };
    match remaining {
        SchemeValue::Pair(p) => {
            state.env = env.clone();
            state.control = Control::Expr(p.car());
            state.kont = Rc::new(Kont::EvalArg {
                proc: Some(proc),
                remaining: p.cdr(),
                evaluated,
                original_call: original_call.clone(),
                env: env.clone(),
                next: next.clone(),
            });
            Ok(())
        }
        _ => {
            state.env = env.clone();
            let mut args: Vec<SchemeValue> = list_iter(&evaluated).collect();
            args.reverse();
            apply_proc(state, rt, proc, args, next.clone())
        }
    }
}

fn handle_force(
    state: &mut CEKState,
    val: SchemeValue,
    promise: &Rc<Promise>,
    next: &KontRef,
) -> Result<(), SchemeError> {
    // A re-entered force keeps the first result.
    let result = promise.result.borrow().clone();
    let result = match result {
        Some(first) => first,
        None => {
            *promise.result.borrow_mut() = Some(val.clone());
            val
        }
    };
    state.kont = next.clone();
    state.control = Control::Value(result);
    Ok(())
}

fn handle_if(
    state: &mut CEKState,
    val: SchemeValue,
    then_branch: &SchemeValue,
    else_branch: Option<&SchemeValue>,
    env: &EnvRef,
    next: &KontRef,
) -> Result<(), SchemeError> {
    resume(state, env, next);
    state.control = if val.is_true() {
        Control::Expr(then_branch.clone())
    } else {
        match else_branch {
            Some(expr) => Control::Expr(expr.clone()),
            None => Control::Value(SchemeValue::Unspecified),
        }
    };
    Ok(())
}

fn handle_seq(
    state: &mut CEKState,
    body: &Rc<[SchemeValue]>,
    index: usize,
    env: &EnvRef,
    next: &KontRef,
) -> Result<(), SchemeError> {
    resume(state, env, next);
    if index + 1 < body.len() {
        state.kont = Rc::new(Kont::Seq {
            body: body.clone(),
            index: index + 1,
            env: env.clone(),
            next: next.clone(),
        });
    }
    state.control = Control::Expr(body[index].clone());
    Ok(())
}

/// Apply `proc` to evaluated `args`, delivering the result to `next`.
///
/// Closures do not push a frame: the body simply continues with `next`,
/// which is what makes calls in tail position iterative.
pub fn apply_proc(
    state: &mut CEKState,
    rt: &mut RunTime,
    proc: SchemeValue,
    args: Vec<SchemeValue>,
    next: KontRef,
) -> Result<(), SchemeError> {
    let callable = match &proc {
        SchemeValue::Callable(c) => c.clone(),
        _ => return Err(SchemeError::NotCallable(proc)),
    };
    match &*callable {
        Callable::Builtin { func, .. } => {
            let result = func(rt, &args)?;
            state.kont = next;
            state.control = Control::Value(result);
            Ok(())
        }
        Callable::SysBuiltin { func, .. } => func(rt, &args, state, next),
        Callable::Closure {
            params, body, env, ..
        } => {
            let new_env = bind_params(params, &args, env)?;
            state.env = new_env;
            state.kont = next;
            insert_body(state, body.clone())
        }
        Callable::Continuation { kont } => {
            let value = match args.len() {
                0 => SchemeValue::Unspecified,
                1 => args[0].clone(),
                n => return Err(SchemeError::wrong_args(n, "0-1")),
            };
            if kont.is_halt() {
                return Err(SchemeError::FinishedEarly(value));
            }
            state.kont = kont.clone();
            state.control = Control::Value(value);
            Ok(())
        }
        Callable::SpecialForm { .. } => Err(SchemeError::NotCallable(proc)),
    }
}

/// One round of `map`/`for-each`: call `proc` on the heads of `lists`, or
/// finish when any list is exhausted.
pub fn map_step(
    state: &mut CEKState,
    rt: &mut RunTime,
    proc: SchemeValue,
    lists: Vec<SchemeValue>,
    acc: SchemeValue,
    for_each: bool,
    next: KontRef,
) -> Result<(), SchemeError> {
    let mut heads = Vec::with_capacity(lists.len());
    let mut tails = Vec::with_capacity(lists.len());
    for list in &lists {
        match list {
            SchemeValue::Pair(p) => {
                heads.push(p.car());
                tails.push(p.cdr());
            }
            _ => {
                state.kont = next;
                state.control = Control::Value(if for_each {
                    SchemeValue::Unspecified
                } else {
                    reverse_list(acc)
                });
                return Ok(());
            }
        }
    }
    let frame = Rc::new(Kont::Map {
        proc: proc.clone(),
        lists: tails,
        acc,
        for_each,
        next,
    });
    apply_proc(state, rt, proc, heads, frame)
}

fn reverse_list(list: SchemeValue) -> SchemeValue {
    list_iter(&list).fold(SchemeValue::Nil, |acc, item| cons(item, acc))
}

/// Start forcing `promise`, delivering the result to `next`.
pub fn force_promise(state: &mut CEKState, promise: Rc<Promise>, next: KontRef) {
    state.kont = next;
    insert_force(state, promise);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::new_global_env;
    use crate::parser::parse;
    use crate::printer::print_value;
    use crate::symbol::intern_symbol;
    use crate::value::{list_from_slice, new_builtin, new_symbol};

    fn plus(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
        let mut total = 0;
        for arg in args {
            total += arg
                .as_int()
                .ok_or_else(|| SchemeError::wrong_type(arg, "Number"))?;
        }
        Ok(SchemeValue::Int(total))
    }

    fn eval_text(code: &str, state: &mut CEKState, rt: &mut RunTime) -> Result<SchemeValue, SchemeError> {
        let mut result = SchemeValue::Unspecified;
        for expr in parse(code)? {
            result = eval_main(expr, state, rt)?;
        }
        Ok(result)
    }

    #[test]
    fn test_eval_logic_self_evaluating() {
        let mut rt = RunTime::new();
        let mut state = CEKState::new(new_global_env());
        let result = eval_main(SchemeValue::Int(42), &mut state, &mut rt).unwrap();
        assert!(matches!(result, SchemeValue::Int(42)));
    }

    #[test]
    fn test_eval_logic_variable_lookup() {
        let mut rt = RunTime::new();
        let mut state = CEKState::new(new_global_env());
        state.env.define(intern_symbol("x"), SchemeValue::Int(99));
        let result = eval_main(new_symbol("x"), &mut state, &mut rt).unwrap();
        assert!(matches!(result, SchemeValue::Int(99)));
        let err = eval_main(new_symbol("y"), &mut state, &mut rt).unwrap_err();
        assert_eq!(err.to_string(), "Unbound variable y");
    }

    #[test]
    fn test_eval_logic_nested_call() {
        let mut rt = RunTime::new();
        let mut state = CEKState::new(new_global_env());
        state.env.define(intern_symbol("+"), new_builtin("+", plus));
        let result = eval_text("(+ 2 3 (+ 4 5))", &mut state, &mut rt).unwrap();
        assert_eq!(print_value(&result), "14");
        assert!(state.kont.is_halt());
    }

    #[test]
    fn test_eval_logic_errors() {
        let mut rt = RunTime::new();
        let mut state = CEKState::new(new_global_env());
        assert!(matches!(
            eval_text("()", &mut state, &mut rt),
            Err(SchemeError::SyntaxError)
        ));
        assert!(matches!(
            eval_text("#(1 2)", &mut state, &mut rt),
            Err(SchemeError::SyntaxError)
        ));
        let err = eval_text("(1 2)", &mut state, &mut rt).unwrap_err();
        assert_eq!(err.to_string(), "1 is not a callable");
        state.env.define(intern_symbol("+"), new_builtin("+", plus));
        assert!(matches!(
            eval_text("(+ 1 . 2)", &mut state, &mut rt),
            Err(SchemeError::SyntaxError)
        ));
    }

    #[test]
    fn test_operands_left_to_right() {
        let mut rt = RunTime::new();
        let mut state = CEKState::new(new_global_env());
        state.env.define(intern_symbol("+"), new_builtin("+", plus));
        state.env.define(intern_symbol("x"), SchemeValue::Int(1));
        let result = eval_text("(+ x x x)", &mut state, &mut rt).unwrap();
        assert!(matches!(result, SchemeValue::Int(3)));
    }

    fn collect(_rt: &mut RunTime, args: &[SchemeValue]) -> Result<SchemeValue, SchemeError> {
        Ok(list_from_slice(args))
    }

    #[test]
    fn test_wide_call_keeps_operand_order() {
        let mut rt = RunTime::new();
        let mut state = CEKState::new(new_global_env());
        state.env.define(intern_symbol("collect"), new_builtin("collect", collect));
        let operands: Vec<String> = (0..100_000).map(|i| i.to_string()).collect();
        let code = format!("(collect {})", operands.join(" "));
        let result = eval_text(&code, &mut state, &mut rt).unwrap();
        let items: Vec<i64> = list_iter(&result).filter_map(|v| v.as_int()).collect();
        assert_eq!(items.len(), 100_000);
        assert!(items.iter().enumerate().all(|(i, v)| *v == i as i64));
        assert_eq!(print_value(&eval_text("(collect)", &mut state, &mut rt).unwrap()), "()");
    }
}
