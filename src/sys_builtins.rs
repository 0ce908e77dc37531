use crate::env::EnvRef;
use crate::error::SchemeError;
use crate::eval::{
    CEKState, Control, KontRef, RunTime, TraceType, apply_proc, expect_args_range,
    expect_at_least_n_args, expect_n_args, force_promise, map_step,
};
use crate::value::{
    SchemeValue, expect_list, new_continuation, new_symbol, new_sys_builtin,
};

/// System Builtin Functions
///
/// These functions are classified as procedures, and receive evaluated arguments.
/// They differ from normal builtins in that they also receive the machine and
/// the continuation their result is owed to.
///
/// Like special forms, they return values through the CEK evaluator rather than directly,
/// which lets `apply`, `map` and friends call procedures without nesting the evaluator.

macro_rules! register_sys_builtins {
    ($env:expr, $($name:expr => $func:expr),* $(,)?) => {
        $(
            crate::env::EnvOps::define(
                $env,
                crate::symbol::intern_symbol($name),
                new_sys_builtin($name, $func),
            );
        )*
    };
}

pub fn register_sys_builtins(env: &EnvRef) {
    register_sys_builtins!(env,
        "apply" => apply_sp,
        "call/cc" => call_cc_sp,
        "call-with-current-continuation" => call_cc_sp,
        "map" => map_sp,
        "for-each" => for_each_sp,
        "force" => force_sp,
        "quit" => quit_sp,
        "trace" => trace_sp,
    );
}

fn deliver(state: &mut CEKState, value: SchemeValue, next: KontRef) -> Result<(), SchemeError> {
    state.kont = next;
    state.control = Control::Value(value);
    Ok(())
}

fn expect_procedure(value: &SchemeValue) -> Result<(), SchemeError> {
    if value.is_procedure() {
        Ok(())
    } else {
        Err(SchemeError::wrong_type(value, "Procedure"))
    }
}

/// (apply func arg ... list)
/// Applies a function to the arguments, the last of which is spread from a list.
fn apply_sp(
    rt: &mut RunTime,
    args: &[SchemeValue],
    state: &mut CEKState,
    next: KontRef,
) -> Result<(), SchemeError> {
    expect_at_least_n_args(args, 2)?;
    let func = args[0].clone();
    expect_procedure(&func)?;
    let (last, leading) = match args[1..].split_last() {
        Some(split) => split,
        None => return Err(SchemeError::wrong_args(args.len(), ">=2")),
    };
    let mut call_args = leading.to_vec();
    call_args.extend(expect_list(last)?);
    apply_proc(state, rt, func, call_args, next)
}

/// (call/cc proc)
/// Calls `proc` with the current continuation reified as a procedure.
fn call_cc_sp(
    rt: &mut RunTime,
    args: &[SchemeValue],
    state: &mut CEKState,
    next: KontRef,
) -> Result<(), SchemeError> {
    if args.len() != 1 || !args[0].is_procedure() {
        return Err(SchemeError::SyntaxError);
    }
    let k = new_continuation(next.clone());
    apply_proc(state, rt, args[0].clone(), vec![k], next)
}

/// (map proc list1 list2 ...)
fn map_sp(
    rt: &mut RunTime,
    args: &[SchemeValue],
    state: &mut CEKState,
    next: KontRef,
) -> Result<(), SchemeError> {
    start_map(rt, args, state, next, false)
}

/// (for-each proc list1 list2 ...)
fn for_each_sp(
    rt: &mut RunTime,
    args: &[SchemeValue],
    state: &mut CEKState,
    next: KontRef,
) -> Result<(), SchemeError> {
    start_map(rt, args, state, next, true)
}

fn start_map(
    rt: &mut RunTime,
    args: &[SchemeValue],
    state: &mut CEKState,
    next: KontRef,
    for_each: bool,
) -> Result<(), SchemeError> {
    expect_at_least_n_args(args, 2)?;
    expect_procedure(&args[0])?;
    for list in &args[1..] {
        expect_list(list)?;
    }
    map_step(
        state,
        rt,
        args[0].clone(),
        args[1..].to_vec(),
        SchemeValue::Nil,
        for_each,
        next,
    )
}

/// (force promise)
fn force_sp(
    _rt: &mut RunTime,
    args: &[SchemeValue],
    state: &mut CEKState,
    next: KontRef,
) -> Result<(), SchemeError> {
    expect_n_args(args, 1)?;
    match &args[0] {
        SchemeValue::Promise(p) => {
            force_promise(state, p.clone(), next);
            Ok(())
        }
        other => Err(SchemeError::wrong_type(other, "Promise")),
    }
}

/// (quit)
fn quit_sp(
    _rt: &mut RunTime,
    _args: &[SchemeValue],
    _state: &mut CEKState,
    _next: KontRef,
) -> Result<(), SchemeError> {
    Err(SchemeError::Quit)
}

/// (trace ['off | 'control | 'full])
/// With no argument, returns the current level.
fn trace_sp(
    rt: &mut RunTime,
    args: &[SchemeValue],
    state: &mut CEKState,
    next: KontRef,
) -> Result<(), SchemeError> {
    expect_args_range(args, 0, 1)?;
    if args.is_empty() {
        return deliver(state, new_symbol(rt.trace.name()), next);
    }
    let level = args[0]
        .as_symbol()
        .and_then(|sym| TraceType::from_name(sym.name()))
        .ok_or_else(|| SchemeError::wrong_type(&args[0], "TraceLevel"))?;
    log::info!("trace level set to {}", level.name());
    rt.trace = level;
    deliver(state, args[0].clone(), next)
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;
    use crate::error::SchemeError;
    use crate::printer::print_value;

    fn run(code: &str) -> String {
        let mut interp = Interpreter::new();
        match interp.eval_str(code) {
            Ok(v) => print_value(&v),
            Err(e) => format!("error: {}", e),
        }
    }

    #[test]
    fn test_apply() {
        assert_eq!(run("(apply + '(1 2 3))"), "6");
        assert_eq!(run("(apply + 1 2 '(3 4))"), "10");
        assert_eq!(run("(apply list '())"), "()");
        assert_eq!(run("(apply + 1)"), "error: Wrong argument type: 1 is not List");
        assert_eq!(run("(apply 5 '(1))"), "error: Wrong argument type: 5 is not Procedure");
    }

    #[test]
    fn test_map_and_for_each() {
        assert_eq!(run("(map + '(1 2 3) '(4 5 6))"), "(5 7 9)");
        assert_eq!(run("(map (lambda (x) (* x x)) '(1 2 3))"), "(1 4 9)");
        assert_eq!(run("(map + '(1 2 3) '(10 20))"), "(11 22)");
        assert_eq!(run("(map car '())"), "()");
        assert_eq!(run("(for-each car '((1) (2)))"), "#<undefined>");
        assert_eq!(run("(map car 5)"), "error: Wrong argument type: 5 is not List");
        assert_eq!(
            run("(define acc '()) (for-each (lambda (x) (set! acc (cons x acc))) '(1 2 3)) acc"),
            "(3 2 1)"
        );
    }

    #[test]
    fn test_map_reentry() {
        // Re-entering a continuation captured inside map must not disturb the
        // results of the first pass.
        let code = "
            (define k #f)
            (define result (map (lambda (x) (call/cc (lambda (c) (if (= x 2) (set! k c)) x))) '(1 2 3)))
            (define first result)
            (if (= (cadr result) 2) (k 10))
            (list first result)";
        assert_eq!(run(code), "((1 2 3) (1 10 3))");
    }

    #[test]
    fn test_call_cc_escape() {
        assert_eq!(run("(+ 1 (call/cc (lambda (k) (+ 10 (k 5)))))"), "6");
        assert_eq!(run("(call/cc (lambda (k) 42))"), "42");
        assert_eq!(run("(call-with-current-continuation procedure?)"), "#t");
        assert_eq!(run("(call/cc 5)"), "error: Syntax error");
    }

    #[test]
    fn test_force() {
        assert_eq!(run("(force (delay (+ 1 2)))"), "3");
        assert_eq!(
            run("(define n 0) (define p (delay (begin (set! n (+ n 1)) n))) (force p) (force p) n"),
            "1"
        );
        assert_eq!(run("(force 1)"), "error: Wrong argument type: 1 is not Promise");
    }

    #[test]
    fn test_quit_and_trace() {
        let mut interp = Interpreter::new();
        assert!(matches!(interp.eval_str("(quit)"), Err(SchemeError::Quit)));
        assert_eq!(run("(trace)"), "off");
        assert_eq!(run("(trace 'full) (trace)"), "full");
        assert_eq!(run("(trace 'control) (trace 'off) (trace)"), "off");
    }
}
