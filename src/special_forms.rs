/// special_forms.rs
/// Definitions of special forms implemented internally
///
/// Special forms are given the full expression, including the name of the form,
/// and leave the machine ready for its next step. Derived forms are rewritten
/// into core ones with the handler or primitive embedded in the rewritten
/// expression, so user definitions cannot capture them.
///
use crate::builtin::list::{append_b, cons_b, list_b};
use crate::env::EnvOps;
use crate::error::SchemeError;
use crate::eval::{
    AndOrKind, BindMode, CEKState, CondClause, RunTime, expect_symbol, insert_and_or, insert_bind,
    insert_body, insert_cond, insert_eval, insert_if, insert_value,
};
use crate::symbol::Symbol;
use crate::value::{
    Callable, Params, SchemeValue, SpecialFormFn, list_from_slice, list_to_vec, new_builtin,
    new_closure, new_promise, new_special_form, new_symbol,
};
use std::rc::Rc;

/// Macro to register special forms in the environment
///
/// Usage: register_special_form!(env,
///     "name" => function,
///     "another" => another_function,
/// );
macro_rules! register_special_form {
    ($env:expr, $($name:expr => $func:expr),* $(,)?) => {
        $(
            $env.define(crate::symbol::intern_symbol($name), new_special_form($name, $func));
        )*
    };
}

pub fn register_special_forms(env: &crate::env::EnvRef) {
    register_special_form!(env,
        "quote" => quote_sf,
        "quasiquote" => quasiquote_sf,
        "define" => define_sf,
        "set!" => set_sf,
        "lambda" => lambda_sf,
        "if" => if_sf,
        "begin" => begin_sf,
        "let" => let_sf,
        "let*" => let_star_sf,
        "letrec" => letrec_sf,
        "cond" => cond_sf,
        "and" => and_sf,
        "or" => or_sf,
        "delay" => delay_sf,
    );
}

/// The form as a vector, head included. Improper forms are syntax errors.
fn form_vec(expr: &SchemeValue, min: usize) -> Result<Vec<SchemeValue>, SchemeError> {
    let form = list_to_vec(expr)?;
    if form.len() < min {
        return Err(SchemeError::SyntaxError);
    }
    Ok(form)
}

fn body_of(exprs: &[SchemeValue]) -> Result<Rc<[SchemeValue]>, SchemeError> {
    if exprs.is_empty() {
        return Err(SchemeError::SyntaxError);
    }
    Ok(Rc::from(exprs.to_vec()))
}

/// Quote logic: return first argument unevaluated
fn quote_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 2)?;
    if form.len() != 2 {
        return Err(SchemeError::SyntaxError);
    }
    insert_value(state, form[1].clone());
    Ok(())
}

// ============================================================================
// LAMBDA AND DEFINITIONS
// ============================================================================

/// Parse a formals list: `(a b)`, `(a . rest)` or `args`.
fn parse_params(formals: &SchemeValue) -> Result<Params, SchemeError> {
    let mut params = Params::default();
    let mut current = formals.clone();
    loop {
        match current {
            SchemeValue::Nil => return Ok(params),
            SchemeValue::Symbol(rest) => {
                params.rest = Some(rest);
                return Ok(params);
            }
            SchemeValue::Pair(p) => {
                match p.car() {
                    SchemeValue::Symbol(name) => params.required.push(name),
                    other => return Err(SchemeError::wrong_type(&other, "Identifier")),
                }
                current = p.cdr();
            }
            _ => return Err(SchemeError::SyntaxError),
        }
    }
}

fn make_closure(
    name: Option<Symbol>,
    formals: &SchemeValue,
    body: &[SchemeValue],
    state: &CEKState,
) -> Result<SchemeValue, SchemeError> {
    let params = parse_params(formals)?;
    Ok(new_closure(name, params, body_of(body)?, state.env.clone()))
}

/// (lambda formals body...) => closure over the current environment
fn lambda_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 3)?;
    let closure = make_closure(None, &form[1], &form[2..], state)?;
    insert_value(state, closure);
    Ok(())
}

/// True if `expr` is `(lambda ...)` with `lambda` still naming the special form.
fn is_lambda_expr(expr: &SchemeValue, state: &CEKState) -> bool {
    let head = match expr {
        SchemeValue::Pair(p) => p.car(),
        _ => return false,
    };
    let bound = match head.as_symbol() {
        Some(sym) => state.env.lookup_cell(sym).map(|cell| cell.borrow().clone()),
        None => None,
    };
    matches!(
        bound,
        Some(SchemeValue::Callable(c)) if matches!(&*c, Callable::SpecialForm { name: "lambda", .. })
    )
}

/// (define sym expr) or (define (name . formals) body...)
///
/// Returns the defined symbol. A lambda defined by name carries that name.
pub fn define_sf(
    expr: &SchemeValue,
    _rt: &mut RunTime,
    state: &mut CEKState,
) -> Result<(), SchemeError> {
    let form = form_vec(expr, 3)?;
    match &form[1] {
        SchemeValue::Symbol(sym) => {
            if form.len() != 3 {
                return Err(SchemeError::SyntaxError);
            }
            if is_lambda_expr(&form[2], state) {
                let lambda = form_vec(&form[2], 3)?;
                let closure = make_closure(Some(sym.clone()), &lambda[1], &lambda[2..], state)?;
                state.env.define(sym.clone(), closure);
                insert_value(state, form[1].clone());
            } else {
                insert_bind(state, sym.clone(), BindMode::Define, form[2].clone());
            }
            Ok(())
        }
        SchemeValue::Pair(signature) => {
            let name = expect_symbol(&signature.car())?;
            let closure = make_closure(Some(name.clone()), &signature.cdr(), &form[2..], state)?;
            state.env.define(name.clone(), closure);
            insert_value(state, SchemeValue::Symbol(name));
            Ok(())
        }
        _ => Err(SchemeError::SyntaxError),
    }
}

/// (set! sym expr)
fn set_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 3)?;
    if form.len() != 3 {
        return Err(SchemeError::SyntaxError);
    }
    let sym = expect_symbol(&form[1])?;
    insert_bind(state, sym, BindMode::Assign, form[2].clone());
    Ok(())
}

/// (delay expr)
fn delay_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 2)?;
    if form.len() != 2 {
        return Err(SchemeError::SyntaxError);
    }
    insert_value(state, new_promise(form[1].clone(), state.env.clone()));
    Ok(())
}

// ============================================================================
// CONTROL
// ============================================================================

/// (if test consequent [alternate])
pub fn if_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 3)?;
    match form.len() {
        3 => insert_if(state, form[1].clone(), form[2].clone(), None),
        4 => insert_if(state, form[1].clone(), form[2].clone(), Some(form[3].clone())),
        _ => return Err(SchemeError::SyntaxError),
    }
    Ok(())
}

/// (begin form1 ..)
fn begin_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 2)?;
    insert_body(state, body_of(&form[1..])?)
}

fn and_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    and_or(expr, state, AndOrKind::And)
}

fn or_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    and_or(expr, state, AndOrKind::Or)
}

fn and_or(expr: &SchemeValue, state: &mut CEKState, kind: AndOrKind) -> Result<(), SchemeError> {
    let form = form_vec(expr, 1)?;
    insert_and_or(state, kind, list_from_slice(&form[1..]));
    Ok(())
}

/// (cond (test body...) (test => receiver) ... [(else body...)])
pub fn cond_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 1)?;
    let mut clauses = Vec::with_capacity(form.len() - 1);
    for clause in &form[1..] {
        let parts = list_to_vec(clause)?;
        if parts.is_empty() {
            return Err(SchemeError::SyntaxError);
        }
        if parts[0].is_symbol("else") {
            clauses.push(CondClause::Else {
                body: body_of(&parts[1..])?,
            });
        } else if parts.len() >= 2 && parts[1].is_symbol("=>") {
            if parts.len() != 3 {
                return Err(SchemeError::SyntaxError);
            }
            clauses.push(CondClause::Arrow {
                test: parts[0].clone(),
                receiver: parts[2].clone(),
            });
        } else {
            clauses.push(CondClause::Normal {
                test: parts[0].clone(),
                body: Rc::from(parts[1..].to_vec()),
            });
        }
    }
    insert_cond(state, Rc::from(clauses), 0)
}

// ============================================================================
// BINDING FORMS
// ============================================================================

/// Split `((var init) ...)` into variables and init expressions.
fn split_bindings(bindings: &SchemeValue) -> Result<(Vec<SchemeValue>, Vec<SchemeValue>), SchemeError> {
    let mut vars = Vec::new();
    let mut inits = Vec::new();
    for binding in list_to_vec(bindings)? {
        let parts = list_to_vec(&binding)?;
        if parts.len() != 2 {
            return Err(SchemeError::SyntaxError);
        }
        expect_symbol(&parts[0])?;
        vars.push(parts[0].clone());
        inits.push(parts[1].clone());
    }
    Ok((vars, inits))
}

/// (let ((var init) ...) body...) => ((lambda (var ...) body...) init ...)
/// (let name ((var init) ...) body...) => a closure bound to `name` in its
/// own scope, applied to the inits evaluated outside that scope.
pub fn let_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 3)?;
    match &form[1] {
        SchemeValue::Symbol(name) => {
            if form.len() < 4 {
                return Err(SchemeError::SyntaxError);
            }
            let (vars, inits) = split_bindings(&form[2])?;
            let params = parse_params(&list_from_slice(&vars))?;
            let loop_env = state.env.branch();
            let closure = new_closure(
                Some(name.clone()),
                params,
                body_of(&form[3..])?,
                loop_env.clone(),
            );
            loop_env.define(name.clone(), closure.clone());
            call_with_inits(state, closure, inits)
        }
        bindings => {
            let (vars, inits) = split_bindings(bindings)?;
            let closure = make_closure(None, &list_from_slice(&vars), &form[2..], state)?;
            call_with_inits(state, closure, inits)
        }
    }
}

fn call_with_inits(
    state: &mut CEKState,
    closure: SchemeValue,
    inits: Vec<SchemeValue>,
) -> Result<(), SchemeError> {
    let mut call = Vec::with_capacity(inits.len() + 1);
    call.push(closure);
    call.extend(inits);
    insert_eval(state, list_from_slice(&call));
    Ok(())
}

fn embedded(name: &'static str, func: SpecialFormFn) -> SchemeValue {
    new_special_form(name, func)
}

/// (let* ((v1 i1) (v2 i2) ...) body...) => (let ((v1 i1)) (let* ((v2 i2) ...) body...))
fn let_star_sf(expr: &SchemeValue, rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 3)?;
    let bindings = list_to_vec(&form[1])?;
    if bindings.len() <= 1 {
        let mut plain = vec![embedded("let", let_sf)];
        plain.extend(form[1..].iter().cloned());
        return let_sf(&list_from_slice(&plain), rt, state);
    }
    let mut inner = vec![embedded("let*", let_star_sf), list_from_slice(&bindings[1..])];
    inner.extend(form[2..].iter().cloned());
    let outer = list_from_slice(&[
        embedded("let", let_sf),
        list_from_slice(&bindings[..1]),
        list_from_slice(&inner),
    ]);
    insert_eval(state, outer);
    Ok(())
}

/// (letrec ((var init) ...) body...) => a fresh scope where each var is
/// defined in turn before the body runs.
fn letrec_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 3)?;
    let (vars, inits) = split_bindings(&form[1])?;
    let mut body = Vec::with_capacity(vars.len() + form.len() - 2);
    for (var, init) in vars.into_iter().zip(inits) {
        body.push(list_from_slice(&[embedded("define", define_sf), var, init]));
    }
    body.extend(form[2..].iter().cloned());
    state.env = state.env.branch();
    insert_body(state, Rc::from(body))
}

// ============================================================================
// QUASIQUOTE
// ============================================================================

/// (quasiquote template)
fn quasiquote_sf(expr: &SchemeValue, _rt: &mut RunTime, state: &mut CEKState) -> Result<(), SchemeError> {
    let form = form_vec(expr, 2)?;
    if form.len() != 2 {
        return Err(SchemeError::SyntaxError);
    }
    let expansion = expand_quasi(&form[1], 1)?;
    insert_eval(state, expansion);
    Ok(())
}

fn quoted(value: SchemeValue) -> SchemeValue {
    list_from_slice(&[embedded("quote", quote_sf), value])
}

/// `(keyword x)` => x
fn single_operand(form: &SchemeValue) -> Result<SchemeValue, SchemeError> {
    let parts = list_to_vec(form)?;
    if parts.len() != 2 {
        return Err(SchemeError::SyntaxError);
    }
    Ok(parts[1].clone())
}

/// Rewrite a template into list-building calls. `depth` counts enclosing
/// quasiquotes; only depth-1 unquotes are evaluated.
///
/// The list spine is walked in a loop and the calls are built from the
/// last element back, so long templates do not recurse per element.
fn expand_quasi(template: &SchemeValue, depth: usize) -> Result<SchemeValue, SchemeError> {
    let mut items = Vec::new();
    let mut current = template.clone();
    while let SchemeValue::Pair(pair) = &current {
        let head = pair.car();
        if head.is_symbol("unquote") || head.is_symbol("quasiquote") {
            break;
        }
        let next = pair.cdr();
        items.push(head);
        current = next;
    }
    let mut expansion = expand_quasi_tail(&current, depth)?;
    for head in items.into_iter().rev() {
        expansion = expand_quasi_item(&head, expansion, depth)?;
    }
    Ok(expansion)
}

/// The part of a template that is not a list element: an atom, or an
/// `unquote`/`quasiquote` form (possibly in dotted tail position).
fn expand_quasi_tail(tail: &SchemeValue, depth: usize) -> Result<SchemeValue, SchemeError> {
    if let SchemeValue::Pair(pair) = tail {
        let head = pair.car();
        if head.is_symbol("unquote") {
            let operand = single_operand(tail)?;
            if depth == 1 {
                return Ok(operand);
            }
            return Ok(tagged("unquote", expand_quasi(&operand, depth - 1)?));
        }
        if head.is_symbol("quasiquote") {
            let operand = single_operand(tail)?;
            return Ok(tagged("quasiquote", expand_quasi(&operand, depth + 1)?));
        }
    }
    Ok(quoted(tail.clone()))
}

/// One list element in front of the already expanded `rest`.
fn expand_quasi_item(
    head: &SchemeValue,
    rest: SchemeValue,
    depth: usize,
) -> Result<SchemeValue, SchemeError> {
    if let SchemeValue::Pair(inner) = head {
        if inner.car().is_symbol("unquote-splicing") {
            let operand = single_operand(head)?;
            if depth == 1 {
                return Ok(list_from_slice(&[new_builtin("append", append_b), operand, rest]));
            }
            let spliced = tagged("unquote-splicing", expand_quasi(&operand, depth - 1)?);
            return Ok(list_from_slice(&[new_builtin("cons", cons_b), spliced, rest]));
        }
    }
    Ok(list_from_slice(&[
        new_builtin("cons", cons_b),
        expand_quasi(head, depth)?,
        rest,
    ]))
}

/// Code building `(keyword <value of expansion>)`.
fn tagged(keyword: &str, expansion: SchemeValue) -> SchemeValue {
    list_from_slice(&[
        new_builtin("list", list_b),
        quoted(new_symbol(keyword)),
        expansion,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::new_global_env;
    use crate::eval::eval_main;
    use crate::parser::parse;
    use crate::printer::print_value;

    fn run(code: &str) -> Result<SchemeValue, SchemeError> {
        let env = new_global_env();
        register_special_forms(&env);
        crate::builtin::register_builtins(&env);
        let mut rt = RunTime::new();
        let mut state = CEKState::new(env);
        let mut result = SchemeValue::Unspecified;
        for expr in parse(code)? {
            result = eval_main(expr, &mut state, &mut rt)?;
        }
        Ok(result)
    }

    fn run_str(code: &str) -> String {
        match run(code) {
            Ok(v) => print_value(&v),
            Err(e) => format!("error: {}", e),
        }
    }

    #[test]
    fn test_quote() {
        assert_eq!(run_str("(quote (a b . c))"), "(a b . c)");
        assert_eq!(run_str("'sym"), "sym");
        assert_eq!(run_str("(quote)"), "error: Syntax error");
    }

    #[test]
    fn test_define_and_set() {
        assert_eq!(run_str("(define x 10)"), "x");
        assert_eq!(run_str("(define x 10) (set! x 20) x"), "20");
        assert_eq!(run_str("(define x 10) (set! x 20)"), "#<undefined>");
        assert_eq!(run_str("(set! y 1)"), "error: Unbound variable y");
        assert_eq!(run_str("(define 5 1)"), "error: Syntax error");
    }

    #[test]
    fn test_procedure_names() {
        assert_eq!(run_str("(define (f x) x) f"), "#<procedure f>");
        assert_eq!(run_str("(define g (lambda (x) x)) g"), "#<procedure g>");
        assert_eq!(run_str("(lambda (x) x)"), "#<procedure #f>");
        assert_eq!(run_str("if"), "#<primitive-macro if>");
    }

    #[test]
    fn test_lambda_formals() {
        assert_eq!(run_str("((lambda (a . rest) rest) 1 2 3)"), "(2 3)");
        assert_eq!(run_str("((lambda args args) 1 2)"), "(1 2)");
        assert_eq!(run_str("((lambda () 7))"), "7");
        assert_eq!(
            run_str("(lambda (1) 1)"),
            "error: Wrong argument type: 1 is not Identifier"
        );
        assert_eq!(run_str("(lambda (x))"), "error: Syntax error");
    }

    #[test]
    fn test_if() {
        assert_eq!(run_str("(if #t 1 2)"), "1");
        assert_eq!(run_str("(if #f 1 2)"), "2");
        assert_eq!(run_str("(if '() 1 2)"), "1");
        assert_eq!(run_str("(if #f 1)"), "#<undefined>");
        assert_eq!(run_str("(if #t)"), "error: Syntax error");
    }

    #[test]
    fn test_begin_and_or() {
        assert_eq!(run_str("(begin 1 2 3)"), "3");
        assert_eq!(run_str("(begin)"), "error: Syntax error");
        assert_eq!(run_str("(and)"), "#t");
        assert_eq!(run_str("(or)"), "#f");
        assert_eq!(run_str("(and 1 2 3)"), "3");
        assert_eq!(run_str("(and 1 #f 3)"), "#f");
        assert_eq!(run_str("(or #f 2 (car '()))"), "2");
    }

    #[test]
    fn test_let_family() {
        assert_eq!(run_str("(let ((x 1) (y 2)) (+ x y))"), "3");
        assert_eq!(run_str("(let* ((x 1) (y (+ x 1))) (* x y))"), "2");
        assert_eq!(run_str("(let* () 5)"), "5");
        assert_eq!(
            run_str("(letrec ((even? (lambda (n) (if (= n 0) #t (odd? (- n 1))))) (odd? (lambda (n) (if (= n 0) #f (even? (- n 1)))))) (even? 100))"),
            "#t"
        );
        assert_eq!(
            run_str("(let loop ((i 0) (acc '())) (if (= i 3) acc (loop (+ i 1) (cons i acc))))"),
            "(2 1 0)"
        );
        assert_eq!(run_str("(let ((x)) x)"), "error: Syntax error");
    }

    #[test]
    fn test_let_rebinding_keywords() {
        // Rewritten forms keep working when the keywords are shadowed.
        assert_eq!(run_str("(define (f let) (let* ((a 1) (b 2)) (+ a b))) (f 0)"), "3");
        assert_eq!(run_str("(define (g cons) `(1 ,cons)) (g 2)"), "(1 2)");
    }

    #[test]
    fn test_cond() {
        assert_eq!(run_str("(cond (#f 1) ((= 1 1) 2) (else 3))"), "2");
        assert_eq!(run_str("(cond (#f 1) (else 3))"), "3");
        assert_eq!(run_str("(cond ((assv 2 '((1 a) (2 b))) => cadr) (else 'no))"), "b");
        assert_eq!(run_str("(cond (5))"), "5");
        assert_eq!(run_str("(cond (#f 1))"), "#<undefined>");
        assert_eq!(run_str("(cond ())"), "error: Syntax error");
    }

    #[test]
    fn test_quasiquote() {
        assert_eq!(run_str("(define x 5) `(a ,x)"), "(a 5)");
        assert_eq!(run_str("`(1 ,@(list 2 3) 4)"), "(1 2 3 4)");
        assert_eq!(run_str("`(1 . ,(+ 1 1))"), "(1 . 2)");
        assert_eq!(run_str("`x"), "x");
        assert_eq!(
            run_str("(define x 5) `(a `(b ,(c ,x)))"),
            "(a (quasiquote (b (unquote (c 5)))))"
        );
        assert_eq!(run_str("`(1 ,@'() . ,(+ 1 2))"), "(1 . 3)");
    }

    #[test]
    fn test_quasiquote_long_template() {
        let items: Vec<String> = (0..200_000).map(|i| i.to_string()).collect();
        let code = format!("(length `({} ,(+ 1 2)))", items.join(" "));
        assert_eq!(run_str(&code), "200001");
        let code = format!("(car (reverse `(,@(list 'a) {})))", items.join(" "));
        assert_eq!(run_str(&code), "199999");
    }

    #[test]
    fn test_delay() {
        assert_eq!(run_str("(delay (+ 1 2))"), "#<promise: (+ 1 2)>");
    }
}
