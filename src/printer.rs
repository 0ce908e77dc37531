/// printer.rs
/// External representations of Scheme values.
///
/// `print_value` produces the re-readable (write) form; `display_value`
/// produces the human form used by `display`. They differ only for strings
/// and characters.
use crate::value::{Callable, SchemeValue};

pub fn print_value(val: &SchemeValue) -> String {
    let mut out = String::new();
    render(val, true, &mut out);
    out
}

pub fn display_value(val: &SchemeValue) -> String {
    let mut out = String::new();
    render(val, false, &mut out);
    out
}

/// Pending output. Nested data is rendered from an explicit stack so that
/// deep nesting does not grow the host stack.
enum Task {
    Value(SchemeValue, bool),
    /// The remainder of a list after its first element.
    Rest(SchemeValue, bool),
    Text(&'static str),
}

fn render(val: &SchemeValue, write: bool, out: &mut String) {
    let mut tasks = vec![Task::Value(val.clone(), write)];
    while let Some(task) = tasks.pop() {
        match task {
            Task::Text(text) => out.push_str(text),
            Task::Rest(rest, write) => match rest {
                SchemeValue::Pair(p) => {
                    out.push(' ');
                    tasks.push(Task::Rest(p.cdr(), write));
                    tasks.push(Task::Value(p.car(), write));
                }
                SchemeValue::Nil => out.push(')'),
                other => {
                    out.push_str(" . ");
                    tasks.push(Task::Text(")"));
                    tasks.push(Task::Value(other, write));
                }
            },
            Task::Value(value, write) => render_value(&value, write, out, &mut tasks),
        }
    }
}

fn render_value(val: &SchemeValue, write: bool, out: &mut String, tasks: &mut Vec<Task>) {
    match val {
        SchemeValue::Nil => out.push_str("()"),
        SchemeValue::Bool(true) => out.push_str("#t"),
        SchemeValue::Bool(false) => out.push_str("#f"),
        SchemeValue::Int(i) => out.push_str(&i.to_string()),
        SchemeValue::Float(f) => out.push_str(&format_float(*f)),
        SchemeValue::Char(c) => {
            if write {
                out.push_str("#\\");
                match c {
                    ' ' => out.push_str("space"),
                    '\n' => out.push_str("newline"),
                    _ => out.push(*c),
                }
            } else {
                out.push(*c);
            }
        }
        SchemeValue::Str(s) => {
            if write {
                out.push('"');
                for ch in s.borrow().chars() {
                    if ch == '"' || ch == '\\' {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push('"');
            } else {
                out.push_str(&s.borrow());
            }
        }
        SchemeValue::Symbol(s) => out.push_str(s.name()),
        SchemeValue::Pair(p) => {
            out.push('(');
            tasks.push(Task::Rest(p.cdr(), write));
            tasks.push(Task::Value(p.car(), write));
        }
        SchemeValue::Vector(v) => {
            out.push_str("#(");
            tasks.push(Task::Text(")"));
            for (i, item) in v.borrow().iter().enumerate().rev() {
                tasks.push(Task::Value(item.clone(), write));
                if i > 0 {
                    tasks.push(Task::Text(" "));
                }
            }
        }
        SchemeValue::Callable(c) => match &**c {
            Callable::Builtin { name, .. } | Callable::SysBuiltin { name, .. } => {
                out.push_str(&format!("#<primitive-procedure {}>", name))
            }
            Callable::SpecialForm { name, .. } => {
                out.push_str(&format!("#<primitive-macro {}>", name))
            }
            Callable::Closure { name, .. } => match name {
                Some(name) => out.push_str(&format!("#<procedure {}>", name)),
                None => out.push_str("#<procedure #f>"),
            },
            Callable::Continuation { .. } => out.push_str("#<continuation>"),
        },
        SchemeValue::Promise(p) => {
            out.push_str("#<promise: ");
            tasks.push(Task::Text(">"));
            tasks.push(Task::Value(p.expr.clone(), false));
        }
        SchemeValue::Unspecified => out.push_str("#<undefined>"),
    }
}

/// Reals always carry a fractional part or an exponent so they read back
/// as inexact: `12.0`, `0.5`, `1e+16`, `1e-05`.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{:e}", f);
        match s.split_once('e') {
            Some((mantissa, exp)) => {
                let exp: i32 = exp.parse().unwrap_or(0);
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{}e{}{:02}", mantissa, sign, exp.abs())
            }
            None => s,
        }
    } else if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}
