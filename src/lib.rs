//! A Scheme interpreter built on a CEK machine.
//!
//! Every procedure call in tail position runs in constant host stack, and
//! `call/cc` captures continuations that can be re-entered any number of
//! times. `Interpreter` is the entry point:
//!
//! ```
//! let mut interp = cekscheme::Interpreter::new();
//! let value = interp.eval_str("(define (sq x) (* x x)) (sq 12)").unwrap();
//! assert_eq!(cekscheme::printer::print_value(&value), "144");
//! ```

pub mod builtin;
pub mod env;
pub mod error;
pub mod eval;
pub mod parser;
pub mod printer;
pub mod repl;
pub mod special_forms;
pub mod symbol;
pub mod sys_builtins;
pub mod utilities;
pub mod value;

use crate::env::{EnvRef, new_global_env};
use crate::error::SchemeError;
use crate::eval::{CEKState, Output, RunTime, TraceType, eval_main};
use crate::value::SchemeValue;

pub struct Interpreter {
    global: EnvRef,
    state: CEKState,
    rt: RunTime,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// A fresh global scope with every special form and primitive bound.
    pub fn new() -> Self {
        let global = new_global_env();
        special_forms::register_special_forms(&global);
        builtin::register_builtins(&global);
        sys_builtins::register_sys_builtins(&global);
        Interpreter {
            state: CEKState::new(global.clone()),
            global,
            rt: RunTime::new(),
        }
    }

    /// Evaluate one top-level form, passing a finished-early signal through
    /// to the caller.
    pub fn eval_form(&mut self, expr: &SchemeValue) -> Result<SchemeValue, SchemeError> {
        self.state.env = self.global.clone();
        let result = eval_main(expr.clone(), &mut self.state, &mut self.rt);
        log::trace!("form finished after {} steps", self.rt.steps);
        result
    }

    /// Evaluate one top-level form. A continuation that escapes to the top
    /// level supplies the form's value.
    pub fn eval(&mut self, expr: &SchemeValue) -> Result<SchemeValue, SchemeError> {
        match self.eval_form(expr) {
            Err(SchemeError::FinishedEarly(value)) => Ok(value),
            other => other,
        }
    }

    /// Parse and evaluate every form in `code`, returning the last value.
    pub fn eval_str(&mut self, code: &str) -> Result<SchemeValue, SchemeError> {
        let forms = parser::parse(code)?;
        let mut last = SchemeValue::Unspecified;
        for form in &forms {
            last = self.eval(form)?;
        }
        Ok(last)
    }

    /// Redirect `display`, `write` and `newline`.
    pub fn set_output(&mut self, output: Output) {
        self.rt.output = output;
    }

    /// Take everything written to a buffer sink so far. Empty for stdout.
    pub fn take_output(&mut self) -> String {
        match &mut self.rt.output {
            Output::Buffer(buffer) => std::mem::take(buffer),
            Output::Stdout => String::new(),
        }
    }

    pub fn set_trace(&mut self, trace: TraceType) {
        self.rt.trace = trace;
    }

    /// Machine transitions taken since the interpreter was created.
    pub fn steps(&self) -> u64 {
        self.rt.steps
    }
}
