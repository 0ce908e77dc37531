pub mod cek;
pub mod kont;

use crate::env::{EnvOps, EnvRef};
use crate::error::SchemeError;
use crate::symbol::Symbol;
use crate::value::{Params, SchemeValue, list_from_slice};
use std::io::Write;
pub use cek::{apply_proc, eval_main, force_promise, map_step};
pub use kont::{
    AndOrKind, BindMode, CEKState, CondClause, Control, Kont, KontRef, halt, insert_and_or,
    insert_bind, insert_body, insert_cond, insert_eval, insert_if, insert_value,
};

/// Where primitive output goes.
pub enum Output {
    Stdout,
    Buffer(String),
}

/// Interpreter-wide state threaded through every step and primitive call.
pub struct RunTime {
    pub output: Output,
    pub trace: TraceType,
    pub steps: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceType {
    Off,
    Control,
    Full,
}

impl TraceType {
    pub fn name(&self) -> &'static str {
        match self {
            TraceType::Off => "off",
            TraceType::Control => "control",
            TraceType::Full => "full",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "off" => Some(TraceType::Off),
            "control" => Some(TraceType::Control),
            "full" => Some(TraceType::Full),
            _ => None,
        }
    }
}

impl Default for RunTime {
    fn default() -> Self {
        Self::new()
    }
}

impl RunTime {
    pub fn new() -> Self {
        RunTime {
            output: Output::Stdout,
            trace: TraceType::Off,
            steps: 0,
        }
    }

    /// Send text to the current output sink.
    pub fn write_str(&mut self, text: &str) {
        match &mut self.output {
            Output::Stdout => {
                write_through(&mut std::io::stdout(), text);
            }
            Output::Buffer(buffer) => buffer.push_str(text),
        }
    }
}

/// Write and flush; a failing sink is logged rather than raised, so output
/// errors never abort evaluation.
fn write_through(out: &mut impl Write, text: &str) -> bool {
    match out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("failed to write output: {}", e);
            false
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Build the call frame for a closure: a child of the closure's own
/// environment with each formal bound to a fresh cell.
pub fn bind_params(
    params: &Params,
    args: &[SchemeValue],
    parent_env: &EnvRef,
) -> Result<EnvRef, SchemeError> {
    let num_required = params.required.len();
    let arity_ok = match params.rest {
        Some(_) => args.len() >= num_required,
        None => args.len() == num_required,
    };
    if !arity_ok {
        return Err(SchemeError::wrong_args(args.len(), params.arity()));
    }
    let new_env = parent_env.branch();
    for (name, arg) in params.required.iter().zip(args) {
        new_env.define(name.clone(), arg.clone());
    }
    if let Some(rest) = &params.rest {
        new_env.define(rest.clone(), list_from_slice(&args[num_required..]));
    }
    Ok(new_env)
}

/// Expect exactly N arguments
pub fn expect_n_args(args: &[SchemeValue], n: usize) -> Result<(), SchemeError> {
    if args.len() != n {
        Err(SchemeError::wrong_args(args.len(), n))
    } else {
        Ok(())
    }
}

/// Expect at least N arguments
pub fn expect_at_least_n_args(args: &[SchemeValue], n: usize) -> Result<(), SchemeError> {
    if args.len() < n {
        Err(SchemeError::wrong_args(args.len(), format!(">={}", n)))
    } else {
        Ok(())
    }
}

/// Expect between `min` and `max` arguments
pub fn expect_args_range(args: &[SchemeValue], min: usize, max: usize) -> Result<(), SchemeError> {
    if args.len() < min || args.len() > max {
        Err(SchemeError::wrong_args(args.len(), format!("{}-{}", min, max)))
    } else {
        Ok(())
    }
}

/// Expect a symbol in a syntactic position
pub fn expect_symbol(expr: &SchemeValue) -> Result<Symbol, SchemeError> {
    match expr {
        SchemeValue::Symbol(s) => Ok(s.clone()),
        _ => Err(SchemeError::SyntaxError),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::new_global_env;
    use crate::printer::print_value;
    use crate::symbol::intern_symbol;

    fn params(required: &[&str], rest: Option<&str>) -> Params {
        Params {
            required: required.iter().map(|s| intern_symbol(s)).collect(),
            rest: rest.map(intern_symbol),
        }
    }

    #[test]
    fn test_bind_params_fixed() {
        let env = new_global_env();
        let p = params(&["a", "b"], None);
        let frame = bind_params(&p, &[SchemeValue::Int(1), SchemeValue::Int(2)], &env).unwrap();
        assert!(matches!(frame.lookup(&intern_symbol("b")), Ok(SchemeValue::Int(2))));
        let err = bind_params(&p, &[SchemeValue::Int(1)], &env).unwrap_err();
        assert_eq!(err.to_string(), "Wrong number of args. Got: 1, expected: 2");
    }

    #[test]
    fn test_bind_params_rest() {
        let env = new_global_env();
        let p = params(&["a"], Some("rest"));
        let args = [SchemeValue::Int(1), SchemeValue::Int(2), SchemeValue::Int(3)];
        let frame = bind_params(&p, &args, &env).unwrap();
        let rest = frame.lookup(&intern_symbol("rest")).unwrap();
        assert_eq!(print_value(&rest), "(2 3)");
        let frame = bind_params(&p, &args[..1], &env).unwrap();
        assert!(frame.lookup(&intern_symbol("rest")).unwrap().is_nil());
        let err = bind_params(&p, &[], &env).unwrap_err();
        assert_eq!(err.to_string(), "Wrong number of args. Got: 0, expected: >=1");
    }

    #[test]
    fn test_bind_params_variadic() {
        let env = new_global_env();
        let p = params(&[], Some("args"));
        let frame = bind_params(&p, &[], &env).unwrap();
        assert!(frame.lookup(&intern_symbol("args")).unwrap().is_nil());
    }

    #[test]
    fn test_expect_helpers() {
        let args = [SchemeValue::Int(1), SchemeValue::Int(2)];
        assert!(expect_n_args(&args, 2).is_ok());
        assert!(expect_n_args(&args, 1).is_err());
        assert!(expect_at_least_n_args(&args, 3).is_err());
        assert!(expect_args_range(&args, 1, 2).is_ok());
        assert_eq!(
            expect_args_range(&args, 0, 1).unwrap_err().to_string(),
            "Wrong number of args. Got: 2, expected: 0-1"
        );
        assert!(matches!(expect_symbol(&SchemeValue::Int(1)), Err(SchemeError::SyntaxError)));
    }

    #[test]
    fn test_output_buffer() {
        let mut rt = RunTime::new();
        rt.output = Output::Buffer(String::new());
        rt.write_str("hello ");
        rt.write_str("world");
        assert!(matches!(&rt.output, Output::Buffer(s) if s == "hello world"));
        assert_eq!(TraceType::from_name("FULL"), Some(TraceType::Full));
        assert_eq!(TraceType::Control.name(), "control");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        assert!(!write_through(&mut ClosedPipe, "lost"));
        let mut sink = Vec::new();
        assert!(write_through(&mut sink, "kept"));
        assert_eq!(sink, b"kept");
    }
}
