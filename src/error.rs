//! Error and control-signal types shared by the reader, the evaluator and the
//! primitive library.

use crate::printer::print_value;
use crate::value::SchemeValue;
use thiserror::Error;

/// Failure reported by the reader.
///
/// `line` and `column` are 1-based and point at the furthest position the
/// parser reached; `expected` lists the tokens that would have allowed it to
/// continue from there.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("in line {line}, column {column} expected: {}", .expected.join(" "))]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub expected: Vec<String>,
}

#[derive(Error, Debug, Clone)]
pub enum SchemeError {
    #[error("Unbound variable {0}")]
    UnboundVariable(String),
    #[error("{} is not a callable", display(.0))]
    NotCallable(SchemeValue),
    #[error("Wrong number of args. Got: {0}, expected: {1}")]
    WrongArgsNumber(usize, String),
    #[error("Wrong argument type: {} is not {1}", display(.0))]
    WrongArgType(SchemeValue, String),
    #[error("Syntax error")]
    SyntaxError,
    #[error("{0}")]
    Parse(#[from] ParseError),
    /// Raised by `(quit)`; terminates the session, not a failure.
    #[error("quit")]
    Quit,
    /// A top-level continuation was invoked; carries the final value.
    #[error("continuation returned {}", print_value(.0))]
    FinishedEarly(SchemeValue),
}

fn display(value: &SchemeValue) -> String {
    crate::printer::display_value(value)
}

impl SchemeError {
    pub fn wrong_args(got: usize, expected: impl ToString) -> Self {
        SchemeError::WrongArgsNumber(got, expected.to_string())
    }

    pub fn wrong_type(value: &SchemeValue, kind: &str) -> Self {
        SchemeError::WrongArgType(value.clone(), kind.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{new_pair, new_string};

    #[test]
    fn test_error_messages() {
        let err = SchemeError::UnboundVariable("foo".to_string());
        assert_eq!(err.to_string(), "Unbound variable foo");

        let err = SchemeError::wrong_args(1, 2);
        assert_eq!(err.to_string(), "Wrong number of args. Got: 1, expected: 2");

        let err = SchemeError::wrong_type(&SchemeValue::Int(5), "Pair");
        assert_eq!(err.to_string(), "Wrong argument type: 5 is not Pair");

        let err = SchemeError::NotCallable(new_string("abc"));
        assert_eq!(err.to_string(), "abc is not a callable");

        assert_eq!(SchemeError::SyntaxError.to_string(), "Syntax error");
    }

    #[test]
    fn test_finished_early_uses_write_form() {
        let pair = new_pair(new_string("x"), SchemeValue::Nil);
        let err = SchemeError::FinishedEarly(pair);
        assert_eq!(err.to_string(), "continuation returned (\"x\")");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError {
            line: 2,
            column: 5,
            expected: vec!["')'".to_string(), "SYMBOL".to_string()],
        };
        assert_eq!(err.to_string(), "in line 2, column 5 expected: ')' SYMBOL");
        let wrapped: SchemeError = err.into();
        assert!(matches!(wrapped, SchemeError::Parse(_)));
    }
}
