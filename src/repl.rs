/// Front ends: the interactive loop and the file runner.
///
/// Both print results in write form and report failures as text rather
/// than aborting the process.
use crate::Interpreter;
use crate::error::SchemeError;
use crate::parser::parse;
use crate::printer::{display_value, print_value};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::path::Path;

pub const PROMPT: &str = "-> ";
pub const CONTINUATION_PROMPT: &str = ".. ";

/// Whether a session should keep reading after a chunk of input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// A chunk of input is complete once its parentheses balance.
pub fn parens_balanced(text: &str) -> bool {
    let open = text.chars().filter(|c| *c == '(').count();
    let close = text.chars().filter(|c| *c == ')').count();
    open == close
}

fn report(out: &mut impl Write, err: &SchemeError) -> io::Result<()> {
    match err {
        SchemeError::Parse(e) => writeln!(out, "parse error: {}", e),
        other => writeln!(out, "error: {}", other),
    }
}

/// Parse `text` and evaluate every form, printing each result.
/// Stops at the first error; `(quit)` ends the session.
pub fn run_source(interp: &mut Interpreter, text: &str, out: &mut impl Write) -> io::Result<Flow> {
    let forms = match parse(text) {
        Ok(forms) => forms,
        Err(e) => {
            report(out, &e)?;
            return Ok(Flow::Continue);
        }
    };
    for form in &forms {
        match interp.eval_form(form) {
            Ok(value) => writeln!(out, "{}", print_value(&value))?,
            Err(SchemeError::FinishedEarly(value)) => writeln!(out, "{}", display_value(&value))?,
            Err(SchemeError::Quit) => return Ok(Flow::Quit),
            Err(e) => {
                report(out, &e)?;
                break;
            }
        }
    }
    Ok(Flow::Continue)
}

/// Load and run one file.
pub fn run_file(interp: &mut Interpreter, path: &Path, out: &mut impl Write) -> io::Result<Flow> {
    log::info!("loading {}", path.display());
    let text = std::fs::read_to_string(path)?;
    run_source(interp, &text, out)
}

/// Read-eval-print loop over a line editor. Lines accumulate until the
/// parentheses balance.
pub fn repl(interp: &mut Interpreter) -> Result<(), ReadlineError> {
    let mut rl = DefaultEditor::new()?;
    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { PROMPT } else { CONTINUATION_PROMPT };
        match rl.readline(prompt) {
            Ok(line) => {
                pending.push_str(&line);
                pending.push('\n');
                if pending.trim().is_empty() {
                    pending.clear();
                    continue;
                }
                if !parens_balanced(&pending) {
                    continue;
                }
                let _ = rl.add_history_entry(pending.trim());
                let text = std::mem::take(&mut pending);
                if run_source(interp, &text, &mut io::stdout())? == Flow::Quit {
                    break;
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(interp: &mut Interpreter, text: &str) -> (String, Flow) {
        let mut out = Vec::new();
        let flow = run_source(interp, text, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), flow)
    }

    #[test]
    fn test_parens_balanced() {
        assert!(parens_balanced("(+ 1 2)"));
        assert!(!parens_balanced("(define (f x)\n"));
        assert!(parens_balanced(""));
    }

    #[test]
    fn test_run_source_prints_each_result() {
        let mut interp = Interpreter::new();
        let (text, flow) = run(&mut interp, "(define x 2) (* x 21) \"s\"");
        assert_eq!(text, "x\n42\n\"s\"\n");
        assert_eq!(flow, Flow::Continue);
    }

    #[test]
    fn test_run_source_reports_errors() {
        let mut interp = Interpreter::new();
        let (text, _) = run(&mut interp, "1 (car '()) 2");
        assert_eq!(text, "1\nerror: Wrong argument type: () is not Pair\n");
        let (text, _) = run(&mut interp, "(+ 1");
        assert!(text.starts_with("parse error: in line 1, column 5 expected:"), "{}", text);
    }

    #[test]
    fn test_run_source_quit_and_escape() {
        let mut interp = Interpreter::new();
        let (text, flow) = run(&mut interp, "1 (quit) 2");
        assert_eq!(text, "1\n");
        assert_eq!(flow, Flow::Quit);

        let (text, _) = run(
            &mut interp,
            "(define k #f) (call/cc (lambda (c) (set! k c) \"a\")) (k \"b\")",
        );
        assert_eq!(text, "k\n\"a\"\nb\n");
    }
}
