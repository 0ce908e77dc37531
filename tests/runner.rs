use cekscheme::Interpreter;
use cekscheme::eval::Output;
use cekscheme::repl::{Flow, run_file};
use std::io::Write;
use tempfile::NamedTempFile;

fn source_file(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn run(interp: &mut Interpreter, file: &NamedTempFile) -> (String, Flow) {
    let mut out = Vec::new();
    let flow = run_file(interp, file.path(), &mut out).unwrap();
    (String::from_utf8(out).unwrap(), flow)
}

#[test]
fn runs_every_form_in_a_file() {
    let file = source_file(
        "; squares\n(define (square x) (* x x))\n(map square '(1 2 3))\n\"done\"\n",
    );
    let mut interp = Interpreter::new();
    let (text, flow) = run(&mut interp, &file);
    assert_eq!(text, "square\n(1 4 9)\n\"done\"\n");
    assert_eq!(flow, Flow::Continue);
}

#[test]
fn definitions_persist_across_files() {
    let first = source_file("(define greeting \"hi\")");
    let second = source_file("(display greeting)");
    let mut interp = Interpreter::new();
    interp.set_output(Output::Buffer(String::new()));
    run(&mut interp, &first);
    let (text, _) = run(&mut interp, &second);
    assert_eq!(text, "#<undefined>\n");
    assert_eq!(interp.take_output(), "hi");
}

#[test]
fn runtime_error_aborts_the_file() {
    let file = source_file("(define x 1)\n(vector-ref (vector) 0)\n(define y 2)\n");
    let mut interp = Interpreter::new();
    let (text, flow) = run(&mut interp, &file);
    assert_eq!(text, "x\nerror: Wrong argument type: 0 is not Index\n");
    assert_eq!(flow, Flow::Continue);
    assert!(interp.eval_str("y").is_err());
}

#[test]
fn parse_error_reports_position() {
    let file = source_file("(define x 1)\n(display \"unterminated)\n");
    let mut interp = Interpreter::new();
    let (text, _) = run(&mut interp, &file);
    assert!(text.starts_with("parse error: in line 2, column "), "{}", text);
    // Nothing runs when the file does not parse.
    assert!(interp.eval_str("x").is_err());
}

#[test]
fn quit_stops_the_session() {
    let file = source_file("1\n(quit)\n2\n");
    let mut interp = Interpreter::new();
    let (text, flow) = run(&mut interp, &file);
    assert_eq!(text, "1\n");
    assert_eq!(flow, Flow::Quit);
}

#[test]
fn missing_file_is_an_io_error() {
    let mut interp = Interpreter::new();
    let mut out = Vec::new();
    let missing = std::path::Path::new("/nonexistent/definitely/missing.scm");
    assert!(run_file(&mut interp, missing, &mut out).is_err());
}
