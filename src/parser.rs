//! Reader for Scheme s-expressions.
//!
//! A memoizing (packrat) recursive-descent parser over this grammar, with
//! ordered alternatives:
//!
//! ```text
//! file    := IGNORE* sexpr* EOF
//! sexpr   := list | vector | quote | quasiquote | unquote-splicing | unquote
//!          | ELLIPSIS | FLOAT | FIXNUM | BOOLEAN | SYMBOL | CHARACTER | STRING
//! list    := '(' IGNORE* pair ')' IGNORE*
//! pair    := sexpr '.' IGNORE* sexpr | sexpr pair | <empty>
//! vector  := '#(' IGNORE* sexpr* ')' IGNORE*
//! quote   := "'" sexpr          (and "`", ",@", "," likewise)
//! ```
//!
//! Every token swallows the whitespace and `;` comments that follow it. On
//! failure the parser reports the furthest position it reached and the set
//! of tokens that would have let it continue there.

use crate::error::{ParseError, SchemeError};
use crate::value::{
    SchemeValue, list_from_slice, list_with_tail, new_char, new_string, new_symbol, new_vector,
};
use std::collections::{BTreeSet, HashMap};

/// Parse every top-level form in `code`.
pub fn parse(code: &str) -> Result<Vec<SchemeValue>, SchemeError> {
    Parser::new(code).parse_file()
}

pub struct Parser {
    text: Vec<char>,
    memo: HashMap<usize, Option<(SchemeValue, usize)>>,
    furthest: usize,
    expected: BTreeSet<&'static str>,
    fatal: Option<SchemeError>,
}

fn is_initial(c: char) -> bool {
    c.is_ascii_alphabetic() || "+-*^?!<=>_~/$%&:".contains(c)
}

fn is_subsequent(c: char) -> bool {
    is_initial(c) || c.is_ascii_digit() || c == '.'
}

impl Parser {
    pub fn new(code: &str) -> Self {
        Parser {
            text: code.chars().collect(),
            memo: HashMap::new(),
            furthest: 0,
            expected: BTreeSet::new(),
            fatal: None,
        }
    }

    pub fn parse_file(&mut self) -> Result<Vec<SchemeValue>, SchemeError> {
        let mut pos = self.skip_ignore(0);
        let mut forms = Vec::new();
        while let Some((form, next)) = self.sexpr(pos) {
            forms.push(form);
            pos = next;
        }
        if let Some(err) = self.fatal.take() {
            return Err(err);
        }
        if pos < self.text.len() {
            self.fail(pos, "EOF");
            return Err(self.error().into());
        }
        Ok(forms)
    }

    fn error(&self) -> ParseError {
        let before = &self.text[..self.furthest.min(self.text.len())];
        let line = before.iter().filter(|c| **c == '\n').count() + 1;
        let line_start = before
            .iter()
            .rposition(|c| *c == '\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        ParseError {
            line,
            column: self.furthest - line_start + 1,
            expected: self.expected.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn fail(&mut self, pos: usize, what: &'static str) {
        if pos > self.furthest {
            self.furthest = pos;
            self.expected.clear();
        }
        if pos == self.furthest {
            self.expected.insert(what);
        }
    }

    fn peek(&self, pos: usize) -> Option<char> {
        self.text.get(pos).copied()
    }

    fn skip_ignore(&self, mut pos: usize) -> usize {
        while let Some(c) = self.peek(pos) {
            match c {
                ' ' | '\n' | '\t' | '\r' => pos += 1,
                ';' => {
                    while matches!(self.peek(pos), Some(c) if c != '\n') {
                        pos += 1;
                    }
                }
                _ => break,
            }
        }
        pos
    }

    fn literal(&mut self, pos: usize, lit: &'static str, label: &'static str) -> Option<usize> {
        let mut end = pos;
        for expected in lit.chars() {
            if self.peek(end) != Some(expected) {
                self.fail(pos, label);
                return None;
            }
            end += 1;
        }
        Some(end)
    }

    fn token(&self, value: SchemeValue, end: usize) -> Option<(SchemeValue, usize)> {
        Some((value, self.skip_ignore(end)))
    }

    fn text_between(&self, start: usize, end: usize) -> String {
        self.text[start..end].iter().collect()
    }

    // ------------------------------------------------------------------
    // Structured rules
    // ------------------------------------------------------------------

    fn sexpr(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        if let Some(cached) = self.memo.get(&pos) {
            return cached.clone();
        }
        let result = self
            .list(pos)
            .or_else(|| self.vector(pos))
            .or_else(|| self.abbreviation(pos, "'", "quote"))
            .or_else(|| self.abbreviation(pos, "`", "quasiquote"))
            .or_else(|| self.abbreviation(pos, ",@", "unquote-splicing"))
            .or_else(|| self.abbreviation(pos, ",", "unquote"))
            .or_else(|| self.ellipsis(pos))
            .or_else(|| self.float(pos))
            .or_else(|| self.fixnum(pos))
            .or_else(|| self.boolean(pos))
            .or_else(|| self.symbol(pos))
            .or_else(|| self.character(pos))
            .or_else(|| self.string(pos));
        self.memo.insert(pos, result.clone());
        result
    }

    fn list(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        let start = self.literal(pos, "(", "'('")?;
        let (list, end) = self.pair(self.skip_ignore(start));
        let end = self.literal(end, ")", "')'")?;
        self.token(list, end)
    }

    /// The three `pair` productions, unrolled into a loop.
    fn pair(&mut self, mut pos: usize) -> (SchemeValue, usize) {
        let mut items = Vec::new();
        while let Some((car, after)) = self.sexpr(pos) {
            items.push(car);
            if let Some(dot) = self.literal(after, ".", "'.'") {
                let cdr_start = self.skip_ignore(dot);
                if let Some((cdr, end)) = self.sexpr(cdr_start) {
                    return (list_with_tail(&items, cdr), end);
                }
            }
            pos = after;
        }
        (list_from_slice(&items), pos)
    }

    fn vector(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        let start = self.literal(pos, "#(", "'#('")?;
        let mut pos = self.skip_ignore(start);
        let mut items = Vec::new();
        while let Some((item, next)) = self.sexpr(pos) {
            items.push(item);
            pos = next;
        }
        let end = self.literal(pos, ")", "')'")?;
        self.token(new_vector(items), end)
    }

    fn abbreviation(
        &mut self,
        pos: usize,
        prefix: &'static str,
        keyword: &str,
    ) -> Option<(SchemeValue, usize)> {
        let start = self.literal(pos, prefix, prefix_label(prefix))?;
        let (datum, end) = self.sexpr(start)?;
        Some((list_from_slice(&[new_symbol(keyword), datum]), end))
    }

    // ------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------

    fn ellipsis(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        let end = self.literal(pos, "...", "ELLIPSIS")?;
        self.token(new_symbol("..."), end)
    }

    fn digits(&self, mut pos: usize) -> usize {
        while matches!(self.peek(pos), Some(c) if c.is_ascii_digit()) {
            pos += 1;
        }
        pos
    }

    fn float(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        let mut p = pos;
        if self.peek(p) == Some('-') {
            p += 1;
        }
        let int_end = self.digits(p);
        if self.peek(int_end) != Some('.') {
            self.fail(pos, "FLOAT");
            return None;
        }
        let frac_end = self.digits(int_end + 1);
        if int_end == p && frac_end == int_end + 1 {
            self.fail(pos, "FLOAT");
            return None;
        }
        match self.text_between(pos, frac_end).parse::<f64>() {
            Ok(f) => self.token(SchemeValue::Float(f), frac_end),
            Err(_) => {
                self.fail(pos, "FLOAT");
                None
            }
        }
    }

    fn fixnum(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        let mut p = pos;
        if self.peek(p) == Some('-') {
            p += 1;
        }
        let end = match self.peek(p) {
            Some('0') => p + 1,
            Some(c) if c.is_ascii_digit() => self.digits(p),
            _ => {
                self.fail(pos, "FIXNUM");
                return None;
            }
        };
        let text = self.text_between(pos, end);
        // Literals beyond the exact range read as inexact.
        let value = match text.parse::<i64>() {
            Ok(i) => SchemeValue::Int(i),
            Err(_) => SchemeValue::Float(text.parse::<f64>().unwrap_or(f64::NAN)),
        };
        self.token(value, end)
    }

    fn boolean(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        match (self.peek(pos), self.peek(pos + 1)) {
            (Some('#'), Some('t')) => self.token(SchemeValue::Bool(true), pos + 2),
            (Some('#'), Some('f')) => self.token(SchemeValue::Bool(false), pos + 2),
            _ => {
                self.fail(pos, "BOOLEAN");
                None
            }
        }
    }

    fn symbol(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        match self.peek(pos) {
            Some(c) if is_initial(c) => {
                let mut end = pos + 1;
                while matches!(self.peek(end), Some(c) if is_subsequent(c)) {
                    end += 1;
                }
                let name = self.text_between(pos, end);
                self.token(new_symbol(&name), end)
            }
            _ => {
                self.fail(pos, "SYMBOL");
                None
            }
        }
    }

    fn character(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        let start = match self.literal(pos, "#\\", "CHARACTER") {
            Some(start) => start,
            None => return None,
        };
        let mut end = start;
        while matches!(self.peek(end), Some(c) if c.is_ascii_alphabetic()) {
            end += 1;
        }
        if end - start < 2 {
            end = match self.peek(start) {
                Some(c) if c != '\n' => start + 1,
                _ => {
                    self.fail(pos, "CHARACTER");
                    return None;
                }
            };
        }
        match new_char(&self.text_between(start, end)) {
            Ok(ch) => self.token(ch, end),
            Err(err) => {
                // An unknown character name aborts the whole parse.
                if self.fatal.is_none() {
                    self.fatal = Some(err);
                }
                None
            }
        }
    }

    fn string(&mut self, pos: usize) -> Option<(SchemeValue, usize)> {
        if self.peek(pos) != Some('"') {
            self.fail(pos, "STRING");
            return None;
        }
        let mut p = pos + 1;
        let mut content = String::new();
        loop {
            match self.peek(p) {
                Some('"') => return self.token(new_string(&content), p + 1),
                Some('\\') => match self.peek(p + 1) {
                    Some(c @ ('"' | '\\')) => {
                        content.push(c);
                        p += 2;
                    }
                    _ => break,
                },
                Some(c) => {
                    content.push(c);
                    p += 1;
                }
                None => break,
            }
        }
        self.fail(pos, "STRING");
        None
    }
}

fn prefix_label(prefix: &str) -> &'static str {
    match prefix {
        "'" => "\"'\"",
        "`" => "'`'",
        ",@" => "',@'",
        _ => "','",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_value;
    use crate::value::{eq, list_to_vec};

    fn parse_one(code: &str) -> SchemeValue {
        let mut forms = parse(code).unwrap();
        assert_eq!(forms.len(), 1, "expected one form in {:?}", code);
        forms.remove(0)
    }

    fn round_trip(code: &str) -> String {
        print_value(&parse_one(code))
    }

    #[test]
    fn parse_number() {
        assert!(matches!(parse_one("42"), SchemeValue::Int(42)));
        assert!(matches!(parse_one("-7"), SchemeValue::Int(-7)));
        assert!(matches!(parse_one("0"), SchemeValue::Int(0)));
        assert!(matches!(parse_one("1.5"), SchemeValue::Float(f) if f == 1.5));
        assert!(matches!(parse_one("-0.25"), SchemeValue::Float(f) if f == -0.25));
        assert!(matches!(parse_one(".5"), SchemeValue::Float(f) if f == 0.5));
        assert!(matches!(parse_one("3."), SchemeValue::Float(f) if f == 3.0));
    }

    #[test]
    fn parse_integer_beyond_exact_range() {
        assert!(matches!(parse_one("9223372036854775807"), SchemeValue::Int(i64::MAX)));
        assert!(matches!(parse_one("-9223372036854775808"), SchemeValue::Int(i64::MIN)));
        assert!(
            matches!(parse_one("9223372036854775808"), SchemeValue::Float(f) if f == 9223372036854775808.0)
        );
        assert!(
            matches!(parse_one("-100000000000000000000"), SchemeValue::Float(f) if f == -1e20)
        );
    }

    #[test]
    fn parse_symbol() {
        assert!(parse_one("hello").is_symbol("hello"));
        assert!(parse_one("call/cc").is_symbol("call/cc"));
        assert!(parse_one("-").is_symbol("-"));
        assert!(parse_one("set-car!").is_symbol("set-car!"));
        assert!(parse_one("a.b").is_symbol("a.b"));
        assert!(parse_one("...").is_symbol("..."));
    }

    #[test]
    fn parse_symbols_fold_case() {
        let forms = parse("Foo FOO foo").unwrap();
        assert!(eq(&forms[0], &forms[1]));
        assert!(eq(&forms[1], &forms[2]));
    }

    #[test]
    fn parse_string() {
        let value = parse_one(r#""hello world""#);
        assert!(matches!(&value, SchemeValue::Str(s) if *s.borrow() == "hello world"));
        let value = parse_one(r#""a\"b\\c""#);
        assert!(matches!(&value, SchemeValue::Str(s) if *s.borrow() == "a\"b\\c"));
    }

    #[test]
    fn parse_string_bad_escape() {
        let err = parse(r#""a\nb""#).unwrap_err();
        match err {
            SchemeError::Parse(e) => {
                assert_eq!((e.line, e.column), (1, 1));
                assert!(e.expected.contains(&"STRING".to_string()));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn parse_character() {
        let forms = parse("#\\a #\\space #\\NewLine #\\( #\\ ").unwrap();
        assert!(matches!(forms[0], SchemeValue::Char('a')));
        assert!(matches!(forms[1], SchemeValue::Char(' ')));
        assert!(matches!(forms[2], SchemeValue::Char('\n')));
        assert!(matches!(forms[3], SchemeValue::Char('(')));
        assert!(matches!(forms[4], SchemeValue::Char(' ')));
    }

    #[test]
    fn parse_unknown_character_name() {
        assert!(matches!(parse("#\\bogus"), Err(SchemeError::SyntaxError)));
    }

    #[test]
    fn parse_booleans_and_nil() {
        let forms = parse("#t #f ()").unwrap();
        assert!(matches!(forms[0], SchemeValue::Bool(true)));
        assert!(matches!(forms[1], SchemeValue::Bool(false)));
        assert!(forms[2].is_nil());
    }

    #[test]
    fn parse_simple_list() {
        let items = list_to_vec(&parse_one("(1 2 3)")).unwrap();
        assert_eq!(items.len(), 3);
        assert!(matches!(items[2], SchemeValue::Int(3)));
    }

    #[test]
    fn parse_dotted_pair() {
        assert_eq!(round_trip("(a . b)"), "(a . b)");
        assert_eq!(round_trip("(1 2 . 3)"), "(1 2 . 3)");
        assert_eq!(round_trip("(1 . (2 . (3 . ())))"), "(1 2 3)");
    }

    #[test]
    fn parse_vector() {
        assert_eq!(round_trip("#(1 symb 2)"), "#(1 symb 2)");
        assert_eq!(round_trip("#()"), "#()");
        assert!(matches!(parse_one("#( 1 #(2) )"), SchemeValue::Vector(v) if v.borrow().len() == 2));
    }

    #[test]
    fn parse_quoted() {
        assert_eq!(round_trip("'x"), "(quote x)");
        assert_eq!(round_trip("`(a ,b ,@c)"), "(quasiquote (a (unquote b) (unquote-splicing c)))");
        assert_eq!(round_trip("'()"), "(quote ())");
    }

    #[test]
    fn parse_round_trip_literals() {
        for text in [
            "42",
            "-3",
            "1.5",
            "12.0",
            r#""say \"hi\" \\ there""#,
            "#\\x",
            "#\\space",
            "#t",
            "#f",
            "()",
            "(1 2 3)",
            "(a . b)",
            "#(1 \"two\" #\\3)",
            "(quote x)",
            "(quasiquote (unquote-splicing y))",
        ] {
            assert_eq!(round_trip(text), text);
        }
    }

    #[test]
    fn parse_comments_and_whitespace() {
        let forms = parse("; leading comment\n  (a ; inner\n\t b)  ; trailing\n c").unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(print_value(&forms[0]), "(a b)");
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  ; only a comment").unwrap().is_empty());
    }

    #[test]
    fn parse_error_position() {
        match parse("(define x\n  (+ 1 2)") {
            Err(SchemeError::Parse(e)) => {
                assert_eq!(e.line, 2);
                assert_eq!(e.column, 10);
                assert!(e.expected.contains(&"')'".to_string()));
            }
            other => panic!("unexpected result {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn parse_lone_dot_is_error() {
        assert!(matches!(parse("."), Err(SchemeError::Parse(_))));
        assert!(matches!(parse("(a . b c)"), Err(SchemeError::Parse(_))));
        assert!(matches!(parse(")"), Err(SchemeError::Parse(_))));
    }
}
