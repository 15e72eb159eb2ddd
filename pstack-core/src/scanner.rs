//! Scanner for the `pstack` language.
//!
//! Turns one **logical line** of text into fully-formed [`Value`] tokens.
//! A logical line is what the [`reader`](crate::reader) assembles: one
//! physical line, or several joined while a procedure body or string was
//! still open.
//!
//! # Token production rules
//!
//! | Input            | Token produced                                  |
//! |------------------|-------------------------------------------------|
//! | `42`, `-7`       | `Integer`                                       |
//! | `3.14`, `.5`     | `Real`                                          |
//! | `true`, `false`  | `Boolean`                                       |
//! | `(text)`         | read-only `String` (balanced parens, no escapes)|
//! | `/name`          | literal (non-executable) `Name`                 |
//! | `name`           | executable `Name`                               |
//! | `[1 2 3]`        | `Array`, elements parsed eagerly                |
//! | `{dup mul}`      | `Procedure`, body kept as **unparsed** lines    |
//! | `% comment`      | skipped to end of physical line                 |

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::value::{Name, Procedure, Value};

/// Scan a logical line into its tokens.
pub fn scan_line(line: &str) -> EvalResult<Vec<Value>> {
    Scanner::new(line).scan_all()
}

/// Characters that terminate a bare word.
const fn is_delimiter(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '/' | '%')
}

struct Scanner {
    src: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(line: &str) -> Self {
        Self {
            src: line.chars().collect(),
            pos: 0,
        }
    }

    fn scan_all(&mut self) -> EvalResult<Vec<Value>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    /// Skip whitespace and `%` comments (a comment runs to the end of the
    /// physical line it started on).
    fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '%' {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Scan the next token, or `None` at end of input.
    fn next_token(&mut self) -> EvalResult<Option<Value>> {
        self.skip_blanks();
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '(' => self.scan_string()?,
            '{' => self.scan_procedure()?,
            '[' => self.scan_array()?,
            '/' => {
                self.pos += 1;
                Value::Name(Name::literal(&self.scan_word()))
            }
            ')' | '}' | ']' => {
                return Err(EvalError::new(
                    ErrorKind::SyntaxError,
                    format!("unmatched `{c}`"),
                ));
            }
            _ => classify_word(&self.scan_word()),
        };
        Ok(Some(token))
    }

    /// Read a bare word up to whitespace or a delimiter.
    fn scan_word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || is_delimiter(c) {
                break;
            }
            self.pos += 1;
        }
        self.src[start..self.pos].iter().collect()
    }

    /// Scan a `(...)` string literal. Parens nest; there are no escapes.
    fn scan_string(&mut self) -> EvalResult<Value> {
        self.pos += 1; // consume `(`
        let mut depth = 1usize;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '(' => {
                    depth += 1;
                    text.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Value::string_literal(&text));
                    }
                    text.push(c);
                }
                _ => text.push(c),
            }
        }
        Err(EvalError::new(ErrorKind::SyntaxError, "unterminated string"))
    }

    /// Scan a `{...}` procedure body, keeping the inner text **unparsed**.
    ///
    /// Brace depth ignores braces inside strings and comments. The captured
    /// text is split into per-line bodies; each runs through the scanner
    /// again on every execution.
    fn scan_procedure(&mut self) -> EvalResult<Value> {
        self.pos += 1; // consume `{`
        let start = self.pos;
        let mut depth = 1usize;
        let mut string_depth = 0usize;
        while let Some(c) = self.peek() {
            if string_depth > 0 {
                match c {
                    '(' => string_depth += 1,
                    ')' => string_depth -= 1,
                    _ => {}
                }
                self.pos += 1;
                continue;
            }
            match c {
                '(' => string_depth = 1,
                '%' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.pos += 1;
                    }
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body: String = self.src[start..self.pos].iter().collect();
                        self.pos += 1; // consume `}`
                        let lines = body
                            .lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(str::to_owned)
                            .collect();
                        return Ok(Value::Procedure(Rc::new(Procedure::new(lines))));
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(EvalError::new(
            ErrorKind::SyntaxError,
            "unterminated procedure body",
        ))
    }

    /// Scan a `[...]` array literal, parsing the elements eagerly.
    fn scan_array(&mut self) -> EvalResult<Value> {
        self.pos += 1; // consume `[`
        let mut elements = Vec::new();
        loop {
            self.skip_blanks();
            match self.peek() {
                None => {
                    return Err(EvalError::new(ErrorKind::SyntaxError, "unterminated array"));
                }
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(Rc::new(RefCell::new(elements))));
                }
                Some(_) => match self.next_token()? {
                    Some(v) => elements.push(v),
                    None => {
                        return Err(EvalError::new(ErrorKind::SyntaxError, "unterminated array"));
                    }
                },
            }
        }
    }
}

/// Classify a bare word: boolean literal, number, or executable name.
fn classify_word(word: &str) -> Value {
    match word {
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        _ => {}
    }
    if looks_numeric(word) {
        if let Ok(i) = word.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(r) = word.parse::<f64>() {
            return Value::Real(r);
        }
    }
    Value::Name(Name::executable(word))
}

/// Whether a word should be tried as a number. Guards against words like
/// `inf` or `nan` that `f64::from_str` would happily accept.
fn looks_numeric(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-' | '.') => word.chars().any(|c| c.is_ascii_digit()),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Type;

    fn scan(line: &str) -> Vec<Value> {
        scan_line(line).unwrap()
    }

    #[test]
    fn scan_integers() {
        assert_eq!(scan("42"), vec![Value::Integer(42)]);
        assert_eq!(scan("-7"), vec![Value::Integer(-7)]);
        assert_eq!(scan("+3"), vec![Value::Integer(3)]);
    }

    #[test]
    fn scan_reals() {
        assert_eq!(scan("3.14"), vec![Value::Real(3.14)]);
        assert_eq!(scan(".5"), vec![Value::Real(0.5)]);
        assert_eq!(scan("-0.25"), vec![Value::Real(-0.25)]);
    }

    #[test]
    fn scan_booleans() {
        assert_eq!(scan("true false"), vec![Value::Boolean(true), Value::Boolean(false)]);
    }

    #[test]
    fn word_resembling_number_stays_a_name() {
        // `inf` and `nan` parse as f64 but must scan as names.
        let tokens = scan("inf nan e10");
        assert!(tokens.iter().all(|t| t.ty() == Type::Name));
    }

    #[test]
    fn scan_names() {
        let tokens = scan("dup /x");
        let Value::Name(exec) = &tokens[0] else {
            panic!("expected name");
        };
        assert!(exec.is_executable());
        assert_eq!(exec.text(), "dup");
        let Value::Name(lit) = &tokens[1] else {
            panic!("expected name");
        };
        assert!(!lit.is_executable());
        assert_eq!(lit.text(), "x");
    }

    #[test]
    fn scan_string_with_nested_parens() {
        let tokens = scan("(a (b) c)");
        let Value::String(s) = &tokens[0] else {
            panic!("expected string");
        };
        assert_eq!(s.borrow().to_text(), "a (b) c");
        assert!(!s.borrow().writable, "literals are read-only");
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = scan_line("(abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn scan_array_eagerly() {
        let tokens = scan("[1 2.5 /x]");
        let Value::Array(a) = &tokens[0] else {
            panic!("expected array");
        };
        let a = a.borrow();
        assert_eq!(a.len(), 3);
        assert_eq!(a[0], Value::Integer(1));
        assert_eq!(a[1], Value::Real(2.5));
        assert_eq!(a[2].ty(), Type::Name);
    }

    #[test]
    fn unmatched_bracket_is_syntax_error() {
        assert_eq!(scan_line("1 2]").unwrap_err().kind, ErrorKind::SyntaxError);
        assert_eq!(scan_line("[1 2").unwrap_err().kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn procedure_body_stays_unparsed() {
        let tokens = scan("{dup mul}");
        let Value::Procedure(p) = &tokens[0] else {
            panic!("expected procedure");
        };
        assert_eq!(p.lines, vec!["dup mul".to_owned()]);
    }

    #[test]
    fn multi_line_procedure_keeps_lines_separate() {
        let tokens = scan("{1 add\n2 mul\n}");
        let Value::Procedure(p) = &tokens[0] else {
            panic!("expected procedure");
        };
        assert_eq!(p.lines, vec!["1 add".to_owned(), "2 mul".to_owned()]);
    }

    #[test]
    fn nested_procedure_text_is_preserved() {
        let tokens = scan("{true {1} if}");
        let Value::Procedure(p) = &tokens[0] else {
            panic!("expected procedure");
        };
        assert_eq!(p.lines, vec!["true {1} if".to_owned()]);
    }

    #[test]
    fn braces_inside_strings_do_not_nest() {
        let tokens = scan("{(})}");
        let Value::Procedure(p) = &tokens[0] else {
            panic!("expected procedure");
        };
        assert_eq!(p.lines, vec!["(})".to_owned()]);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(scan("1 % 2 3"), vec![Value::Integer(1)]);
        assert!(scan("% only a comment").is_empty());
    }

    #[test]
    fn adjacent_tokens_split_on_delimiters() {
        let tokens = scan("/x(hi)");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].ty(), Type::Name);
        assert_eq!(tokens[1].ty(), Type::String);
    }

    #[test]
    fn blank_line_scans_to_nothing() {
        assert!(scan("   ").is_empty());
        assert!(scan("").is_empty());
    }
}
