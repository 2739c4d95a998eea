//! Tokenizer and list reader for the module text format.

use std::iter::Peekable;
use std::str::Chars;

use chipdoc_types::Value;

use super::ModuleError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sexp {
    List { items: Vec<Sexp>, line: usize },
    Atom { text: String, line: usize },
    Str { text: String, line: usize },
    /// `#"..."`, a key that cannot be written as a bare atom.
    QuotedKey { text: String, line: usize },
}

impl Sexp {
    pub(crate) fn line(&self) -> usize {
        match self {
            Sexp::List { line, .. }
            | Sexp::Atom { line, .. }
            | Sexp::Str { line, .. }
            | Sexp::QuotedKey { line, .. } => *line,
        }
    }

    /// Keywords are atoms ending in `:`, such as `id:`.
    pub(crate) fn keyword(&self) -> Option<&str> {
        match self {
            Sexp::Atom { text, .. } => text.strip_suffix(':'),
            _ => None,
        }
    }

    /// The literal value of an atom, string or quoted key.
    pub(crate) fn literal(&self) -> Option<Value> {
        match self {
            Sexp::Atom { text, .. } => Some(Value::parse_bare(text)),
            Sexp::Str { text, .. } => Some(Value::Text(text.clone())),
            Sexp::QuotedKey { text, .. } => Some(Value::Key(text.clone())),
            Sexp::List { .. } => None,
        }
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> ModuleError {
    ModuleError::Parse {
        line,
        message: message.into(),
    }
}

/// Read every top-level form in `text`. `;` starts a comment that runs to
/// the end of the line.
pub(crate) fn parse(text: &str) -> Result<Vec<Sexp>, ModuleError> {
    // Open lists, innermost last. The bottom entry collects top-level forms.
    let mut stack: Vec<(usize, Vec<Sexp>)> = vec![(0, Vec::new())];
    let mut line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            ';' => {
                while chars.next_if(|&n| n != '\n').is_some() {}
            }
            '(' => stack.push((line, Vec::new())),
            ')' => {
                if stack.len() == 1 {
                    return Err(parse_error(line, "unexpected ')'"));
                }
                if let Some((open, items)) = stack.pop() {
                    push(&mut stack, Sexp::List { items, line: open });
                }
            }
            '"' => {
                let start = line;
                let text = read_string(&mut chars, &mut line)?;
                push(&mut stack, Sexp::Str { text, line: start });
            }
            '#' if chars.peek() == Some(&'"') => {
                let start = line;
                chars.next();
                let text = read_string(&mut chars, &mut line)?;
                push(&mut stack, Sexp::QuotedKey { text, line: start });
            }
            c => {
                let mut text = String::from(c);
                while let Some(n) = chars.next_if(|&n| !n.is_whitespace() && !matches!(n, '(' | ')' | '"' | ';')) {
                    text.push(n);
                }
                push(&mut stack, Sexp::Atom { text, line });
            }
        }
    }

    if stack.len() > 1 {
        let open = stack.last().map(|(l, _)| *l).unwrap_or(line);
        return Err(parse_error(open, "unclosed '('"));
    }
    Ok(stack.pop().map(|(_, forms)| forms).unwrap_or_default())
}

/// Body of a string whose opening quote was already consumed.
fn read_string(chars: &mut Peekable<Chars<'_>>, line: &mut usize) -> Result<String, ModuleError> {
    let start = *line;
    let mut text = String::new();
    loop {
        match chars.next() {
            None => return Err(parse_error(start, "unterminated string")),
            Some('"') => return Ok(text),
            Some('\\') => match chars.next() {
                Some('n') => text.push('\n'),
                Some(c @ ('"' | '\\')) => text.push(c),
                Some(c) => return Err(parse_error(*line, format!("unknown escape '\\{}'", c))),
                None => return Err(parse_error(start, "unterminated string")),
            },
            Some(c) => {
                if c == '\n' {
                    *line += 1;
                }
                text.push(c);
            }
        }
    }
}

fn push(stack: &mut [(usize, Vec<Sexp>)], sexp: Sexp) {
    if let Some((_, items)) = stack.last_mut() {
        items.push(sexp);
    }
}
