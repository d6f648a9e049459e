//! S-expression reader for declaration lines.
//!
//! Declarations (`type`, `func` headers, `global`, `memory`, `export`) are
//! single lines of nested lists. A `func` header is the one declaration that
//! is left open: its body follows on later lines. The reader therefore works
//! on a fragment of a line and reports where an unmatched `)` closed the
//! enclosing construct, if it did.
//!
//! Comments must be stripped before reading.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// An error encountered while reading S-expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadError {
    pub message: String,
    pub offset: usize,
}

impl ReadError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at column {}", self.message, self.offset + 1)
    }
}

impl std::error::Error for ReadError {}

/// An S-expression: an atom, a quoted string, or a parenthesised list.
///
/// Every node records the byte offset where it starts so that callers can
/// slice the remainder of a line from any item.
#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    Atom { text: String, offset: usize },
    Str { value: String, offset: usize },
    List { items: Vec<SExpr>, offset: usize },
}

impl SExpr {
    pub fn offset(&self) -> usize {
        match self {
            SExpr::Atom { offset, .. } | SExpr::Str { offset, .. } | SExpr::List { offset, .. } => *offset,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SExpr::Str { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List { items, .. } => Some(items),
            _ => None,
        }
    }

    /// The leading keyword of a list, e.g. `param` for `(param i32)`
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_atom()
    }

    /// The items of a list after its leading keyword
    pub fn tail(&self) -> &[SExpr] {
        match self.as_list() {
            Some([_, rest @ ..]) => rest,
            _ => &[],
        }
    }
}

/// Items read from a line fragment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub items: Vec<SExpr>,
    /// Offset of an unmatched `)` that ended the fragment, if any.
    pub close: Option<usize>,
}

/// Read items from `text` until it ends or an unmatched `)` is found.
pub fn read(text: &str) -> Result<Fragment, ReadError> {
    let mut chars = text.char_indices().peekable();
    let mut fragment = Fragment::default();
    loop {
        match read_item(text, &mut chars)? {
            Next::Item(item) => fragment.items.push(item),
            Next::Close(offset) => {
                fragment.close = Some(offset);
                return Ok(fragment);
            }
            Next::Eof => return Ok(fragment),
        }
    }
}

enum Next {
    Item(SExpr),
    Close(usize),
    Eof,
}

fn read_item(text: &str, chars: &mut Peekable<CharIndices<'_>>) -> Result<Next, ReadError> {
    while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

    let Some((offset, c)) = chars.next() else {
        return Ok(Next::Eof);
    };

    match c {
        ')' => Ok(Next::Close(offset)),
        '(' => {
            let mut items = Vec::new();
            loop {
                match read_item(text, chars)? {
                    Next::Item(item) => items.push(item),
                    Next::Close(_) => return Ok(Next::Item(SExpr::List { items, offset })),
                    Next::Eof => return Err(ReadError::new("unclosed list", offset)),
                }
            }
        }
        '"' => {
            let mut value = String::new();
            loop {
                match chars.next() {
                    Some((_, '"')) => return Ok(Next::Item(SExpr::Str { value, offset })),
                    Some((_, '\\')) => match chars.next() {
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, escaped)) => value.push(escaped),
                        None => return Err(ReadError::new("unterminated string", offset)),
                    },
                    Some((_, c)) => value.push(c),
                    None => return Err(ReadError::new("unterminated string", offset)),
                }
            }
        }
        _ => {
            let mut end = offset + c.len_utf8();
            while let Some((i, c)) = chars.next_if(|(_, c)| !c.is_whitespace() && !matches!(*c, '(' | ')' | '"')) {
                end = i + c.len_utf8();
            }
            Ok(Next::Item(SExpr::Atom {
                text: text[offset..end].to_string(),
                offset,
            }))
        }
    }
}
