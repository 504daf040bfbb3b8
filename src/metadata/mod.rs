//! The textual header dictionary embedded in an NPY file, e.g.
//! `{'descr': '<f4', 'fortran_order': False, 'shape': (2,3,), }`.

pub mod descr;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::trace;

use crate::error::{NpyError, NpyResult};
use crate::types::{ElementType, Shape};

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub dtype: ElementType,
    pub fortran_order: bool,
    pub shape: Shape,
}

impl Header {
    /// Row-major header for an array of `dtype` and `shape`.
    pub fn new(dtype: ElementType, shape: Shape) -> Self {
        Self {
            dtype,
            fortran_order: false,
            shape,
        }
    }

    /// Render the canonical dictionary text (no padding or newline).
    pub fn render(&self) -> NpyResult<String> {
        let code = descr::canonical_descr(self.dtype)?;
        let fortran_order = if self.fortran_order { "True" } else { "False" };
        Ok(format!(
            "{{'descr': '<{code}', 'fortran_order': {fortran_order}, 'shape': {}, }}",
            render_shape(&self.shape)
        ))
    }

    /// Parse dictionary text as found in a file. Unknown keys are ignored and
    /// a missing `fortran_order` means row-major.
    pub fn parse(text: &str) -> NpyResult<Self> {
        let entries = parse_dict(text)?;

        let fortran_order = match entries.get("fortran_order").map(|v| v.as_str()) {
            None | Some("False") => false,
            Some("True") => true,
            Some(other) => {
                return Err(NpyError::Format(format!("unknown fortran_order {other}")));
            }
        };

        let dtype = match entries.get("descr") {
            Some(token) => descr::parse_descr(token)?,
            None => return Err(NpyError::Format("no descr in header".into())),
        };

        let shape = match entries.get("shape") {
            Some(token) => parse_shape(token)?,
            None => return Err(NpyError::Format("no shape in header".into())),
        };

        trace!(%dtype, fortran_order, %shape, "parsed npy header");
        Ok(Self {
            dtype,
            fortran_order,
            shape,
        })
    }
}

impl FromStr for Header {
    type Err = NpyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Header::parse(s)
    }
}

/// `()`, `(n,)` or `(d0,d1,...,)`; the trailing comma is always present.
fn render_shape(shape: &Shape) -> String {
    if shape.rank() == 0 {
        return "()".to_string();
    }
    let dims: Vec<String> = shape.dims().iter().map(|d| d.to_string()).collect();
    format!("({},)", dims.join(","))
}

fn parse_shape(token: &str) -> NpyResult<Shape> {
    let inner = token.trim().trim_start_matches('(').trim_end_matches(')').trim();
    if inner.is_empty() {
        return Ok(Shape::scalar());
    }
    // Only a single trailing comma may leave an empty token.
    let inner = inner.strip_suffix(',').unwrap_or(inner);
    let mut dims = Vec::new();
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(NpyError::Format(format!("empty shape dimension in {token}")));
        }
        // Python 2 era files write longs as `3L`.
        let digits = part.strip_suffix('L').unwrap_or(part);
        let dim = digits
            .parse::<usize>()
            .map_err(|_| NpyError::Format(format!("invalid shape dimension {part}")))?;
        dims.push(dim);
    }
    Ok(Shape(dims))
}

// ---------------------------------------------------------------------------
// Dictionary scanner
// ---------------------------------------------------------------------------

/// Split `{'key': value, ...}` into raw key/value strings. Quoted values lose
/// their quotes; tuple and list values keep their brackets.
fn parse_dict(text: &str) -> NpyResult<HashMap<String, String>> {
    let body = text.trim();
    let body = body.strip_prefix('{').unwrap_or(body);
    let body = body.trim_end();
    let body = body.strip_suffix('}').unwrap_or(body);

    let mut scanner = Scanner { rest: body };
    let mut entries = HashMap::new();
    loop {
        scanner.skip_separators();
        if scanner.is_done() {
            break;
        }
        let key = scanner.quoted()?;
        scanner.skip_whitespace();
        scanner.expect(':')?;
        scanner.skip_whitespace();
        let value = scanner.value()?;
        entries.insert(key.to_string(), value.to_string());
    }

    if entries.is_empty() {
        return Err(NpyError::Format(format!("unable to parse header {text:?}")));
    }
    Ok(entries)
}

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn is_done(&self) -> bool {
        self.rest.is_empty()
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn skip_separators(&mut self) {
        self.rest = self
            .rest
            .trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }

    fn expect(&mut self, c: char) -> NpyResult<()> {
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                Ok(())
            }
            None => Err(NpyError::Format(format!(
                "expected '{c}' in header near {:?}",
                self.rest
            ))),
        }
    }

    /// A `'...'` or `"..."` literal, returned without its quotes.
    fn quoted(&mut self) -> NpyResult<&'a str> {
        let quote = match self.rest.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => {
                return Err(NpyError::Format(format!(
                    "expected quoted key in header near {:?}",
                    self.rest
                )));
            }
        };
        self.delimited(quote, quote)
    }

    /// Consume from an opening delimiter through its closing one and return
    /// what lies between them.
    fn delimited(&mut self, open: char, close: char) -> NpyResult<&'a str> {
        let body = &self.rest[open.len_utf8()..];
        let end = body.find(close).ok_or_else(|| {
            NpyError::Format(format!("unterminated {open}...{close} in header"))
        })?;
        self.rest = &body[end + close.len_utf8()..];
        Ok(&body[..end])
    }

    fn value(&mut self) -> NpyResult<&'a str> {
        let start = self.rest;
        match self.rest.chars().next() {
            Some('\'' | '"') => self.quoted(),
            Some(open @ ('(' | '[')) => {
                let close = if open == '(' { ')' } else { ']' };
                let inner = self.delimited(open, close)?;
                // keep the brackets
                Ok(&start[..inner.len() + open.len_utf8() + close.len_utf8()])
            }
            Some(_) => {
                let end = self.rest.find(',').unwrap_or(self.rest.len());
                let token = &self.rest[..end];
                self.rest = &self.rest[end..];
                Ok(token.trim())
            }
            None => Err(NpyError::Format("missing value in header".into())),
        }
    }
}
