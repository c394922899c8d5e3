//! Bind marker handling.
//!
//! Statements may reference bind values positionally (`?`, `$n` or `:n`,
//! depending on the backend) or by name as `:name`. Before execution named
//! markers are rewritten to the backend's positional placeholder and the
//! values are laid out in marker order. Either way the number of supplied
//! values must match the markers the statement actually contains.
//!
//! A small state machine skips string literals, quoted identifiers,
//! comments, PostgreSQL dollar-quoted bodies and `::` casts.

use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, Params, QueryParam};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Positional placeholder syntax of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` (MySQL, SQLite)
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `:1`, `:2`, ... (Oracle)
    Colon,
}

impl PlaceholderStyle {
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::MySql | BackendKind::Sqlite => Self::Question,
            BackendKind::PgSql => Self::Dollar,
            BackendKind::Oracle => Self::Colon,
        }
    }

    fn sigil(&self) -> u8 {
        match self {
            Self::Question => b'?',
            Self::Dollar => b'$',
            Self::Colon => b':',
        }
    }

    fn write(&self, buf: &mut String, position: usize) {
        buf.push(self.sigil() as char);
        if *self != Self::Question {
            buf.push_str(&position.to_string());
        }
    }
}

/// A bind marker found outside literals and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker<'a> {
    /// `:name`
    Named(&'a str),
    /// A bare `?`
    Anonymous,
    /// `?n`, `$n` or `:n`
    Numbered { sigil: u8, index: usize },
}

impl Marker<'_> {
    /// Whether this marker binds a positional value under `style`.
    fn is_positional_for(&self, style: PlaceholderStyle) -> bool {
        match self {
            Self::Named(_) => false,
            Self::Anonymous => style == PlaceholderStyle::Question,
            Self::Numbered { sigil, .. } => *sigil == style.sigil(),
        }
    }
}

#[derive(Clone, Copy)]
enum State<'a> {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backtick,
    LineComment,
    BlockComment,
    DollarQuoted(&'a str),
}

/// Walk `sql` and report every bind marker with its byte range.
fn scan_markers<'a>(
    sql: &'a str,
    mut visit: impl FnMut(Range<usize>, Marker<'a>) -> DbResult<()>,
) -> DbResult<()> {
    let bytes = sql.as_bytes();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backtick,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => state = State::LineComment,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    idx += 1;
                }
                b':' if bytes.get(idx + 1) == Some(&b':') => idx += 1,
                b':' if bytes.get(idx + 1).is_some_and(|c| is_ident_start(*c)) => {
                    let end = scan_while(bytes, idx + 1, is_ident_char);
                    visit(idx..end, Marker::Named(&sql[idx + 1..end]))?;
                    idx = end;
                    continue;
                }
                b'?' | b':' | b'$' if bytes.get(idx + 1).is_some_and(u8::is_ascii_digit) => {
                    if b == b'$' && idx > 0 && is_ident_char(bytes[idx - 1]) {
                        // `$` inside an identifier such as `a$1`
                        idx += 1;
                        continue;
                    }
                    let end = scan_while(bytes, idx + 1, |c| c.is_ascii_digit());
                    let index = sql[idx + 1..end].parse().map_err(|_| {
                        let marker = &sql[idx..end];
                        DbError::invalid_input(format!("Placeholder '{marker}' is out of range"))
                    })?;
                    visit(idx..end, Marker::Numbered { sigil: b, index })?;
                    idx = end;
                    continue;
                }
                b'?' => visit(idx..idx + 1, Marker::Anonymous)?,
                b'$' => {
                    if let Some(tag_end) = dollar_tag_end(bytes, idx) {
                        state = State::DollarQuoted(&sql[idx..=tag_end]);
                        idx = tag_end;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    state = State::Normal;
                }
            }
            State::Backtick => {
                if b == b'`' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = State::Normal;
                    idx += 1;
                }
            }
            State::DollarQuoted(tag) => {
                if bytes[idx..].starts_with(tag.as_bytes()) {
                    state = State::Normal;
                    idx += tag.len() - 1;
                }
            }
        }
        idx += 1;
    }
    Ok(())
}

/// Turn caller-supplied params into positional bind values for `kind`.
///
/// Positional params pass through untouched; named params rewrite `sql`.
/// Values that no marker would bind, and markers with no value, are
/// rejected with `InvalidInput` before anything reaches the backend.
pub fn resolve_params<'a>(
    sql: &'a str,
    params: &Params,
    kind: BackendKind,
) -> DbResult<(Cow<'a, str>, Vec<QueryParam>)> {
    let style = PlaceholderStyle::for_backend(kind);
    match params {
        Params::Positional(values) => {
            let expected = positional_slots(sql, style)?;
            if expected != values.len() {
                return Err(DbError::invalid_input(format!(
                    "Statement expects {expected} positional value(s), got {}",
                    values.len()
                )));
            }
            Ok((Cow::Borrowed(sql), values.clone()))
        }
        Params::Named(values) => bind_named(sql, values, style),
    }
}

/// Number of values the statement's positional markers consume. Bare `?`
/// takes the next slot after the highest seen so far, as SQLite numbers them.
fn positional_slots(sql: &str, style: PlaceholderStyle) -> DbResult<usize> {
    let mut slots = 0;
    scan_markers(sql, |_, marker| {
        match marker {
            Marker::Anonymous if marker.is_positional_for(style) => slots += 1,
            Marker::Numbered { index, .. } if marker.is_positional_for(style) => {
                slots = slots.max(index)
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(slots)
}

fn bind_named<'a>(
    sql: &'a str,
    values: &BTreeMap<String, QueryParam>,
    style: PlaceholderStyle,
) -> DbResult<(Cow<'a, str>, Vec<QueryParam>)> {
    let mut out = String::with_capacity(sql.len());
    let mut bound = Vec::new();
    let mut used = BTreeSet::new();
    // Start of the not yet copied segment
    let mut copied = 0;

    scan_markers(sql, |range, marker| match marker {
        Marker::Named(name) => {
            let value = values.get(name).ok_or_else(|| {
                DbError::invalid_input(format!("No value supplied for parameter ':{name}'"))
            })?;
            used.insert(name);
            out.push_str(&sql[copied..range.start]);
            bound.push(value.clone());
            style.write(&mut out, bound.len());
            copied = range.end;
            Ok(())
        }
        other if other.is_positional_for(style) => Err(DbError::invalid_input(format!(
            "Positional placeholder '{}' cannot be mixed with named parameters",
            &sql[range]
        ))),
        _ => Ok(()),
    })?;

    if let Some(unused) = values.keys().find(|k| !used.contains(k.as_str())) {
        return Err(DbError::invalid_input(format!(
            "Parameter ':{unused}' does not appear in the statement"
        )));
    }

    if bound.is_empty() {
        return Ok((Cow::Borrowed(sql), bound));
    }
    out.push_str(&sql[copied..]);
    Ok((Cow::Owned(out), bound))
}

/// End index of a `$tag$` opener starting at `start`, if there is one.
/// Tags cannot start with a digit, which keeps `$1` a placeholder.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let end = scan_while(bytes, start + 1, is_ident_char);
    (bytes.get(end) == Some(&b'$')).then_some(end)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn scan_while(bytes: &[u8], start: usize, keep: impl Fn(u8) -> bool) -> usize {
    let mut idx = start;
    while idx < bytes.len() && keep(bytes[idx]) {
        idx += 1;
    }
    idx
}
