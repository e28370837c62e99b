//! Line-oriented key/value grammar
//!
//! Shared by the `secret-tool search` output parser and the macOS shadow file.
//!
//! ```text
//! # comment
//! [/org/freedesktop/secrets/collection/login/7]
//! label = credbroker:svcA
//! attribute.id = svcA
//! "quoted key" = "quoted \"value\""
//! ```
//!
//! Blank lines and `#` comments are skipped, `[...]` opens a new record and
//! every other line must be `key = value` or `key = "value"`. Anything else is
//! a [`ParseError`]. Errors carry the line number only: tool output may hold
//! secret material, so the offending text is never echoed back.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A line that does not match the grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// What was wrong with the line
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// One `[section]` worth of key/value pairs
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KvRecord {
    /// Section header, `None` for pairs before the first header
    pub section: Option<String>,
    /// Pairs in input order
    pub pairs: Vec<(String, String)>,
}

impl KvRecord {
    /// First value stored under `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// Values may be secrets (`secret = ...` in secret-tool output): keys only.
impl fmt::Debug for KvRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvRecord")
            .field("section", &self.section)
            .field("keys", &self.pairs.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

enum Line {
    Blank,
    Section(String),
    Pair(String, String),
}

/// Parse input into records split on `[section]` headers.
pub fn parse_records(input: &str) -> Result<Vec<KvRecord>, ParseError> {
    collect_records(input, parse_line)
}

/// Like [`parse_records`], for tool output that prints values raw.
///
/// Every line must be blank, a `[section]` header or `key = value`; the value
/// is everything after the first ` = `, taken verbatim (quotes and
/// backslashes included).
pub fn parse_verbatim_records(input: &str) -> Result<Vec<KvRecord>, ParseError> {
    collect_records(input, parse_verbatim_line)
}

fn collect_records(
    input: &str,
    parse: fn(&str, usize) -> Result<Line, ParseError>,
) -> Result<Vec<KvRecord>, ParseError> {
    let mut records: Vec<KvRecord> = Vec::new();

    for (idx, raw) in input.lines().enumerate() {
        match parse(raw, idx + 1)? {
            Line::Blank => {}
            Line::Section(name) => records.push(KvRecord {
                section: Some(name),
                pairs: Vec::new(),
            }),
            Line::Pair(key, value) => {
                if records.is_empty() {
                    records.push(KvRecord::default());
                }
                if let Some(record) = records.last_mut() {
                    record.pairs.push((key, value));
                }
            }
        }
    }

    Ok(records)
}

/// Parse a flat mapping. Section headers are rejected; a repeated key keeps
/// its last value.
pub fn parse_map(input: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut map = BTreeMap::new();

    for (idx, raw) in input.lines().enumerate() {
        match parse_line(raw, idx + 1)? {
            Line::Blank => {}
            Line::Section(_) => {
                return Err(ParseError::new(idx + 1, "section headers are not allowed"))
            }
            Line::Pair(key, value) => {
                map.insert(key, value);
            }
        }
    }

    Ok(map)
}

/// Render a mapping with every key and value quoted.
#[must_use]
pub fn write_map(map: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(&quote(key));
        out.push_str(" = ");
        out.push_str(&quote(value));
        out.push('\n');
    }
    out
}

/// Quote a string so it reads back verbatim.
#[must_use]
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn parse_line(raw: &str, line: usize) -> Result<Line, ParseError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(Line::Blank);
    }

    if let Some(inner) = trimmed.strip_prefix('[') {
        let name = inner
            .strip_suffix(']')
            .ok_or_else(|| ParseError::new(line, "unterminated section header"))?;
        return Ok(Line::Section(name.trim().to_string()));
    }

    let (key, rest) = if trimmed.starts_with('"') {
        parse_quoted(trimmed, line)?
    } else {
        let eq = trimmed
            .find('=')
            .ok_or_else(|| ParseError::new(line, "expected `key = value`"))?;
        let key = trimmed[..eq].trim_end();
        if key.is_empty() || key.contains(char::is_whitespace) || key.contains('"') {
            return Err(ParseError::new(line, "invalid key"));
        }
        (key.to_string(), &trimmed[eq..])
    };

    let rest = rest
        .trim_start()
        .strip_prefix('=')
        .ok_or_else(|| ParseError::new(line, "expected `=` after key"))?
        .trim_start();

    let value = if rest.starts_with('"') {
        let (value, tail) = parse_quoted(rest, line)?;
        if !tail.trim().is_empty() {
            return Err(ParseError::new(line, "trailing characters after quoted value"));
        }
        value
    } else {
        rest.trim_end().to_string()
    };

    Ok(Line::Pair(key, value))
}

fn parse_verbatim_line(raw: &str, line: usize) -> Result<Line, ParseError> {
    if raw.trim().is_empty() {
        return Ok(Line::Blank);
    }

    if let Some(inner) = raw.strip_prefix('[') {
        let name = inner
            .strip_suffix(']')
            .ok_or_else(|| ParseError::new(line, "unterminated section header"))?;
        return Ok(Line::Section(name.to_string()));
    }

    let (key, value) = match raw.split_once(" = ") {
        Some(pair) => pair,
        None => raw
            .strip_suffix(" =")
            .map(|key| (key, ""))
            .ok_or_else(|| ParseError::new(line, "expected `key = value`"))?,
    };
    if key.is_empty() || key.contains(char::is_whitespace) {
        return Err(ParseError::new(line, "invalid key"));
    }

    Ok(Line::Pair(key.to_string(), value.to_string()))
}

/// Parse a leading quoted string, returning it and the remaining input.
fn parse_quoted(s: &str, line: usize) -> Result<(String, &str), ParseError> {
    let mut out = String::new();
    let mut chars = s.char_indices().skip(1);

    while let Some((pos, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &s[pos + 1..])),
            '\\' => match chars.next() {
                Some((_, '\\')) => out.push('\\'),
                Some((_, '"')) => out.push('"'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some(_) => return Err(ParseError::new(line, "unknown escape sequence")),
                None => break,
            },
            other => out.push(other),
        }
    }

    Err(ParseError::new(line, "unterminated quoted string"))
}
