// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Literal masking
//!
//! Quoted strings and backtick identifiers are replaced by positional
//! placeholders before any rewrite rule looks at a statement, and restored
//! verbatim afterwards. Rewrite rules therefore never see literal content.
//!
//! Placeholders are `\u{E000}<index>\u{E001}`: private-use code points that do
//! not occur in statements and never match word or identifier patterns.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take},
    character::complete::char,
    combinator::{map, recognize},
    sequence::pair,
    IResult,
};

pub(crate) const OPEN: char = '\u{E000}';
pub(crate) const CLOSE: char = '\u{E001}';

/// Regex fragment matching one placeholder
pub(crate) const PLACEHOLDER_PATTERN: &str = "\u{E000}[0-9]+\u{E001}";

/// A statement with its literals masked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedStatement {
    text: String,
    literals: Vec<String>,
}

impl MaskedStatement {
    /// Statement text with placeholders in place of literals
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn literal_count(&self) -> usize {
        self.literals.len()
    }

    /// The literal (quotes included) a token stands for, if the token is
    /// exactly one placeholder
    pub fn literal_for(&self, token: &str) -> Option<&str> {
        let index = token.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
        let index: usize = index.parse().ok()?;
        self.literals.get(index).map(String::as_str)
    }

    /// Put the literals back into a (possibly rewritten) masked text
    pub fn restore(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.literals.len() * 8);
        let mut rest = text;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len_utf8()..];
            let restored = after_open.find(CLOSE).and_then(|end| {
                let literal = after_open[..end]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.literals.get(i))?;
                Some((literal, end))
            });
            match restored {
                Some((literal, end)) => {
                    out.push_str(literal);
                    rest = &after_open[end + CLOSE.len_utf8()..];
                }
                None => {
                    out.push(OPEN);
                    rest = after_open;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

enum Piece<'a> {
    Literal(&'a str),
    Text(&'a str),
}

/// Mask every quoted literal in `statement`
pub fn mask_literals(statement: &str) -> MaskedStatement {
    let mut text = String::with_capacity(statement.len());
    let mut literals = Vec::new();
    let mut rest = statement;

    while !rest.is_empty() {
        match piece(rest) {
            Ok((remaining, Piece::Literal(literal))) => {
                text.push(OPEN);
                text.push_str(&literals.len().to_string());
                text.push(CLOSE);
                literals.push(literal.to_string());
                rest = remaining;
            }
            Ok((remaining, Piece::Text(run))) => {
                text.push_str(run);
                rest = remaining;
            }
            // `take(1)` only fails on empty input, which the loop excludes
            Err(_) => break,
        }
    }

    MaskedStatement { text, literals }
}

/// Strip the quotes of a literal and undo doubled-quote and backslash escapes
pub fn unquote(literal: &str) -> String {
    let mut chars = literal.chars();
    let quote = match chars.next() {
        Some(q @ ('\'' | '"' | '`')) => q,
        _ => return literal.to_string(),
    };
    let inner = match chars.as_str().strip_suffix(quote) {
        Some(inner) => inner,
        None => return literal.to_string(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut iter = inner.chars().peekable();
    while let Some(c) = iter.next() {
        if c == '\\' && quote != '`' {
            if let Some(next) = iter.next() {
                out.push(next);
            }
        } else if c == quote && iter.peek() == Some(&quote) {
            iter.next();
            out.push(quote);
        } else {
            out.push(c);
        }
    }
    out
}

fn piece(input: &str) -> IResult<&str, Piece<'_>> {
    alt((
        map(literal, Piece::Literal),
        map(is_not("'\"`"), Piece::Text),
        // an unterminated quote is plain text
        map(take(1usize), Piece::Text),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, &str> {
    alt((quoted('\''), quoted('"'), quoted('`')))(input)
}

fn quoted(quote: char) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input: &str| {
        recognize(pair(
            char(quote),
            pair(quoted_content(quote), char(quote)),
        ))(input)
    }
}

/// Content up to the closing quote. Doubled quotes are escapes; strings also
/// honour backslash escapes, backtick identifiers do not.
fn quoted_content(quote: char) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input: &str| {
        let bytes = input.as_bytes();
        let quote_byte = quote as u8;
        let mut pos = 0;

        while pos < bytes.len() {
            if bytes[pos] == b'\\' && quote != '`' && pos + 1 < bytes.len() {
                pos += 2;
            } else if bytes[pos] == quote_byte {
                if pos + 1 < bytes.len() && bytes[pos + 1] == quote_byte {
                    pos += 2;
                } else {
                    break;
                }
            } else {
                pos += 1;
            }
        }

        // A backslash escape may have stepped over the last byte
        let pos = pos.min(bytes.len());
        Ok((&input[pos..], &input[..pos]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_and_restore_roundtrip() {
        let statement = "CREATE (:Person {name: 'O''Brien', note: \"say \\\"hi\\\"\"}) RETURN `odd``name`";
        let masked = mask_literals(statement);
        assert_eq!(masked.literal_count(), 3);
        assert!(!masked.text().contains('\''));
        assert!(!masked.text().contains('`'));
        assert_eq!(masked.restore(masked.text()), statement);
    }

    #[test]
    fn test_literal_for_placeholder() {
        let masked = mask_literals("RETURN 'now'");
        let token = format!("{}0{}", OPEN, CLOSE);
        assert_eq!(masked.literal_for(&token), Some("'now'"));
        assert_eq!(masked.literal_for("0"), None);
    }

    #[test]
    fn test_unterminated_quote_is_plain_text() {
        let masked = mask_literals("RETURN 'abc");
        assert_eq!(masked.literal_count(), 0);
        assert_eq!(masked.text(), "RETURN 'abc");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'O''Brien'"), "O'Brien");
        assert_eq!(unquote("\"a\\\"b\""), "a\"b");
        assert_eq!(unquote("`we``ird`"), "we`ird");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn test_multibyte_content_is_preserved() {
        let statement = "CREATE (:City {name: '東京'})";
        let masked = mask_literals(statement);
        assert_eq!(masked.restore(masked.text()), statement);
    }
}
