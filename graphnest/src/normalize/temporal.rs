// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Date/time rewrite rule
//!
//! The engine has no `datetime()`/`localdatetime()` constructors and no
//! `DATETIME` type; it has `TIMESTAMP`, `CAST(x AS TIMESTAMP)` and
//! `current_timestamp()`. Rules run on masked text.

use super::literals::{unquote, MaskedStatement};
use once_cell::sync::Lazy;
use regex::Regex;

static CONSTRUCTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:local)?datetime\s*\(([^()]*)\)").expect("valid constructor pattern")
});

static TYPE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:local)?datetime\b").expect("valid type name pattern"));

/// Argument values that mean "the current instant"
const NOW_WORDS: &[&str] = &[
    "now",
    "current_timestamp",
    "current timestamp",
    "current_timestamp()",
];

/// Rewrite constructors, then bare type names. Returns the new text and
/// whether anything changed.
pub(crate) fn rewrite(text: &str, masked: &MaskedStatement) -> (String, bool) {
    let mut changed = false;

    let after_constructors = CONSTRUCTOR.replace_all(text, |caps: &regex::Captures<'_>| {
        changed = true;
        let arg = caps.get(1).map_or("", |m| m.as_str()).trim();
        if arg.is_empty() || denotes_now(arg, masked) {
            "current_timestamp()".to_string()
        } else {
            format!("CAST({} AS TIMESTAMP)", arg)
        }
    });

    let (out, renamed) = rename_type_names(&after_constructors);
    (out, changed || renamed)
}

fn denotes_now(arg: &str, masked: &MaskedStatement) -> bool {
    masked
        .literal_for(arg)
        .map(|literal| {
            let value = unquote(literal).trim().to_lowercase();
            NOW_WORDS.contains(&value.as_str())
        })
        .unwrap_or(false)
}

/// `DATETIME` in type position becomes `TIMESTAMP`
///
/// Type position: separated by whitespace from a preceding word (column name
/// or `AS`) and followed by `,` `)` `[` `;` or the end of the statement. That
/// keeps property names, map keys and variables called `datetime` intact.
fn rename_type_names(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut changed = false;

    for m in TYPE_NAME.find_iter(text) {
        if in_type_position(text, m.start(), m.end()) {
            out.push_str(&text[last..m.start()]);
            out.push_str("TIMESTAMP");
            last = m.end();
            changed = true;
        }
    }
    out.push_str(&text[last..]);
    (out, changed)
}

fn in_type_position(text: &str, start: usize, end: usize) -> bool {
    let before = &text[..start];
    let separated = before.ends_with(char::is_whitespace);
    let after_word = before
        .trim_end()
        .chars()
        .next_back()
        .map_or(false, |c| c.is_alphanumeric() || c == '_' || c == super::literals::CLOSE);

    let next = text[end..].trim_start().chars().next();
    let closes = matches!(next, None | Some(',' | ')' | '[' | ';'));

    separated && after_word && closes
}
