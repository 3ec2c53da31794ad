// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Automatic identifier injection
//!
//! Node tables need a primary key, but statements written against other
//! dialects often create nodes without one. For the configured label, node
//! patterns in `CREATE` clauses that lack the identifier property get
//! `property: AUTO_ID_PLACEHOLDER` injected. The placeholders are resolved to
//! concrete values inside the session that runs the statement.

use super::literals::{unquote, MaskedStatement, PLACEHOLDER_PATTERN};
use super::quote_identifier;
use crate::config::AutoIdConfig;
use once_cell::sync::Lazy;
use regex::Regex;

/// Token standing in for an identifier value until resolution
pub const AUTO_ID_PLACEHOLDER: &str = "__graphnest_auto_id__";

static CREATE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\b").expect("valid create pattern"));

/// DDL forms of CREATE, which never contain node patterns to fill in
static CREATE_DDL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s+(?:(?:NODE|REL)\s+(?:GROUP\s+)?TABLE|MACRO|SEQUENCE|TYPE|GRAPH)\b")
        .expect("valid ddl pattern")
});

static CLAUSE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:MATCH|OPTIONAL|WITH|RETURN|MERGE|SET|DELETE|DETACH|REMOVE|UNWIND|CREATE|WHERE|CALL|ORDER|LIMIT|SKIP|UNION|FOREACH)\b|;",
    )
    .expect("valid clause pattern")
});

/// `(var:Label {props})` with an optional variable and property map
static NODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let name = format!(r"(?:[A-Za-z_][A-Za-z0-9_]*|{})", PLACEHOLDER_PATTERN);
    Regex::new(&format!(
        r"\(\s*{name}?\s*:\s*({name})\s*(\{{[^{{}}]*\}})?\s*\)",
        name = name
    ))
    .expect("valid node pattern")
});

/// Inject placeholders into masked `text`. Returns the new text and the
/// number of placeholders injected.
pub(crate) fn inject(text: &str, masked: &MaskedStatement, auto_id: &AutoIdConfig) -> (String, usize) {
    let key = property_key(&auto_id.property);
    let mut insertions: Vec<(usize, String)> = Vec::new();

    for create in CREATE_KEYWORD.find_iter(text) {
        let clause_start = create.end();
        let rest = &text[clause_start..];
        if CREATE_DDL.is_match(rest) {
            continue;
        }
        let clause = &rest[..clause_end(rest)];

        for caps in NODE_PATTERN.captures_iter(clause) {
            let (whole, label) = match (caps.get(0), caps.get(1)) {
                (Some(whole), Some(label)) => (whole, label),
                _ => continue,
            };
            if !names_label(label.as_str(), masked, &auto_id.label) {
                continue;
            }

            match caps.get(2) {
                Some(props) if has_key(props.as_str(), masked, &auto_id.property) => {}
                Some(props) => {
                    let inner = &props.as_str()[1..props.as_str().len() - 1];
                    let separator = if inner.trim().is_empty() { "" } else { ", " };
                    insertions.push((
                        clause_start + props.start() + 1,
                        format!("{}: {}{}", key, AUTO_ID_PLACEHOLDER, separator),
                    ));
                }
                None => insertions.push((
                    clause_start + whole.end() - 1,
                    format!(" {{{}: {}}}", key, AUTO_ID_PLACEHOLDER),
                )),
            }
        }
    }

    if insertions.is_empty() {
        return (text.to_string(), 0);
    }

    let mut out = String::with_capacity(text.len() + insertions.len() * 32);
    let mut last = 0;
    for (at, insertion) in &insertions {
        out.push_str(&text[last..*at]);
        out.push_str(insertion);
        last = *at;
    }
    out.push_str(&text[last..]);
    (out, insertions.len())
}

/// Offset of the first clause keyword (or `;`) outside a property map
fn clause_end(rest: &str) -> usize {
    CLAUSE_END
        .find_iter(rest)
        .find(|m| brace_depth(&rest[..m.start()]) == 0)
        .map_or(rest.len(), |m| m.start())
}

fn brace_depth(text: &str) -> usize {
    text.chars().fold(0, |depth: usize, c| match c {
        '{' => depth + 1,
        '}' => depth.saturating_sub(1),
        _ => depth,
    })
}

/// Resolve a label token (plain or masked backtick identifier) and compare
fn names_label(token: &str, masked: &MaskedStatement, label: &str) -> bool {
    resolve_name(token, masked).eq_ignore_ascii_case(label)
}

/// Whether a masked property map already sets `property`
fn has_key(props: &str, masked: &MaskedStatement, property: &str) -> bool {
    props
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|entry| entry.split_once(':'))
        .any(|(key, _)| resolve_name(key.trim(), masked).eq_ignore_ascii_case(property))
}

fn resolve_name(token: &str, masked: &MaskedStatement) -> String {
    match masked.literal_for(token) {
        Some(literal) if literal.starts_with('`') => unquote(literal),
        _ => token.to_string(),
    }
}

fn property_key(property: &str) -> String {
    let plain = property
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && property.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        property.to_string()
    } else {
        quote_identifier(property)
    }
}
