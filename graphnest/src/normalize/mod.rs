// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement normalizer
//!
//! Rewrites statements for dialect gaps before they reach the engine:
//!
//! 1. literals are masked (`literals`)
//! 2. date/time constructors and type names are rewritten (`temporal`)
//! 3. missing identifiers are injected as placeholders (`auto_id`)
//! 4. literals are restored
//!
//! Placeholders are resolved later, inside the session that runs the
//! statement, by `StatementNormalizer::resolve_placeholders`.

pub mod auto_id;
pub mod literals;
mod temporal;

pub use auto_id::AUTO_ID_PLACEHOLDER;
pub use literals::{mask_literals, unquote, MaskedStatement};

use crate::config::AutoIdConfig;
use crate::error::{Error, Result};
use crate::session::Session;
use serde_json::Value;

/// Outcome of normalizing one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStatement {
    pub statement: String,
    pub did_rewrite: bool,
    /// Number of `AUTO_ID_PLACEHOLDER` tokens injected
    pub auto_id_placeholders: usize,
}

#[derive(Debug, Clone, Default)]
pub struct StatementNormalizer {
    auto_id: Option<AutoIdConfig>,
}

impl StatementNormalizer {
    pub fn new(auto_id: Option<AutoIdConfig>) -> Self {
        Self { auto_id }
    }

    pub fn auto_id(&self) -> Option<&AutoIdConfig> {
        self.auto_id.as_ref()
    }

    /// Rewrite `statement`; applying this to its own output changes nothing
    pub fn normalize(&self, statement: &str) -> NormalizedStatement {
        let masked = mask_literals(statement);
        let (text, _) = temporal::rewrite(masked.text(), &masked);
        let (text, auto_id_placeholders) = match &self.auto_id {
            Some(auto_id) => auto_id::inject(&text, &masked, auto_id),
            None => (text, 0),
        };

        let rewritten = masked.restore(&text);
        let did_rewrite = rewritten != statement;
        if did_rewrite {
            log::debug!("Rewrote statement: {} -> {}", statement, rewritten);
        }

        NormalizedStatement {
            statement: rewritten,
            did_rewrite,
            auto_id_placeholders,
        }
    }

    /// Replace auto-id placeholders with `max + 1`, `max + 2`, ... in textual
    /// order, where `max` is the largest identifier currently stored for the
    /// configured label (zero when there is none)
    pub async fn resolve_placeholders(
        &self,
        session: &mut Session,
        statement: &str,
        count: usize,
    ) -> Result<String> {
        let auto_id = match &self.auto_id {
            Some(auto_id) if count > 0 => auto_id,
            _ => return Ok(statement.to_string()),
        };

        let masked = mask_literals(statement);
        let pieces: Vec<&str> = masked.text().split(AUTO_ID_PLACEHOLDER).collect();
        if pieces.len() == 1 {
            return Ok(statement.to_string());
        }

        let query = format!(
            "MATCH (n:{}) RETURN max(n.{}) AS max_id",
            quote_identifier(&auto_id.label),
            quote_identifier(&auto_id.property)
        );
        let max_id = parse_max_id(session.query(&query).await?.first_value())?;
        log::debug!(
            "Resolving {} auto-id placeholder(s) for {} from max {}",
            pieces.len() - 1,
            auto_id.label,
            max_id
        );

        let mut text = String::with_capacity(masked.text().len());
        let mut next_id = max_id;
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                next_id += 1;
                text.push_str(&next_id.to_string());
            }
            text.push_str(piece);
        }
        Ok(masked.restore(&text))
    }
}

/// Wrap a name in backticks, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Single-quoted string literal with backslash escapes
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn parse_max_id(value: Option<&Value>) -> Result<i64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64))
            .ok_or_else(|| unexpected_max(&n.to_string())),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| unexpected_max(s)),
        Some(other) => Err(unexpected_max(&other.to_string())),
    }
}

fn unexpected_max(value: &str) -> Error {
    Error::Query {
        message: format!("Existing identifiers are not numeric (max is {})", value),
        hint: Some("Automatic identifiers need an integer identifier property.".to_string()),
    }
}
