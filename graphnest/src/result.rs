// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query results and graph entity normalization
//!
//! The engine returns graph entities (nodes, relationships, paths) as objects
//! carrying internal fields such as `_id`, `_label`, `_src` and `_dst`. Callers
//! receive plain nested maps instead: internal fields lose their prefix,
//! relationship endpoints become `source`/`target` and internal id objects
//! become `"table:offset"` strings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A result row: column name to value, in column order
pub type Row = Map<String, Value>;

/// Result of one statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row
    pub fn first_value(&self) -> Option<&Value> {
        let column = self.columns.first()?;
        self.rows.first()?.get(column)
    }

    /// Values of one column across all rows (missing cells are skipped)
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().filter_map(move |row| row.get(column))
    }

    /// Replace engine entities in every cell with plain maps
    pub fn normalized(self) -> Self {
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(column, value)| (column, normalize_value(value)))
                    .collect()
            })
            .collect();
        Self {
            columns: self.columns,
            rows,
        }
    }
}

/// Normalize one value, recursing through arrays and maps
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Object(map) => {
            if is_entity(&map) {
                Value::Object(normalize_entity(map))
            } else {
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, normalize_value(v)))
                        .collect(),
                )
            }
        }
        other => other,
    }
}

fn is_entity(map: &Map<String, Value>) -> bool {
    ["_id", "_label", "_src", "_dst", "_nodes", "_rels"]
        .iter()
        .any(|key| map.contains_key(*key))
}

/// `{table, offset}` internal id objects, as found under `_id`, `_src` and `_dst`
fn internal_id(map: &Map<String, Value>) -> Option<String> {
    if map.len() != 2 {
        return None;
    }
    let table = map.get("table")?;
    let offset = map.get("offset")?;
    Some(format!("{}:{}", scalar_text(table), scalar_text(offset)))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn public_name(key: &str) -> String {
    match key {
        "_src" => "source".to_string(),
        "_dst" => "target".to_string(),
        _ => key.trim_start_matches('_').to_string(),
    }
}

fn normalize_entity(map: Map<String, Value>) -> Map<String, Value> {
    // User properties win over internal fields that strip to the same name.
    let mut properties: Map<String, Value> = Map::new();
    let mut internals: Vec<(String, Value)> = Vec::new();

    for (key, value) in map {
        if key == "_properties" {
            if let Value::Object(nested) = value {
                for (k, v) in nested {
                    properties.entry(k).or_insert_with(|| normalize_value(v));
                }
            }
        } else if key.starts_with('_') {
            let value = match value {
                Value::Object(id) if matches!(key.as_str(), "_id" | "_src" | "_dst") => {
                    match internal_id(&id) {
                        Some(text) => Value::String(text),
                        None => normalize_value(Value::Object(id)),
                    }
                }
                other => normalize_value(other),
            };
            internals.push((public_name(&key), value));
        } else {
            properties.insert(key, normalize_value(value));
        }
    }

    let mut out = Map::new();
    for (name, value) in internals {
        if !properties.contains_key(&name) {
            out.insert(name, value);
        }
    }
    out.extend(properties);
    out
}
