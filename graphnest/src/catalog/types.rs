// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of table in the engine catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableKind {
    Node,
    Rel,
    #[serde(other)]
    Unknown,
}

impl TableKind {
    /// Interpret a table type as reported by the engine
    pub fn from_engine(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "NODE" | "NODE_TABLE" => TableKind::Node,
            "REL" | "REL_TABLE" | "REL_GROUP" | "RELATIONSHIP" => TableKind::Rel,
            _ => TableKind::Unknown,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Node => write!(f, "NODE"),
            TableKind::Rel => write!(f, "REL"),
            TableKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A column and its declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A table known to the catalog
///
/// Serialized as `{name, type, columns}`, the record layout of the fallback
/// catalog cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TableKind,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, kind: TableKind) -> Self {
        Self {
            name: name.into(),
            kind,
            columns: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.columns = columns;
        self
    }

    /// Case-insensitive lookup key
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Lookup key for a table name
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
