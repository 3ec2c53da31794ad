// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fallback catalog cache
//!
//! The last catalog seen from the live engine, persisted as one JSON array of
//! `{name, type, columns}` records under a single key of the host key-value
//! store. Only consulted when live introspection fails. A missing or corrupt
//! entry reads as an empty catalog.

use super::types::{normalize_name, ColumnDescriptor, TableDescriptor};
use crate::error::{Error, Result};
use crate::host::KeyValueStore;
use std::sync::Arc;

pub struct FallbackCatalogCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl FallbackCatalogCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Cached tables in stored order
    pub fn entries(&self) -> Vec<TableDescriptor> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Reading catalog cache '{}' failed: {}", self.key, e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Ignoring corrupt catalog cache '{}': {}", self.key, e);
                Vec::new()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<TableDescriptor> {
        let key = normalize_name(name);
        self.entries().into_iter().find(|t| t.key() == key)
    }

    /// Replace the table set with a live catalog
    ///
    /// Column metadata learned earlier is kept for tables that are still
    /// present and arrive without columns of their own.
    pub fn replace_all(&self, tables: &[TableDescriptor]) -> Result<()> {
        let previous = self.entries();
        let merged: Vec<TableDescriptor> = tables
            .iter()
            .map(|table| {
                let mut table = table.clone();
                if table.columns.is_empty() {
                    let key = table.key();
                    if let Some(cached) = previous.iter().find(|t| t.key() == key) {
                        table.columns = cached.columns.clone();
                    }
                }
                table
            })
            .collect();
        self.write(&merged)
    }

    /// Store the columns of one table, adding the table if it is new
    pub fn upsert_columns(&self, table: &TableDescriptor, columns: &[ColumnDescriptor]) -> Result<()> {
        let mut entries = self.entries();
        let key = table.key();
        match entries.iter_mut().find(|t| t.key() == key) {
            Some(entry) => entry.columns = columns.to_vec(),
            None => entries.push(table.clone().with_columns(columns.to_vec())),
        }
        self.write(&entries)
    }

    /// Drop the entry for `name`; returns whether there was one
    pub fn invalidate(&self, name: &str) -> Result<bool> {
        let mut entries = self.entries();
        let key = normalize_name(name);
        let before = entries.len();
        entries.retain(|t| t.key() != key);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries)?;
        log::debug!("Invalidated catalog cache entry '{}'", name);
        Ok(true)
    }

    fn write(&self, tables: &[TableDescriptor]) -> Result<()> {
        let raw = serde_json::to_string(tables)
            .map_err(|e| Error::Catalog(format!("encoding catalog cache: {}", e)))?;
        self.store.set(&self.key, &raw)?;
        Ok(())
    }
}
