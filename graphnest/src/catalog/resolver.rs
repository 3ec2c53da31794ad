// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog resolver
//!
//! Runs the discovery cascade inside a session, keeps the fallback cache in
//! step with the live engine and memoizes which introspection calls the
//! engine build supports.

use super::cache::FallbackCatalogCache;
use super::strategy::{
    default_strategies, CatalogStrategy, CatalogSupport, StrategyContext, Support, SupportKey,
};
use super::types::{normalize_name, ColumnDescriptor, TableDescriptor, TableKind};
use crate::error::{classify, Error, ErrorSignature, Result};
use crate::host::HostError;
use crate::normalize::{mask_literals, quote_identifier, quote_string, unquote};
use crate::session::Session;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

static SCHEMA_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:DROP|ALTER)\s+TABLE\s+(?:IF\s+EXISTS\s+)?([A-Za-z_][A-Za-z0-9_]*|{})",
        crate::normalize::literals::PLACEHOLDER_PATTERN
    ))
    .expect("valid schema change pattern")
});

pub struct CatalogResolver {
    strategies: Vec<Box<dyn CatalogStrategy>>,
    cache: FallbackCatalogCache,
    support: Mutex<CatalogSupport>,
    index: RwLock<HashMap<String, TableDescriptor>>,
}

impl CatalogResolver {
    /// Resolver with the standard discovery cascade
    pub fn new(cache: FallbackCatalogCache) -> Self {
        Self::with_strategies(cache, default_strategies())
    }

    pub fn with_strategies(
        cache: FallbackCatalogCache,
        strategies: Vec<Box<dyn CatalogStrategy>>,
    ) -> Self {
        Self {
            strategies,
            cache,
            support: Mutex::new(CatalogSupport::default()),
            index: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &FallbackCatalogCache {
        &self.cache
    }

    /// Snapshot of the support memo
    pub fn support(&self) -> CatalogSupport {
        *self.support.lock()
    }

    /// Forget what is known about the engine build and its tables
    ///
    /// Used after an import, when the database file may come from another
    /// engine version with a different schema.
    pub fn reset_support(&self) {
        *self.support.lock() = CatalogSupport::default();
        self.index.write().clear();
        log::debug!("Reset catalog support memo");
    }

    /// Discover the tables of the open database
    pub async fn list_tables(&self, session: &mut Session) -> Result<Vec<TableDescriptor>> {
        let mut ctx = StrategyContext {
            session,
            cache: &self.cache,
        };
        let mut last_error: Option<(&'static str, HostError)> = None;

        for strategy in &self.strategies {
            let key = strategy.support_key();
            if key.map_or(false, |key| self.support.lock().is_unsupported(key)) {
                log::debug!("Skipping unsupported catalog strategy {}", strategy.name());
                continue;
            }

            match strategy.attempt(&mut ctx).await {
                None => continue,
                Some(Ok(tables)) => {
                    if let Some(key) = key {
                        self.support.lock().set(key, Support::Supported);
                    }
                    if strategy.is_live() {
                        if let Err(e) = self.cache.replace_all(&tables) {
                            log::warn!("Updating catalog cache failed: {}", e);
                        }
                    }
                    self.refresh_index(&tables);
                    log::debug!(
                        "Discovered {} table(s) via {}",
                        tables.len(),
                        strategy.name()
                    );
                    return Ok(tables);
                }
                Some(Err(e)) => {
                    self.record_failure(key, strategy.name(), &e);
                    last_error = Some((strategy.name(), e));
                }
            }
        }

        Err(Error::Catalog(match last_error {
            Some((name, e)) => format!("no catalog strategy succeeded (last: {}: {})", name, e),
            None => "no catalog strategy succeeded".to_string(),
        }))
    }

    /// Columns of `table`: live introspection, then a sampled row, then the
    /// cached columns
    pub async fn describe_table(
        &self,
        session: &mut Session,
        table: &TableDescriptor,
    ) -> Result<Vec<ColumnDescriptor>> {
        let live = match self.columns_from_table_info(session, &table.name).await {
            Some(columns) => Some(columns),
            None => columns_from_sample(session, table).await,
        };

        if let Some(columns) = live {
            if let Err(e) = self.cache.upsert_columns(table, &columns) {
                log::warn!("Caching columns of {} failed: {}", table.name, e);
            }
            return Ok(columns);
        }

        match self.cache.get(&table.name) {
            Some(cached) if !cached.columns.is_empty() => {
                log::debug!("Using cached columns for {}", table.name);
                Ok(cached.columns)
            }
            _ => Err(Error::Catalog(format!(
                "no column information available for table '{}'",
                table.name
            ))),
        }
    }

    /// Case-insensitive lookup in the last listing
    pub fn find_table(&self, name: &str) -> Option<TableDescriptor> {
        self.index.read().get(&normalize_name(name)).cloned()
    }

    /// Drop tables from the index and the fallback cache
    pub fn invalidate_tables(&self, names: &[String]) -> Result<()> {
        let mut index = self.index.write();
        for name in names {
            index.remove(&normalize_name(name));
            self.cache.invalidate(name)?;
        }
        Ok(())
    }

    async fn columns_from_table_info(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Option<Vec<ColumnDescriptor>> {
        let key = SupportKey::TableInfo;
        if self.support.lock().is_unsupported(key) {
            return None;
        }

        let statement = format!("CALL table_info({}) RETURN *", quote_string(name));
        match session.query_raw(&statement).await {
            Ok(result) => {
                self.support.lock().set(key, Support::Supported);
                let columns: Vec<ColumnDescriptor> = result
                    .rows
                    .iter()
                    .filter_map(|row| {
                        let column = row.get("name").and_then(Value::as_str)?;
                        let data_type = row.get("type").and_then(Value::as_str).unwrap_or("ANY");
                        Some(ColumnDescriptor::new(column, data_type))
                    })
                    .collect();
                (!columns.is_empty()).then_some(columns)
            }
            Err(e) => {
                self.record_failure(Some(key), "table_info", &e);
                None
            }
        }
    }

    fn record_failure(&self, key: Option<SupportKey>, name: &str, err: &HostError) {
        match (key, classify(err)) {
            (Some(key), ErrorSignature::Unsupported) => {
                self.support.lock().set(key, Support::Unsupported);
                log::info!("Catalog call {} is not supported by this engine: {}", name, err);
            }
            _ => log::warn!("Catalog strategy {} failed: {}", name, err),
        }
    }

    fn refresh_index(&self, tables: &[TableDescriptor]) {
        let mut index = self.index.write();
        index.clear();
        for table in tables {
            index.insert(table.key(), table.clone());
        }
    }
}

/// Infer columns from one stored entity
async fn columns_from_sample(
    session: &mut Session,
    table: &TableDescriptor,
) -> Option<Vec<ColumnDescriptor>> {
    let name = quote_identifier(&table.name);
    let node = format!("MATCH (n:{}) RETURN n LIMIT 1", name);
    let rel = format!("MATCH ()-[r:{}]->() RETURN r LIMIT 1", name);
    let statements = match table.kind {
        TableKind::Node => vec![node],
        TableKind::Rel => vec![rel],
        TableKind::Unknown => vec![node, rel],
    };

    for statement in statements {
        match session.query_raw(&statement).await {
            Ok(result) => {
                if let Some(Value::Object(entity)) = result.first_value() {
                    let columns = entity_columns(entity);
                    if !columns.is_empty() {
                        return Some(columns);
                    }
                }
            }
            Err(e) => log::debug!("Sampling {} failed: {}", table.name, e),
        }
    }
    None
}

/// User properties of a raw engine entity with types inferred from values
fn entity_columns(entity: &Map<String, Value>) -> Vec<ColumnDescriptor> {
    let mut columns = Vec::new();
    for (key, value) in entity {
        if key == "_properties" {
            if let Value::Object(nested) = value {
                columns.extend(
                    nested
                        .iter()
                        .map(|(k, v)| ColumnDescriptor::new(k.as_str(), infer_type(v))),
                );
            }
        } else if !key.starts_with('_') {
            columns.push(ColumnDescriptor::new(key.as_str(), infer_type(value)));
        }
    }
    columns
}

fn infer_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "ANY",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(n) if n.is_f64() => "DOUBLE",
        Value::Number(_) => "INT64",
        Value::String(_) => "STRING",
        Value::Array(_) => "LIST",
        Value::Object(_) => "STRUCT",
    }
}

/// Tables dropped or altered by `statement`
pub fn affected_tables(statement: &str) -> Vec<String> {
    let masked = mask_literals(statement);
    SCHEMA_CHANGE
        .captures_iter(masked.text())
        .filter_map(|caps| caps.get(1))
        .map(|name| match masked.literal_for(name.as_str()) {
            Some(literal) => unquote(literal),
            None => name.as_str().to_string(),
        })
        .collect()
}
