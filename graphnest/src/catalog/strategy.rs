// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table discovery strategies
//!
//! Engine builds disagree on which introspection calls exist. Discovery is an
//! ordered list of strategies, tried until one yields a catalog:
//!
//! 1. `ShowTablesStrategy`: one combined introspection call
//! 2. `SplitShowTablesStrategy`: separate node and relationship calls
//! 3. `FallbackCacheStrategy`: the locally persisted catalog
//! 4. `LabelScanStrategy`: distinct labels through the query language

use super::cache::FallbackCatalogCache;
use super::types::{TableDescriptor, TableKind};
use crate::host::HostResult;
use crate::result::QueryResult;
use crate::session::Session;
use async_trait::async_trait;
use serde_json::Value;

/// Introspection calls whose availability is memoized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportKey {
    ShowTables,
    ShowSplitTables,
    TableInfo,
}

/// What is known about one introspection call on the current engine build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Support {
    #[default]
    Unknown,
    Supported,
    Unsupported,
}

/// Memoized availability of introspection calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogSupport {
    pub show_tables: Support,
    pub show_split_tables: Support,
    pub table_info: Support,
}

impl CatalogSupport {
    pub fn get(&self, key: SupportKey) -> Support {
        match key {
            SupportKey::ShowTables => self.show_tables,
            SupportKey::ShowSplitTables => self.show_split_tables,
            SupportKey::TableInfo => self.table_info,
        }
    }

    pub fn set(&mut self, key: SupportKey, support: Support) {
        match key {
            SupportKey::ShowTables => self.show_tables = support,
            SupportKey::ShowSplitTables => self.show_split_tables = support,
            SupportKey::TableInfo => self.table_info = support,
        }
    }

    pub fn is_unsupported(&self, key: SupportKey) -> bool {
        self.get(key) == Support::Unsupported
    }
}

/// Everything a strategy may use during one attempt
pub struct StrategyContext<'a> {
    pub session: &'a mut Session,
    pub cache: &'a FallbackCatalogCache,
}

/// One way of discovering the engine's tables
#[async_trait]
pub trait CatalogStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// The introspection call this strategy depends on, if any
    ///
    /// Strategies with a key are skipped once the call is known to be
    /// unsupported.
    fn support_key(&self) -> Option<SupportKey> {
        None
    }

    /// Whether a result comes from the live engine (and so replaces the
    /// fallback cache)
    fn is_live(&self) -> bool {
        true
    }

    /// Try to discover the tables
    ///
    /// # Returns
    /// * `None` if the strategy has nothing to offer
    /// * `Some(Ok(tables))` on success, which ends the cascade
    /// * `Some(Err(e))` if the engine rejected the attempt
    async fn attempt(
        &self,
        ctx: &mut StrategyContext<'_>,
    ) -> Option<HostResult<Vec<TableDescriptor>>>;
}

pub struct ShowTablesStrategy;

#[async_trait]
impl CatalogStrategy for ShowTablesStrategy {
    fn name(&self) -> &'static str {
        "show_tables"
    }

    fn support_key(&self) -> Option<SupportKey> {
        Some(SupportKey::ShowTables)
    }

    async fn attempt(
        &self,
        ctx: &mut StrategyContext<'_>,
    ) -> Option<HostResult<Vec<TableDescriptor>>> {
        let result = ctx.session.query_raw("CALL show_tables() RETURN *").await;
        Some(result.map(|r| descriptors_from_rows(&r, TableKind::Unknown)))
    }
}

pub struct SplitShowTablesStrategy;

#[async_trait]
impl CatalogStrategy for SplitShowTablesStrategy {
    fn name(&self) -> &'static str {
        "show_node_tables/show_rel_tables"
    }

    fn support_key(&self) -> Option<SupportKey> {
        Some(SupportKey::ShowSplitTables)
    }

    async fn attempt(
        &self,
        ctx: &mut StrategyContext<'_>,
    ) -> Option<HostResult<Vec<TableDescriptor>>> {
        let nodes = match ctx.session.query_raw("CALL show_node_tables() RETURN *").await {
            Ok(result) => descriptors_from_rows(&result, TableKind::Node),
            Err(e) => return Some(Err(e)),
        };
        let rels = match ctx.session.query_raw("CALL show_rel_tables() RETURN *").await {
            Ok(result) => descriptors_from_rows(&result, TableKind::Rel),
            Err(e) => return Some(Err(e)),
        };

        let mut tables = nodes;
        for rel in rels {
            merge_descriptor(&mut tables, rel);
        }
        Some(Ok(tables))
    }
}

pub struct FallbackCacheStrategy;

#[async_trait]
impl CatalogStrategy for FallbackCacheStrategy {
    fn name(&self) -> &'static str {
        "fallback_cache"
    }

    fn is_live(&self) -> bool {
        false
    }

    async fn attempt(
        &self,
        ctx: &mut StrategyContext<'_>,
    ) -> Option<HostResult<Vec<TableDescriptor>>> {
        let entries = ctx.cache.entries();
        if entries.is_empty() {
            None
        } else {
            Some(Ok(entries))
        }
    }
}

pub struct LabelScanStrategy;

#[async_trait]
impl CatalogStrategy for LabelScanStrategy {
    fn name(&self) -> &'static str {
        "label_scan"
    }

    async fn attempt(
        &self,
        ctx: &mut StrategyContext<'_>,
    ) -> Option<HostResult<Vec<TableDescriptor>>> {
        let nodes = match ctx
            .session
            .query_raw("MATCH (n) RETURN DISTINCT label(n) AS name")
            .await
        {
            Ok(result) => descriptors_from_rows(&result, TableKind::Node),
            Err(e) => return Some(Err(e)),
        };
        let rels = match ctx
            .session
            .query_raw("MATCH ()-[r]->() RETURN DISTINCT label(r) AS name")
            .await
        {
            Ok(result) => descriptors_from_rows(&result, TableKind::Rel),
            Err(e) => return Some(Err(e)),
        };

        let mut tables = nodes;
        for rel in rels {
            merge_descriptor(&mut tables, rel);
        }
        Some(Ok(tables))
    }
}

/// The discovery cascade in order
pub fn default_strategies() -> Vec<Box<dyn CatalogStrategy>> {
    vec![
        Box::new(ShowTablesStrategy),
        Box::new(SplitShowTablesStrategy),
        Box::new(FallbackCacheStrategy),
        Box::new(LabelScanStrategy),
    ]
}

/// Add `table` to `tables`, merging with an entry of the same name
///
/// A merged entry becomes REL only if it was not already NODE, and a
/// duplicate of unknown kind never overwrites a known one.
pub fn merge_descriptor(tables: &mut Vec<TableDescriptor>, table: TableDescriptor) {
    let key = table.key();
    match tables.iter_mut().find(|t| t.key() == key) {
        Some(existing) => {
            if existing.kind != TableKind::Node && table.kind != TableKind::Unknown {
                existing.kind = table.kind;
            }
            if existing.columns.is_empty() {
                existing.columns = table.columns;
            }
        }
        None => tables.push(table),
    }
}

/// Build descriptors from introspection rows
///
/// The table name comes from a `name` column (or the first string cell); the
/// kind from a `type` column when present, otherwise `default_kind`.
pub(crate) fn descriptors_from_rows(result: &QueryResult, default_kind: TableKind) -> Vec<TableDescriptor> {
    let mut tables = Vec::new();
    for row in &result.rows {
        let name = row
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| row.values().find_map(Value::as_str));
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            continue;
        };
        let kind = row
            .get("type")
            .and_then(Value::as_str)
            .map(TableKind::from_engine)
            .filter(|kind| *kind != TableKind::Unknown)
            .unwrap_or(default_kind);
        merge_descriptor(&mut tables, TableDescriptor::new(name, kind));
    }
    tables
}
