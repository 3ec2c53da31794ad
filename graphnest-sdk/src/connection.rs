// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Main entry point: the public operation surface
//!
//! Every operation runs as one exclusive session on the operation queue, so
//! callers may share a `GraphNest` freely across tasks.

use crate::error::Result;
use crate::seed;
use futures::FutureExt;
use graphnest::catalog::{affected_tables, CatalogResolver, FallbackCatalogCache};
use graphnest::host::{EngineFactory, KeyValueStore};
use graphnest::session::check_cancelled;
use graphnest::{
    quote_identifier, ModuleLoader, OperationQueue, QueryResult, Session, SessionConfig,
    SnapshotCodec, SnapshotMetadata, StatementNormalizer, TableDescriptor, TableKind,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Handle to an embedded graph database
///
/// # Examples
///
/// ```no_run
/// use graphnest_sdk::GraphNest;
/// # use std::sync::Arc;
///
/// # async fn run(
/// #     factory: Arc<dyn graphnest::host::EngineFactory>,
/// #     kv: Arc<dyn graphnest::host::KeyValueStore>,
/// # ) -> graphnest_sdk::Result<()> {
/// let db = GraphNest::new(factory, kv, graphnest::SessionConfig::default())?;
/// db.execute("CREATE NODE TABLE Person(id INT64, name STRING, PRIMARY KEY(id))")
///     .await?;
/// db.execute("CREATE (:Person {name: 'Alice'})").await?;
/// for table in db.list_tables().await? {
///     println!("{} ({})", table.name, table.kind);
/// }
/// # Ok(())
/// # }
/// ```
pub struct GraphNest {
    config: Arc<SessionConfig>,
    queue: Arc<OperationQueue>,
    resolver: Arc<CatalogResolver>,
    normalizer: Arc<StatementNormalizer>,
    snapshots: SnapshotCodec,
}

impl GraphNest {
    /// Wire a database over `factory`, keeping the fallback catalog in `kv_store`
    ///
    /// Nothing is loaded or mounted until the first operation.
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        kv_store: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let loader = Arc::new(ModuleLoader::new(factory, config.worker_path.clone()));
        let queue = Arc::new(OperationQueue::new(loader, config.clone()));
        let cache = FallbackCatalogCache::new(kv_store, config.catalog_cache_key.clone());
        let resolver = Arc::new(CatalogResolver::new(cache));
        let normalizer = Arc::new(StatementNormalizer::new(config.auto_id.clone()));
        let snapshots = SnapshotCodec::new(queue.clone(), resolver.clone());

        Ok(GraphNest {
            config,
            queue,
            resolver,
            normalizer,
            snapshots,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Execute one statement
    ///
    /// The statement is normalized first (date/time rewrites, automatic
    /// identifiers) and engine entities in the result are returned as plain
    /// maps. Dropping or altering a table evicts it from the catalog cache.
    pub async fn execute(&self, statement: &str) -> Result<QueryResult> {
        let normalized = self.normalizer.normalize(statement);
        let normalizer = self.normalizer.clone();

        let result = self
            .queue
            .run_exclusive(move |session| {
                async move {
                    let statement = normalizer
                        .resolve_placeholders(
                            session,
                            &normalized.statement,
                            normalized.auto_id_placeholders,
                        )
                        .await?;
                    session.query(&statement).await
                }
                .boxed()
            })
            .await?;

        let affected = affected_tables(statement);
        if !affected.is_empty() {
            if let Err(e) = self.resolver.invalidate_tables(&affected) {
                log::warn!("Evicting {:?} from the catalog cache failed: {}", affected, e);
            }
        }
        Ok(result.normalized())
    }

    /// Node and relationship tables of the database
    pub async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        let resolver = self.resolver.clone();
        let tables = self
            .queue
            .run_exclusive(move |session| async move { resolver.list_tables(session).await }.boxed())
            .await?;
        Ok(tables)
    }

    /// A table with its columns; `name` is matched case-insensitively
    pub async fn describe_table(&self, name: &str) -> Result<TableDescriptor> {
        let resolver = self.resolver.clone();
        let name = name.to_string();
        let table = self
            .queue
            .run_exclusive(move |session| {
                async move {
                    let table = lookup(&resolver, session, &name).await?;
                    let columns = resolver.describe_table(session, &table).await?;
                    Ok(table.with_columns(columns))
                }
                .boxed()
            })
            .await?;
        Ok(table)
    }

    /// Up to `limit` rows of a table, never more than the configured preview limit
    pub async fn preview_table(&self, name: &str, limit: usize) -> Result<QueryResult> {
        let limit = limit.min(self.config.preview_row_limit);
        let resolver = self.resolver.clone();
        let name = name.to_string();

        let result = self
            .queue
            .run_exclusive(move |session| {
                async move {
                    let table = lookup(&resolver, session, &name).await?;
                    let label = quote_identifier(&table.name);
                    let statement = match table.kind {
                        TableKind::Rel => {
                            format!("MATCH ()-[r:{}]->() RETURN r LIMIT {}", label, limit)
                        }
                        TableKind::Node | TableKind::Unknown => {
                            format!("MATCH (n:{}) RETURN n LIMIT {}", label, limit)
                        }
                    };
                    session.query(&statement).await
                }
                .boxed()
            })
            .await?;
        Ok(result.normalized())
    }

    /// Create and fill the demo tables in a single session
    ///
    /// `cancel` is checked before every statement. Statements that already
    /// ran stay applied; the session is torn down normally either way.
    pub async fn seed_demo(&self, cancel: &CancellationToken) -> Result<()> {
        let cancel = cancel.clone();
        let normalizer = self.normalizer.clone();

        self.queue
            .run_exclusive(move |session| {
                async move {
                    for statement in seed::demo_statements() {
                        check_cancelled(&cancel)?;
                        let normalized = normalizer.normalize(statement);
                        let statement = normalizer
                            .resolve_placeholders(
                                session,
                                &normalized.statement,
                                normalized.auto_id_placeholders,
                            )
                            .await?;
                        session.query(&statement).await?;
                    }
                    Ok(())
                }
                .boxed()
            })
            .await
            .map_err(|e| {
                if matches!(e, graphnest::Error::Cancelled) {
                    log::info!("Demo seeding cancelled");
                } else {
                    log::error!("Demo seeding failed: {}", e);
                }
                e
            })?;

        log::info!("Seeded demo dataset");
        Ok(())
    }

    /// Drop every table, relationship tables first, and empty the catalog cache
    ///
    /// Returns the number of tables dropped.
    pub async fn clear_all(&self) -> Result<usize> {
        let resolver = self.resolver.clone();
        let dropped = self
            .queue
            .run_exclusive(move |session| {
                async move {
                    let tables = resolver.list_tables(session).await?;
                    let (rels, nodes): (Vec<_>, Vec<_>) =
                        tables.into_iter().partition(|t| t.kind == TableKind::Rel);

                    let mut dropped = Vec::new();
                    for table in rels.into_iter().chain(nodes) {
                        session
                            .query(&format!("DROP TABLE {}", quote_identifier(&table.name)))
                            .await?;
                        dropped.push(table.name);
                    }
                    Ok(dropped)
                }
                .boxed()
            })
            .await?;

        self.resolver.invalidate_tables(&dropped)?;
        self.resolver.cache().replace_all(&[])?;
        log::info!("Cleared {} table(s)", dropped.len());
        Ok(dropped.len())
    }

    /// The database file as a snapshot frame
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        Ok(self.snapshots.export().await?)
    }

    /// Replace the database file with a verified snapshot
    pub async fn import_snapshot(&self, bytes: &[u8]) -> Result<SnapshotMetadata> {
        Ok(self.snapshots.import(bytes).await?)
    }
}

/// Resolve `name` against a fresh listing
async fn lookup(
    resolver: &CatalogResolver,
    session: &mut Session,
    name: &str,
) -> graphnest::Result<TableDescriptor> {
    resolver.list_tables(session).await?;
    resolver
        .find_table(name)
        .ok_or_else(|| graphnest::Error::Catalog(format!("table '{}' not found", name)))
}
