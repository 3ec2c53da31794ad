//! Test fixture for GraphNest integration tests
//!
//! Wires loader, queue, resolver and normalizer to a scripted engine over an
//! isolated `MemoryFs` and in-memory key-value store.

use super::fake_engine::{EngineProbe, ScriptedEngineFactory};
use futures::FutureExt;
use graphnest::catalog::{CatalogResolver, FallbackCatalogCache, TableDescriptor};
use graphnest::host::{MemoryFs, MemoryKeyValueStore};
use graphnest::{ModuleLoader, OperationQueue, QueryResult, SessionConfig, StatementNormalizer};
use std::sync::Arc;
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Default configuration with a backoff short enough for tests
pub fn test_config() -> SessionConfig {
    SessionConfig::default().with_retry_backoff(Duration::from_millis(1))
}

pub struct TestFixture {
    pub fs: Arc<MemoryFs>,
    pub probe: Arc<EngineProbe>,
    pub kv: Arc<MemoryKeyValueStore>,
    pub config: Arc<SessionConfig>,
    pub queue: Arc<OperationQueue>,
    pub resolver: Arc<CatalogResolver>,
    pub normalizer: Arc<StatementNormalizer>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        init_logging();

        let fs = Arc::new(MemoryFs::new());
        let factory = ScriptedEngineFactory::new(fs.clone());
        let probe = factory.probe();
        let kv = Arc::new(MemoryKeyValueStore::new());
        let config = Arc::new(config);

        let loader = Arc::new(ModuleLoader::new(
            Arc::new(factory),
            config.worker_path.clone(),
        ));
        let queue = Arc::new(OperationQueue::new(loader, config.clone()));
        let cache = FallbackCatalogCache::new(kv.clone(), config.catalog_cache_key.clone());
        let resolver = Arc::new(CatalogResolver::new(cache));
        let normalizer = Arc::new(StatementNormalizer::new(config.auto_id.clone()));

        Self {
            fs,
            probe,
            kv,
            config,
            queue,
            resolver,
            normalizer,
        }
    }

    /// Run one statement as-is in its own session
    pub async fn query(&self, statement: &str) -> graphnest::Result<QueryResult> {
        let statement = statement.to_string();
        self.queue
            .run_exclusive(move |session| async move { session.query(&statement).await }.boxed())
            .await
    }

    /// Normalize, resolve placeholders and run one statement
    pub async fn execute(&self, statement: &str) -> graphnest::Result<QueryResult> {
        let normalized = self.normalizer.normalize(statement);
        let normalizer = self.normalizer.clone();
        self.queue
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
            .await
    }

    pub async fn list_tables(&self) -> graphnest::Result<Vec<TableDescriptor>> {
        let resolver = self.resolver.clone();
        self.queue
            .run_exclusive(move |session| async move { resolver.list_tables(session).await }.boxed())
            .await
    }

    /// Run several statements, failing on the first error
    pub async fn execute_all(&self, statements: &[&str]) {
        for statement in statements {
            self.execute(statement)
                .await
                .unwrap_or_else(|e| panic!("statement failed: {}: {}", statement, e));
        }
    }

    pub async fn count(&self, table: &str) -> i64 {
        let result = self
            .query(&format!("MATCH (n:{}) RETURN count(n) AS count", table))
            .await
            .unwrap();
        result.first_value().and_then(|v| v.as_i64()).unwrap()
    }
}
