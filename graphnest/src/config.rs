// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session layer configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest row count a table preview may request
pub const MAX_PREVIEW_ROWS: usize = 1000;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Configuration shared by every component of the session layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Working directory the durable store is mounted at
    pub work_dir: String,

    /// Database file name inside `work_dir`
    pub database_file: String,

    /// Fixed backoff before the single retry of a busy mount/unmount
    #[serde(with = "millis")]
    pub retry_backoff: Duration,

    /// Worker script location, configured once before the first engine load
    pub worker_path: Option<String>,

    /// Key of the fallback catalog in the host key-value store
    pub catalog_cache_key: String,

    /// Automatic identifier assignment for one node label
    pub auto_id: Option<AutoIdConfig>,

    /// Default number of rows returned by a table preview
    pub preview_row_limit: usize,

    /// Version written into exported snapshots
    pub snapshot_version: u32,
}

/// Node label whose created nodes get an identifier assigned when missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoIdConfig {
    pub label: String,
    pub property: String,
}

impl Default for AutoIdConfig {
    fn default() -> Self {
        Self {
            label: "Person".to_string(),
            property: "id".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_dir: "/graphnest".to_string(),
            database_file: "graphnest.db".to_string(),
            retry_backoff: Duration::from_millis(100),
            worker_path: None,
            catalog_cache_key: "graphnest.catalog_cache".to_string(),
            auto_id: Some(AutoIdConfig::default()),
            preview_row_limit: 20,
            snapshot_version: SNAPSHOT_VERSION,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(text: &str) -> Result<Self> {
        let config: SessionConfig =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Full path of the database file
    pub fn database_path(&self) -> String {
        format!(
            "{}/{}",
            self.work_dir.trim_end_matches('/'),
            self.database_file
        )
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<String>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_database_file(mut self, database_file: impl Into<String>) -> Self {
        self.database_file = database_file.into();
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_worker_path(mut self, worker_path: impl Into<String>) -> Self {
        self.worker_path = Some(worker_path.into());
        self
    }

    pub fn with_auto_id(mut self, auto_id: Option<AutoIdConfig>) -> Self {
        self.auto_id = auto_id;
        self
    }

    pub fn with_catalog_cache_key(mut self, key: impl Into<String>) -> Self {
        self.catalog_cache_key = key.into();
        self
    }

    pub fn with_preview_row_limit(mut self, limit: usize) -> Self {
        self.preview_row_limit = limit;
        self
    }

    /// Check the configuration for values the session layer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.work_dir.trim().is_empty() {
            return Err(Error::Config("work_dir must not be empty".to_string()));
        }
        if self.database_file.trim().is_empty() || self.database_file.contains('/') {
            return Err(Error::Config(format!(
                "database_file must be a plain file name, got '{}'",
                self.database_file
            )));
        }
        if self.catalog_cache_key.is_empty() {
            return Err(Error::Config(
                "catalog_cache_key must not be empty".to_string(),
            ));
        }
        if self.preview_row_limit == 0 || self.preview_row_limit > MAX_PREVIEW_ROWS {
            return Err(Error::Config(format!(
                "preview_row_limit must be between 1 and {}",
                MAX_PREVIEW_ROWS
            )));
        }
        if let Some(auto_id) = &self.auto_id {
            if auto_id.label.trim().is_empty() || auto_id.property.trim().is_empty() {
                return Err(Error::Config(
                    "auto_id label and property must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
