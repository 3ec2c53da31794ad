// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Simple persistent key-value stores
//!
//! The host keeps small pieces of state (the fallback catalog) in a string
//! key-value store. Two implementations are provided: an in-memory map and a
//! sled-backed tree.

use super::fs::{HostError, HostResult};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Host key-value store holding string values
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &str) -> HostResult<Option<String>>;

    /// Insert or overwrite a value
    fn set(&self, key: &str, value: &str) -> HostResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> HostResult<()>;
}

/// In-memory store, lost when dropped
#[derive(Default)]
pub struct MemoryKeyValueStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> HostResult<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> HostResult<()> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> HostResult<()> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// Sled-backed store
#[cfg(feature = "sled-backend")]
pub struct SledKeyValueStore {
    tree: sled::Tree,
}

#[cfg(feature = "sled-backend")]
impl SledKeyValueStore {
    /// Name of the sled tree holding the entries
    pub const TREE_NAME: &'static str = "graphnest_kv";

    /// Open or create a store at the given directory
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> HostResult<Self> {
        let db = sled::open(path).map_err(sled_error)?;
        let tree = db.open_tree(Self::TREE_NAME).map_err(sled_error)?;
        Ok(Self { tree })
    }
}

#[cfg(feature = "sled-backend")]
impl KeyValueStore for SledKeyValueStore {
    fn get(&self, key: &str) -> HostResult<Option<String>> {
        let value = self.tree.get(key.as_bytes()).map_err(sled_error)?;
        match value {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| HostError::new(format!("non UTF-8 value under '{}': {}", key, e))),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> HostResult<()> {
        self.tree
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(sled_error)?;
        self.tree.flush().map_err(sled_error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> HostResult<()> {
        self.tree.remove(key.as_bytes()).map_err(sled_error)?;
        self.tree.flush().map_err(sled_error)?;
        Ok(())
    }
}

#[cfg(feature = "sled-backend")]
fn sled_error(e: sled::Error) -> HostError {
    HostError::new(format!("sled: {}", e))
}
