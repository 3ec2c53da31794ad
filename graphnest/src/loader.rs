// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Module loader
//!
//! Loads the embedded engine once and hands the same handle to every caller
//! until it is invalidated. Concurrent first calls wait on the same load.

use crate::error::{Error, Result};
use crate::host::{EngineFactory, EngineHandle};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Lazily-initialised, invalidatable engine handle
pub struct ModuleLoader {
    factory: Arc<dyn EngineFactory>,
    worker_path: Option<String>,
    slot: Mutex<Option<EngineHandle>>,
    worker_configured: AtomicBool,
    load_count: AtomicUsize,
}

impl ModuleLoader {
    pub fn new(factory: Arc<dyn EngineFactory>, worker_path: Option<String>) -> Self {
        Self {
            factory,
            worker_path,
            slot: Mutex::new(None),
            worker_configured: AtomicBool::new(false),
            load_count: AtomicUsize::new(0),
        }
    }

    /// Get the engine handle, loading it on first use
    pub async fn load(&self) -> Result<EngineHandle> {
        if !self.factory.host_supported() {
            return Err(Error::Environment(
                "the embedded engine needs a host with worker and durable storage support"
                    .to_string(),
            ));
        }

        let mut slot = self.slot.lock().await;
        if let Some(engine) = slot.as_ref() {
            return Ok(engine.clone());
        }

        if let Some(worker_path) = &self.worker_path {
            if !self.worker_configured.load(Ordering::Acquire) {
                self.factory.configure_worker(worker_path).map_err(|e| {
                    Error::Environment(format!("worker configuration failed: {}", e))
                })?;
                self.worker_configured.store(true, Ordering::Release);
                log::debug!("Configured engine worker at {}", worker_path);
            }
        }

        let engine = self.factory.instantiate().await?;
        self.load_count.fetch_add(1, Ordering::Relaxed);
        log::debug!("Loaded embedded engine (load #{})", self.load_count());
        *slot = Some(engine.clone());
        Ok(engine)
    }

    /// Drop the held handle so the next `load` re-acquires it
    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            log::debug!("Invalidated cached engine handle");
        }
    }

    /// Number of real loads performed so far
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::Relaxed)
    }
}
