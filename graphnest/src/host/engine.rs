// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Embedded engine traits
//!
//! These traits describe the in-process graph engine as the session layer sees
//! it: an engine instance that exposes its working filesystem and opens
//! databases, databases that hand out connections, and connections that run
//! statements. Handles are closed by value so a closed handle cannot be reused.

use super::fs::{HostResult, WorkingFs};
use crate::result::QueryResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to a loaded engine instance
pub type EngineHandle = Arc<dyn Engine>;

/// Produces engine instances for the Module Loader
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Whether the current host can run the engine at all
    fn host_supported(&self) -> bool;

    /// One-time worker script configuration, called before the first load
    fn configure_worker(&self, worker_path: &str) -> HostResult<()>;

    /// Load and initialise a fresh engine instance
    async fn instantiate(&self) -> HostResult<EngineHandle>;
}

/// A loaded engine instance
#[async_trait]
pub trait Engine: Send + Sync {
    /// The engine's working filesystem
    fn fs(&self) -> Arc<dyn WorkingFs>;

    /// Open (or create) the database stored at `path`
    async fn open_database(&self, path: &str) -> HostResult<Box<dyn Database>>;
}

/// An open database
#[async_trait]
pub trait Database: Send {
    async fn connect(&mut self) -> HostResult<Box<dyn Connection>>;

    async fn close(self: Box<Self>) -> HostResult<()>;
}

/// A connection able to run statements
#[async_trait]
pub trait Connection: Send {
    async fn query(&mut self, statement: &str) -> HostResult<QueryResult>;

    async fn close(self: Box<Self>) -> HostResult<()>;
}
