// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! GraphNest - session layer for an embedded graph engine
//!
//! GraphNest fronts an in-process graph engine whose files live on a
//! page-durable block store. It loads the engine once, runs every operation
//! in an exclusive session over a mounted store, discovers the catalog across
//! engine builds, rewrites statements for dialect gaps and moves the database
//! file in and out as integrity-checked snapshots.
//!
//! # Features
//!
//! - **Single engine instance**: `ModuleLoader` loads once and can be invalidated
//! - **Exclusive sessions**: `OperationQueue` admits one session at a time, in
//!   FIFO order, with guaranteed teardown
//! - **Mount lifecycle**: mount/sync/unmount with one retry on busy resources
//! - **Catalog cascade**: introspection calls, a persisted fallback catalog and
//!   a label scan
//! - **Statement normalization**: date/time rewrites and automatic identifiers
//! - **Snapshots**: length-prefixed metadata, size and checksum verification
//!
//! The public operation surface lives in the `graphnest-sdk` crate.

pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod loader;
pub mod normalize;
pub mod result;
pub mod session;
pub mod snapshot;

pub use catalog::{CatalogResolver, ColumnDescriptor, FallbackCatalogCache, TableDescriptor, TableKind};
pub use config::{AutoIdConfig, SessionConfig};
pub use error::{Error, Result};
pub use loader::ModuleLoader;
pub use normalize::{quote_identifier, NormalizedStatement, StatementNormalizer};
pub use result::{QueryResult, Row};
pub use session::{FileSession, OperationQueue, Session};
pub use snapshot::{SnapshotCodec, SnapshotMetadata};

/// GraphNest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GraphNest crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
