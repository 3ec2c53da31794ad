// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! GraphNest SDK - the public operation surface over the GraphNest session layer
//!
//! Collaborators such as a chat tool layer or a UI talk to the embedded
//! database through [`GraphNest`]. Each call is one exclusive session:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Callers (tool layer, UI)               │
//! └─────────────────────────────────────────┘
//!                  │
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │  GraphNest SDK (this crate)             │
//! │  - execute / list / describe / preview  │
//! │  - seed_demo / clear_all                │
//! │  - export / import snapshots            │
//! │  - TypedResult (deserialization)        │
//! └─────────────────────────────────────────┘
//!                  │
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │  GraphNest core (graphnest crate)       │
//! │  - OperationQueue + mount lifecycle     │
//! │  - CatalogResolver                      │
//! │  - StatementNormalizer                  │
//! │  - SnapshotCodec                        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - [`connection`] - the `GraphNest` handle and its operations
//! - [`result`] - typed access to query results
//! - [`seed`] - the fixed demo dataset
//! - [`error`] - error types

pub use graphnest::{
    ColumnDescriptor, QueryResult, Row, SessionConfig, SnapshotMetadata, TableDescriptor,
    TableKind,
};
pub use tokio_util::sync::CancellationToken;

pub mod connection;
pub mod error;
pub mod result;
pub mod seed;

pub use connection::GraphNest;
pub use error::{Error, Result};
pub use result::TypedResult;

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
