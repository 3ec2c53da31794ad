// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog resolution
//!
//! - `types`: table and column descriptors
//! - `cache`: the persisted fallback catalog
//! - `strategy`: the table discovery cascade and the support memo
//! - `resolver`: `CatalogResolver`, which runs discovery inside a session

pub mod cache;
pub mod resolver;
pub mod strategy;
pub mod types;

pub use cache::FallbackCatalogCache;
pub use resolver::{affected_tables, CatalogResolver};
pub use strategy::{
    default_strategies, CatalogStrategy, CatalogSupport, StrategyContext, Support, SupportKey,
};
pub use types::{ColumnDescriptor, TableDescriptor, TableKind};
