// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Host abstractions
//!
//! The embedded engine and the page-durable storage layer live outside this
//! crate. This module defines the seams the session layer talks through:
//!
//! ```text
//! EngineFactory ──instantiate──▶ Engine ──open_database──▶ Database ──connect──▶ Connection
//!                                  │
//!                                  └──fs──▶ WorkingFs (mount / sync / unmount / files)
//!
//! KeyValueStore (fallback catalog persistence)
//! ```

pub mod engine;
pub mod fs;
pub mod kv;
pub mod memory;

pub use engine::{Connection, Database, Engine, EngineFactory, EngineHandle};
pub use fs::{HostError, HostResult, WorkingFs};
#[cfg(feature = "sled-backend")]
pub use kv::SledKeyValueStore;
pub use kv::{KeyValueStore, MemoryKeyValueStore};
pub use memory::{FsEvent, FsOp, MemoryFs};
