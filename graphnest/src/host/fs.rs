// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Working filesystem trait and the host error type
//!
//! The working filesystem is the engine's view of files. A durable store can be
//! mounted at a path inside it, and `sync` moves data between the two.

use async_trait::async_trait;
use thiserror::Error;

/// Error raised by the host (engine runtime or storage layer)
///
/// The same condition may be reported differently across engine builds, so the
/// error keeps every signal the host gave us: the text, an optional platform
/// code (`EBUSY`, `EEXIST`, ...) and an optional numeric errno.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
    /// Human-readable message as reported by the host
    pub message: String,
    /// Platform error code, if any
    pub code: Option<String>,
    /// Numeric errno, if any
    pub errno: Option<i32>,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            errno: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Filesystem exposed by the engine runtime
///
/// Every method is a suspension point: the underlying engine or browser storage
/// layer answers asynchronously.
#[async_trait]
pub trait WorkingFs: Send + Sync {
    /// Create a directory. Fails if it already exists.
    async fn mkdir(&self, path: &str) -> HostResult<()>;

    /// Bind the durable store at `path`
    async fn mount(&self, path: &str) -> HostResult<()>;

    /// Release the durable store binding at `path`
    async fn unmount(&self, path: &str) -> HostResult<()>;

    /// `populate = true` pulls durable contents into the working view,
    /// `populate = false` pushes working changes out to the durable store.
    async fn sync(&self, populate: bool) -> HostResult<()>;

    async fn read_file(&self, path: &str) -> HostResult<Vec<u8>>;

    async fn write_file(&self, path: &str, data: &[u8]) -> HostResult<()>;

    async fn unlink(&self, path: &str) -> HostResult<()>;

    async fn exists(&self, path: &str) -> HostResult<bool>;
}
