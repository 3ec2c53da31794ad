// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session lifecycle
//!
//! - `mount`: durable store mount/sync/unmount with busy retry
//! - `models`: the `Session` and `FileSession` handles given to tasks
//! - `queue`: the operation serializer that owns the lifecycle

pub mod models;
pub mod mount;
pub mod queue;

pub use models::{FileSession, Session};
pub use mount::MountController;
pub use queue::{OperationQueue, QueueStats};

use crate::error::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Checkpoint between the steps of a multi-step operation
pub fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
