// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Mount lifecycle controller
//!
//! Keeps at most one durable-store mount active for the working directory.
//! Busy conditions get exactly one retry after a fixed backoff; "already
//! exists" and "not mounted" are treated as success where they are benign.

use crate::error::{classify, ErrorSignature, Result};
use crate::host::{HostResult, WorkingFs};
use std::sync::Arc;
use std::time::Duration;

pub struct MountController {
    fs: Arc<dyn WorkingFs>,
    backoff: Duration,
}

impl MountController {
    pub fn new(fs: Arc<dyn WorkingFs>, backoff: Duration) -> Self {
        Self { fs, backoff }
    }

    /// Create `path` unless it already exists
    pub async fn ensure_directory(&self, path: &str) -> Result<()> {
        match self.fs.mkdir(path).await {
            Ok(()) => Ok(()),
            Err(e) if classify(&e) == ErrorSignature::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Mount the durable store at `path`
    ///
    /// A stale mount is released first. If mounting still reports busy, wait
    /// the backoff, force an unmount and try once more.
    pub async fn mount(&self, path: &str) -> Result<()> {
        self.release_quietly(path).await?;

        match self.fs.mount(path).await {
            Ok(()) => {
                log::debug!("Mounted durable store at {}", path);
                Ok(())
            }
            Err(e) if classify(&e) == ErrorSignature::Busy => {
                log::warn!(
                    "Mount of {} reported busy ({}), retrying in {:?}",
                    path,
                    e,
                    self.backoff
                );
                tokio::time::sleep(self.backoff).await;
                self.release_quietly(path).await?;
                self.fs.mount(path).await?;
                log::debug!("Mounted durable store at {} after retry", path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `true` pulls the durable store into the working view, `false` pushes
    /// working changes out
    pub async fn sync(&self, populate: bool) -> Result<()> {
        self.fs.sync(populate).await?;
        log::debug!(
            "Synced durable store ({})",
            if populate { "populate" } else { "persist" }
        );
        Ok(())
    }

    /// Unmount `path`; "not mounted" counts as success and busy is retried once
    pub async fn unmount(&self, path: &str) -> Result<()> {
        match self.try_unmount(path).await {
            Ok(()) => Ok(()),
            Err(e) if classify(&e) == ErrorSignature::Busy => {
                log::warn!(
                    "Unmount of {} reported busy ({}), retrying in {:?}",
                    path,
                    e,
                    self.backoff
                );
                tokio::time::sleep(self.backoff).await;
                Ok(self.try_unmount(path).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn try_unmount(&self, path: &str) -> HostResult<()> {
        match self.fs.unmount(path).await {
            Ok(()) => {
                log::debug!("Unmounted durable store at {}", path);
                Ok(())
            }
            Err(e) if classify(&e) == ErrorSignature::NotMounted => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Defensive unmount before mounting: "not mounted" and busy are both
    /// tolerated here since the mount attempt that follows decides the outcome
    async fn release_quietly(&self, path: &str) -> Result<()> {
        match self.try_unmount(path).await {
            Ok(()) => Ok(()),
            Err(e) if classify(&e) == ErrorSignature::Busy => {
                log::debug!("Pre-mount unmount of {} reported busy: {}", path, e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
