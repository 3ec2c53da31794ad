// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory working filesystem with a simulated durable store
//!
//! `MemoryFs` keeps two views of the file tree: the working view the engine
//! reads and writes, and the durable view that survives unmounts. It reports
//! conditions the way the browser runtime does (emscripten errno numbering)
//! and records every lifecycle call in a journal so tests can assert ordering
//! and mount exclusivity.

use super::fs::{HostError, HostResult, WorkingFs};
use crate::error::errno;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Lifecycle call recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Mkdir(String),
    Mount(String),
    Unmount(String),
    Sync { populate: bool },
    Write(String),
    Unlink(String),
}

/// Operation a fault can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    Mkdir,
    Mount,
    Unmount,
    Sync,
    Write,
}

#[derive(Default)]
struct MemoryFsState {
    dirs: BTreeSet<String>,
    working: BTreeMap<String, Vec<u8>>,
    durable: BTreeMap<String, Vec<u8>>,
    mounts: BTreeSet<String>,
    max_active_mounts: usize,
    journal: Vec<FsEvent>,
    faults: VecDeque<(FsOp, HostError)>,
}

impl MemoryFsState {
    fn take_fault(&mut self, op: FsOp) -> Option<HostError> {
        let index = self.faults.iter().position(|(o, _)| *o == op)?;
        self.faults.remove(index).map(|(_, e)| e)
    }
}

/// In-memory `WorkingFs`
#[derive(Default)]
pub struct MemoryFs {
    state: Mutex<MemoryFsState>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mounts active right now
    pub fn active_mounts(&self) -> usize {
        self.state.lock().mounts.len()
    }

    /// Highest number of simultaneously active mounts ever observed
    pub fn max_active_mounts(&self) -> usize {
        self.state.lock().max_active_mounts
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.state.lock().mounts.contains(path)
    }

    /// Snapshot of the lifecycle journal
    pub fn journal(&self) -> Vec<FsEvent> {
        self.state.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    /// Make the next call of `op` fail with `error`
    pub fn inject_fault(&self, op: FsOp, error: HostError) {
        self.state.lock().faults.push_back((op, error));
    }

    /// Contents of a file in the durable store
    pub fn durable_file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().durable.get(path).cloned()
    }

    /// Place a file directly into the durable store
    pub fn put_durable_file(&self, path: &str, data: &[u8]) {
        self.state
            .lock()
            .durable
            .insert(path.to_string(), data.to_vec());
    }

    /// Simulate an already-active mount left behind by a previous page
    pub fn force_mount(&self, path: &str) {
        let mut state = self.state.lock();
        state.mounts.insert(path.to_string());
        state.max_active_mounts = state.max_active_mounts.max(state.mounts.len());
    }

    pub fn busy_error() -> HostError {
        HostError::new("Device or resource busy")
            .with_code("EBUSY")
            .with_errno(errno::EBUSY)
    }

    pub fn not_mounted_error() -> HostError {
        HostError::new("Invalid argument")
            .with_code("EINVAL")
            .with_errno(errno::EINVAL)
    }

    fn exists_error() -> HostError {
        HostError::new("File exists")
            .with_code("EEXIST")
            .with_errno(errno::EEXIST)
    }

    fn not_found_error(path: &str) -> HostError {
        HostError::new(format!("No such file or directory: {}", path))
            .with_code("ENOENT")
            .with_errno(errno::ENOENT)
    }
}

fn under(path: &str, mount: &str) -> bool {
    path == mount
        || path
            .strip_prefix(mount)
            .map_or(false, |rest| rest.starts_with('/'))
}

#[async_trait]
impl WorkingFs for MemoryFs {
    async fn mkdir(&self, path: &str) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if let Some(fault) = state.take_fault(FsOp::Mkdir) {
            return Err(fault);
        }
        if !state.dirs.insert(path.to_string()) {
            return Err(Self::exists_error());
        }
        state.journal.push(FsEvent::Mkdir(path.to_string()));
        Ok(())
    }

    async fn mount(&self, path: &str) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if let Some(fault) = state.take_fault(FsOp::Mount) {
            return Err(fault);
        }
        if state.mounts.contains(path) {
            return Err(Self::busy_error());
        }
        state.mounts.insert(path.to_string());
        state.max_active_mounts = state.max_active_mounts.max(state.mounts.len());
        state.journal.push(FsEvent::Mount(path.to_string()));
        Ok(())
    }

    async fn unmount(&self, path: &str) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if let Some(fault) = state.take_fault(FsOp::Unmount) {
            return Err(fault);
        }
        if !state.mounts.remove(path) {
            return Err(Self::not_mounted_error());
        }
        // Files under the mount point are only reachable while mounted.
        state.working.retain(|file, _| !under(file, path));
        state.journal.push(FsEvent::Unmount(path.to_string()));
        Ok(())
    }

    async fn sync(&self, populate: bool) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(fault) = state.take_fault(FsOp::Sync) {
            return Err(fault);
        }
        for mount in &state.mounts {
            let (from, to) = if populate {
                (&state.durable, &mut state.working)
            } else {
                (&state.working, &mut state.durable)
            };
            to.retain(|file, _| !under(file, mount));
            for (file, data) in from.iter().filter(|(f, _)| under(f, mount)) {
                to.insert(file.clone(), data.clone());
            }
        }
        state.journal.push(FsEvent::Sync { populate });
        Ok(())
    }

    async fn read_file(&self, path: &str) -> HostResult<Vec<u8>> {
        tokio::task::yield_now().await;
        self.state
            .lock()
            .working
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found_error(path))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if let Some(fault) = state.take_fault(FsOp::Write) {
            return Err(fault);
        }
        state.working.insert(path.to_string(), data.to_vec());
        state.journal.push(FsEvent::Write(path.to_string()));
        Ok(())
    }

    async fn unlink(&self, path: &str) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if state.working.remove(path).is_none() {
            return Err(Self::not_found_error(path));
        }
        state.journal.push(FsEvent::Unlink(path.to_string()));
        Ok(())
    }

    async fn exists(&self, path: &str) -> HostResult<bool> {
        tokio::task::yield_now().await;
        let state = self.state.lock();
        Ok(state.working.contains_key(path) || state.dirs.contains(path))
    }
}
