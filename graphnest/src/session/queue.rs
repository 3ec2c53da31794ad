// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Operation serializer
//!
//! Every filesystem-touching operation runs through `OperationQueue`. A fair
//! async mutex acts as the queue: callers are admitted in the order they
//! asked, one at a time, and each holds its turn across the whole session
//! lifecycle:
//!
//! ```text
//! load engine → mkdir → mount → sync(populate) → open db → connect
//!     → task
//! close connection → close db → sync(persist) → unmount
//! ```
//!
//! Teardown runs whatever the task did: returned an error, or panicked (the
//! panic is resumed after teardown). A failed task never blocks later ones.
//!
//! Once admitted, the lifecycle runs on its own spawned task that owns the
//! turn. Dropping the caller's future (a timeout, a `select!`, an aborted
//! task) detaches it but never skips teardown, and the next operation is
//! admitted only after that teardown finished.

use super::models::{FileSession, Session};
use super::mount::MountController;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::host::EngineHandle;
use crate::loader::ModuleLoader;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Counters describing queue activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// Sessions open right now (0 or 1)
    pub open_sessions: usize,
    /// Highest number of sessions ever open at once
    pub max_open_sessions: usize,
    /// Operations that ran to completion, successfully or not
    pub completed: u64,
}

pub struct OperationQueue {
    turn: Arc<Mutex<()>>,
    lifecycle: Arc<Lifecycle>,
}

/// State shared with the spawned session tasks
struct Lifecycle {
    loader: Arc<ModuleLoader>,
    config: Arc<SessionConfig>,
    open_sessions: AtomicUsize,
    max_open_sessions: AtomicUsize,
    completed: AtomicU64,
}

impl OperationQueue {
    pub fn new(loader: Arc<ModuleLoader>, config: Arc<SessionConfig>) -> Self {
        Self {
            turn: Arc::new(Mutex::new(())),
            lifecycle: Arc::new(Lifecycle {
                loader,
                config,
                open_sessions: AtomicUsize::new(0),
                max_open_sessions: AtomicUsize::new(0),
                completed: AtomicU64::new(0),
            }),
        }
    }

    pub fn loader(&self) -> &Arc<ModuleLoader> {
        &self.lifecycle.loader
    }

    pub fn config(&self) -> &SessionConfig {
        &self.lifecycle.config
    }

    pub fn stats(&self) -> QueueStats {
        let lifecycle = &self.lifecycle;
        QueueStats {
            open_sessions: lifecycle.open_sessions.load(Ordering::SeqCst),
            max_open_sessions: lifecycle.max_open_sessions.load(Ordering::SeqCst),
            completed: lifecycle.completed.load(Ordering::SeqCst),
        }
    }

    /// Run `task` with an exclusive database session
    pub async fn run_exclusive<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T>> + Send + 'static,
    {
        let turn = self.turn.clone().lock_owned().await;
        let lifecycle = self.lifecycle.clone();
        join(tokio::spawn(async move {
            let _turn = turn;
            lifecycle.database_session(task).await
        }))
        .await
    }

    /// Run `task` with the durable store mounted but no database open
    pub async fn run_exclusive_files<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: for<'s> FnOnce(&'s FileSession) -> BoxFuture<'s, Result<T>> + Send + 'static,
    {
        let turn = self.turn.clone().lock_owned().await;
        let lifecycle = self.lifecycle.clone();
        join(tokio::spawn(async move {
            let _turn = turn;
            lifecycle.file_session(task).await
        }))
        .await
    }
}

/// Wait for a session task, resuming its panic in the caller
async fn join<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            log::warn!("Session task did not finish: {}", e);
            Err(Error::Cancelled)
        }
    }
}

impl Lifecycle {
    async fn database_session<T, F>(&self, task: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T>>,
    {
        let engine = self.loader.load().await?;
        let mounts = MountController::new(engine.fs(), self.config.retry_backoff);
        let files = self.acquire(&engine, &mounts).await?;

        let mut session = match self.open_session(engine, files).await {
            Ok(session) => session,
            Err(e) => {
                self.abandon(&mounts).await;
                return Err(e);
            }
        };

        self.session_opened();
        let outcome = AssertUnwindSafe(task(&mut session)).catch_unwind().await;
        let teardown = self.close_session(session, &mounts).await;
        self.session_closed();

        settle(outcome, teardown)
    }

    async fn file_session<T, F>(&self, task: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s FileSession) -> BoxFuture<'s, Result<T>>,
    {
        let engine = self.loader.load().await?;
        let mounts = MountController::new(engine.fs(), self.config.retry_backoff);
        let files = self.acquire(&engine, &mounts).await?;

        self.session_opened();
        let outcome = AssertUnwindSafe(task(&files)).catch_unwind().await;
        let teardown = self.release(&mounts).await;
        self.session_closed();

        settle(outcome, teardown)
    }

    /// Ensure the working directory, mount and populate it
    async fn acquire(&self, engine: &EngineHandle, mounts: &MountController) -> Result<FileSession> {
        let work_dir = self.config.work_dir.as_str();
        mounts.ensure_directory(work_dir).await?;
        mounts.mount(work_dir).await?;
        if let Err(e) = mounts.sync(true).await {
            self.abandon(mounts).await;
            return Err(e);
        }
        Ok(FileSession::new(
            engine.fs(),
            work_dir.to_string(),
            self.config.database_path(),
        ))
    }

    async fn open_session(&self, engine: EngineHandle, files: FileSession) -> Result<Session> {
        let mut database = engine.open_database(files.database_path()).await?;
        match database.connect().await {
            Ok(connection) => Ok(Session::new(files, engine, database, connection)),
            Err(e) => {
                if let Err(close_err) = database.close().await {
                    log::warn!("Closing database after failed connect: {}", close_err);
                }
                Err(e.into())
            }
        }
    }

    async fn close_session(&self, session: Session, mounts: &MountController) -> Result<()> {
        let (connection, database, _files) = session.into_parts();
        let mut first_error = None;

        if let Some(connection) = connection {
            keep_first(
                &mut first_error,
                connection.close().await.map_err(Error::from),
                "close connection",
            );
        }
        if let Some(database) = database {
            keep_first(
                &mut first_error,
                database.close().await.map_err(Error::from),
                "close database",
            );
        }
        keep_first(&mut first_error, self.release(mounts).await, "release mount");

        first_error.map_or(Ok(()), Err)
    }

    /// Persist working changes, then unmount; both steps are always attempted
    async fn release(&self, mounts: &MountController) -> Result<()> {
        let mut first_error = None;
        keep_first(&mut first_error, mounts.sync(false).await, "persist");
        keep_first(
            &mut first_error,
            mounts.unmount(&self.config.work_dir).await,
            "unmount",
        );
        first_error.map_or(Ok(()), Err)
    }

    /// Unmount after a partial open; nothing was written, so nothing is persisted
    async fn abandon(&self, mounts: &MountController) {
        if let Err(e) = mounts.unmount(&self.config.work_dir).await {
            log::warn!("Unmount after failed session open: {}", e);
        }
    }

    fn session_opened(&self) {
        let open = self.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open_sessions.fetch_max(open, Ordering::SeqCst);
    }

    fn session_closed(&self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}

fn keep_first(slot: &mut Option<Error>, step: Result<()>, what: &str) {
    if let Err(e) = step {
        log::warn!("Session teardown step '{}' failed: {}", what, e);
        if slot.is_none() {
            *slot = Some(e);
        }
    }
}

/// Combine the task outcome with the teardown result
///
/// A task error wins over a teardown error; a teardown error is only reported
/// when the task itself succeeded.
fn settle<T>(outcome: std::thread::Result<Result<T>>, teardown: Result<()>) -> Result<T> {
    match outcome {
        Err(panic) => std::panic::resume_unwind(panic),
        Ok(Ok(value)) => teardown.map(|()| value),
        Ok(Err(e)) => Err(e),
    }
}
