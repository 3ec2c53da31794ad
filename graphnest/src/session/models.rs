// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session handles handed to exclusive tasks

use crate::error::{Error, Result};
use crate::host::{Connection, Database, EngineHandle, HostError, HostResult, WorkingFs};
use crate::result::QueryResult;
use std::sync::Arc;

/// File-level view of a mounted durable store
///
/// Handed to tasks that work on the database file directly (snapshot export
/// and import) without opening the database.
pub struct FileSession {
    fs: Arc<dyn WorkingFs>,
    work_dir: String,
    database_path: String,
}

impl FileSession {
    pub(crate) fn new(fs: Arc<dyn WorkingFs>, work_dir: String, database_path: String) -> Self {
        Self {
            fs,
            work_dir,
            database_path,
        }
    }

    pub fn fs(&self) -> &dyn WorkingFs {
        self.fs.as_ref()
    }

    pub fn work_dir(&self) -> &str {
        &self.work_dir
    }

    /// Path of the single backing database file
    pub fn database_path(&self) -> &str {
        &self.database_path
    }

    /// Push working changes to the durable store now, ahead of teardown
    pub async fn persist(&self) -> Result<()> {
        self.fs.sync(false).await?;
        Ok(())
    }
}

/// One exclusive database session: engine, database and connection
///
/// Owned by the task currently running inside the operation queue and torn
/// down (connection first, then database) when the task ends.
pub struct Session {
    files: FileSession,
    engine: EngineHandle,
    database: Option<Box<dyn Database>>,
    connection: Option<Box<dyn Connection>>,
}

impl Session {
    pub(crate) fn new(
        files: FileSession,
        engine: EngineHandle,
        database: Box<dyn Database>,
        connection: Box<dyn Connection>,
    ) -> Self {
        Self {
            files,
            engine,
            database: Some(database),
            connection: Some(connection),
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn files(&self) -> &FileSession {
        &self.files
    }

    /// Run a statement, reporting engine failures as query errors
    pub async fn query(&mut self, statement: &str) -> Result<QueryResult> {
        self.query_raw(statement).await.map_err(Error::query)
    }

    /// Run a statement and keep the host error as-is, for callers that
    /// classify failures themselves
    pub async fn query_raw(&mut self, statement: &str) -> HostResult<QueryResult> {
        log::debug!("Executing: {}", statement);
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| HostError::new("connection already closed"))?;
        connection.query(statement).await
    }

    pub(crate) fn into_parts(
        mut self,
    ) -> (
        Option<Box<dyn Connection>>,
        Option<Box<dyn Database>>,
        FileSession,
    ) {
        (self.connection.take(), self.database.take(), self.files)
    }
}
