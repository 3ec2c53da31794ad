// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the SDK

use thiserror::Error;

/// SDK error
#[derive(Debug, Error)]
pub enum Error {
    /// Failure reported by the session layer
    #[error(transparent)]
    Core(#[from] graphnest::Error),

    /// A result had no row or column to read
    #[error("Not found: {0}")]
    NotFound(String),

    /// A result could not be converted into the requested type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Remediation hint attached to query errors
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Core(e) => e.hint(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Core(graphnest::Error::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
