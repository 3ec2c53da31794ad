// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types and host error classification
//!
//! Host errors are classified by signature (text fragments, platform codes and
//! errno values) instead of identity: the engine surfaces the same condition
//! differently across builds.

use crate::host::HostError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Errno values as reported by the browser runtime (emscripten numbering)
pub mod errno {
    pub const EBUSY: i32 = 10;
    pub const EEXIST: i32 = 20;
    pub const EINVAL: i32 = 28;
    pub const ENOENT: i32 = 44;
}

/// Errors surfaced by the session layer
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Invoked outside a host able to run the engine
    #[error("Environment error: {0}")]
    Environment(String),

    /// Storage failure that could not be recovered locally
    #[error("Storage error: {0}")]
    Host(#[from] HostError),

    /// Query or data error reported by the engine
    #[error("Query error: {message}")]
    Query {
        message: String,
        hint: Option<String>,
    },

    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Snapshot payload failed verification
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Snapshot frame or metadata could not be decoded
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an engine error as a query error, attaching a remediation hint
    pub fn query(err: HostError) -> Self {
        let hint = remediation_hint(&err.message).map(str::to_string);
        Error::Query {
            message: err.message,
            hint,
        }
    }

    /// Remediation hint, for query errors that have one
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Query { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recognized host error conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSignature {
    /// Resource busy; worth one retry after a short backoff
    Busy,
    /// Unmount of a path that is not mounted
    NotMounted,
    /// Creation of something that already exists
    AlreadyExists,
    NotFound,
    /// The engine build lacks the requested call
    Unsupported,
    Other,
}

static UNSUPPORTED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(function|procedure|table function)\s+\S+\s+(does not exist|is not defined)",
        r"(?i)unknown (function|procedure)",
        r"(?i)not (yet )?supported",
        r"(?i)parser exception",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid unsupported call pattern"))
    .collect()
});

/// Classify a host error by its signature
pub fn classify(err: &HostError) -> ErrorSignature {
    let by_code = err.code.as_deref().and_then(|code| match code {
        "EBUSY" => Some(ErrorSignature::Busy),
        "EINVAL" => Some(ErrorSignature::NotMounted),
        "EEXIST" => Some(ErrorSignature::AlreadyExists),
        "ENOENT" => Some(ErrorSignature::NotFound),
        _ => None,
    });
    if let Some(signature) = by_code {
        return signature;
    }

    let by_errno = err.errno.and_then(|n| match n {
        errno::EBUSY => Some(ErrorSignature::Busy),
        errno::EINVAL => Some(ErrorSignature::NotMounted),
        errno::EEXIST => Some(ErrorSignature::AlreadyExists),
        errno::ENOENT => Some(ErrorSignature::NotFound),
        _ => None,
    });
    if let Some(signature) = by_errno {
        return signature;
    }

    let text = err.message.to_lowercase();
    if text.contains("busy") {
        ErrorSignature::Busy
    } else if text.contains("not mounted") || text.contains("not a mount point") {
        ErrorSignature::NotMounted
    } else if text.contains("already exists") || text.contains("file exists") {
        ErrorSignature::AlreadyExists
    } else if text.contains("no such file") {
        ErrorSignature::NotFound
    } else if UNSUPPORTED_PATTERNS.iter().any(|re| re.is_match(&err.message)) {
        ErrorSignature::Unsupported
    } else {
        ErrorSignature::Other
    }
}

static HINTS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (
            r"(?i)table\s+\S+\s+does not exist",
            "The table does not exist. List the tables to check the exact name, or create it first.",
        ),
        (
            r"(?i)(cannot find property|property\s+\S+\s+does not exist)",
            "The property is not part of the table schema. Describe the table to see its columns.",
        ),
        (
            r"(?i)(duplicat\w*\s+primary key|primary key.*already exists)",
            "Primary key values must be unique. Check for duplicates or leave the id out so it is assigned automatically.",
        ),
        (
            r"(?i)(no primary key|primary key.*(missing|required)|requires a primary key)",
            "Node tables need a primary key. Declare PRIMARY KEY(...) when creating the table.",
        ),
        (
            r"(?i)(conversion exception|cannot be converted|type mismatch|expected type)",
            "A value does not match the declared column type. Cast the value or adjust the schema.",
        ),
        (
            r"(?i)(delete|remove).*(connected|relationship|edges?)",
            "Nodes that still have relationships must be removed with DETACH DELETE.",
        ),
        (
            r"(?i)already exists",
            "An object with this name already exists. Drop it first or choose another name.",
        ),
        (
            r"(?i)(parser exception|syntax error|invalid input)",
            "The statement could not be parsed. Check keywords, brackets and quoting.",
        ),
    ]
    .iter()
    .map(|(pattern, hint)| (Regex::new(pattern).expect("valid hint pattern"), *hint))
    .collect()
});

/// Suggest a fix for a query error message
pub fn remediation_hint(message: &str) -> Option<&'static str> {
    HINTS
        .iter()
        .find(|(re, _)| re.is_match(message))
        .map(|(_, hint)| *hint)
}
