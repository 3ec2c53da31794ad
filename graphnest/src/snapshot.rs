// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Snapshot codec
//!
//! A snapshot is the whole database file wrapped in a self-describing frame:
//!
//! ```text
//! ┌──────────────────┬──────────────────────────┬────────────────────┐
//! │ metadata length  │ metadata (UTF-8 JSON)    │ database file      │
//! │ u32 little-endian│ version, exportDate,     │ bytes, verbatim    │
//! │                  │ fileName, fileSize,      │                    │
//! │                  │ checksum                 │                    │
//! └──────────────────┴──────────────────────────┴────────────────────┘
//! ```
//!
//! The checksum is the sum of all payload bytes modulo 2^32. It catches
//! truncation and corruption, not tampering.

use crate::catalog::CatalogResolver;
use crate::error::{classify, Error, ErrorSignature, Result};
use crate::host::WorkingFs;
use crate::session::OperationQueue;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Width of the metadata length prefix
pub const LENGTH_PREFIX: usize = 4;

/// Snapshot header record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub version: u32,
    /// RFC 3339 export timestamp
    pub export_date: String,
    pub file_name: String,
    pub file_size: u64,
    pub checksum: u32,
}

/// A decoded, verified snapshot borrowing its payload from the frame
#[derive(Debug)]
pub struct DecodedSnapshot<'a> {
    pub metadata: SnapshotMetadata,
    pub payload: &'a [u8],
}

/// Sum of bytes modulo 2^32
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |sum, byte| sum.wrapping_add(u32::from(*byte)))
}

/// Frame `payload` with freshly built metadata
pub fn encode(file_name: &str, payload: &[u8], version: u32) -> Result<Vec<u8>> {
    let metadata = SnapshotMetadata {
        version,
        export_date: chrono::Utc::now().to_rfc3339(),
        file_name: file_name.to_string(),
        file_size: payload.len() as u64,
        checksum: checksum(payload),
    };
    encode_with(&metadata, payload)
}

/// Frame `payload` behind the given metadata, as-is
pub fn encode_with(metadata: &SnapshotMetadata, payload: &[u8]) -> Result<Vec<u8>> {
    let header = serde_json::to_vec(metadata)
        .map_err(|e| Error::Snapshot(format!("encoding metadata: {}", e)))?;
    let header_len = u32::try_from(header.len())
        .map_err(|_| Error::Snapshot("metadata too large".to_string()))?;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX + header.len() + payload.len());
    frame.extend_from_slice(&header_len.to_le_bytes());
    frame.extend_from_slice(&header);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Parse and verify a frame
///
/// Fails with `Error::Snapshot` for malformed frames, bad metadata or a
/// version newer than `max_version`, and with `Error::Integrity` when the
/// payload does not match the recorded size or checksum.
pub fn decode(frame: &[u8], max_version: u32) -> Result<DecodedSnapshot<'_>> {
    if frame.len() < LENGTH_PREFIX {
        return Err(Error::Snapshot(format!(
            "frame is {} bytes, shorter than its length prefix",
            frame.len()
        )));
    }
    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&frame[..LENGTH_PREFIX]);
    let header_len = u32::from_le_bytes(prefix) as usize;

    let header_end = LENGTH_PREFIX
        .checked_add(header_len)
        .filter(|end| *end <= frame.len())
        .ok_or_else(|| {
            Error::Snapshot(format!(
                "metadata length {} runs past the end of a {} byte frame",
                header_len,
                frame.len()
            ))
        })?;

    let metadata: SnapshotMetadata = serde_json::from_slice(&frame[LENGTH_PREFIX..header_end])
        .map_err(|e| Error::Snapshot(format!("invalid metadata: {}", e)))?;
    if metadata.version > max_version {
        return Err(Error::Snapshot(format!(
            "snapshot version {} is newer than supported version {}",
            metadata.version, max_version
        )));
    }

    let payload = &frame[header_end..];
    if payload.len() as u64 != metadata.file_size {
        return Err(Error::Integrity(format!(
            "payload is {} bytes but metadata records {}",
            payload.len(),
            metadata.file_size
        )));
    }
    let actual = checksum(payload);
    if actual != metadata.checksum {
        return Err(Error::Integrity(format!(
            "checksum mismatch: computed {}, recorded {}",
            actual, metadata.checksum
        )));
    }

    Ok(DecodedSnapshot { metadata, payload })
}

/// Export and import of the database file through the operation queue
pub struct SnapshotCodec {
    queue: Arc<OperationQueue>,
    resolver: Arc<CatalogResolver>,
}

impl SnapshotCodec {
    pub fn new(queue: Arc<OperationQueue>, resolver: Arc<CatalogResolver>) -> Self {
        Self { queue, resolver }
    }

    /// Read the database file and frame it
    pub async fn export(&self) -> Result<Vec<u8>> {
        let config = self.queue.config();
        let file_name = config.database_file.clone();
        let version = config.snapshot_version;

        let payload = self
            .queue
            .run_exclusive_files(|files| {
                async move {
                    let path = files.database_path();
                    match files.fs().read_file(path).await {
                        Ok(bytes) => Ok(bytes),
                        Err(e) if classify(&e) == ErrorSignature::NotFound => Err(
                            Error::Snapshot(format!("no database file at {} to export", path)),
                        ),
                        Err(e) => Err(e.into()),
                    }
                }
                .boxed()
            })
            .await?;

        let frame = encode(&file_name, &payload, version)?;
        log::info!(
            "Exported snapshot of {} ({} bytes, checksum {})",
            file_name,
            payload.len(),
            checksum(&payload)
        );
        Ok(frame)
    }

    /// Replace the database file with the payload of `frame`
    ///
    /// The frame is fully verified before the existing file is touched, and
    /// the file is overwritten in place, so a failed write leaves the old
    /// database in the store. The engine handle and the catalog support memo
    /// are invalidated whether or not the import went through.
    pub async fn import(&self, frame: &[u8]) -> Result<SnapshotMetadata> {
        let decoded = decode(frame, self.queue.config().snapshot_version)?;
        let metadata = decoded.metadata;
        let payload = decoded.payload.to_vec();

        let outcome = self
            .queue
            .run_exclusive_files(move |files| {
                async move {
                    let fs = files.fs();
                    let path = files.database_path();
                    fs.write_file(path, &payload).await?;
                    remove_if_present(fs, &format!("{}.wal", path)).await?;
                    files.persist().await
                }
                .boxed()
            })
            .await;

        self.queue.loader().invalidate().await;
        self.resolver.reset_support();
        if let Err(e) = outcome {
            log::error!("Importing snapshot {} failed: {}", metadata.file_name, e);
            return Err(e);
        }

        log::info!(
            "Imported snapshot {} ({} bytes, exported {})",
            metadata.file_name,
            metadata.file_size,
            metadata.export_date
        );
        Ok(metadata)
    }
}

async fn remove_if_present(fs: &dyn WorkingFs, path: &str) -> Result<()> {
    match fs.unlink(path).await {
        Ok(()) => Ok(()),
        Err(e) if classify(&e) == ErrorSignature::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
