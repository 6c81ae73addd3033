//! Inspect: read-only summary of an archive.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;
use tsvault_core::{Container, Error, Result};
use tsvault_durability::{read_metadata, ArchiveKey, ArchivePaths, FrameCodec, ShardReader};

/// What an archive holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    /// `CephObject` containers
    pub objects: u64,
    /// `EtcdRecords` containers
    pub kv_batches: u64,
    /// Key-value rows across all batches
    pub kv_rows: u64,
    /// Object content, xattr and omap bytes plus key-value row bytes
    pub payload_bytes: u64,
    /// Distinct source pools of the archived objects
    pub pools: BTreeSet<String>,
    /// Manifest contents, when the archive has one
    pub manifest: Option<ManifestSummary>,
}

/// Summary of `METADATA.bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestSummary {
    /// Data file count recorded by the backup run
    pub file_count: u32,
    /// Objects with a recorded modification time
    pub timestamps: usize,
}

/// Walk every container of the archive in `dir`.
///
/// A manifest that exists but cannot be read fails the walk.
pub fn inspect_archive(key: &ArchiveKey, dir: impl AsRef<Path>) -> Result<InspectReport> {
    let dir = dir.as_ref();
    let codec = FrameCodec::new(key);
    let manifest = if ArchivePaths::from_root(dir).has_metadata() {
        let metadata = read_metadata(dir, &codec)?;
        Some(ManifestSummary {
            file_count: metadata.file_count,
            timestamps: metadata.timestamps.len(),
        })
    } else {
        None
    };

    let mut report = InspectReport {
        manifest,
        ..Default::default()
    };
    for container in ShardReader::open(dir, codec)? {
        match container? {
            Container::CephObject(object) => {
                report.objects += 1;
                report.payload_bytes += object.payload_len() as u64;
                report.pools.insert(object.pool);
            }
            Container::EtcdRecords(records) => {
                report.kv_batches += 1;
                report.kv_rows += records.rows.len() as u64;
                report.payload_bytes += records
                    .rows
                    .iter()
                    .map(|kv| (kv.key.len() + kv.value.len()) as u64)
                    .sum::<u64>();
            }
            Container::BackupMetadata(_) => {
                return Err(Error::format("manifest frame found inside a data file"))
            }
        }
    }
    debug!(
        objects = report.objects,
        kv_rows = report.kv_rows,
        "Archive inspected"
    );
    Ok(report)
}
