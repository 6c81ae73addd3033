//! Archive manifest (`METADATA.bin`) loading.
//!
//! The manifest is a single `BackupMetadata` frame. Besides the data file
//! count it carries the modification time of every object the run captured,
//! which is what an incremental backup compares against.

use crate::codec::FrameCodec;
use crate::format::ArchivePaths;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::info;
use tsvault_core::{BackupMetadata, Container, ContainerType, Error, ObjectKey, Result};

/// Read the manifest of the archive in `dir`.
pub fn read_metadata(dir: impl AsRef<Path>, codec: &FrameCodec) -> Result<BackupMetadata> {
    let paths = ArchivePaths::from_root(dir);
    let path = paths.metadata();
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::format(format!("missing manifest {}", path.display())))
        }
        Err(e) => return Err(e.into()),
    };
    let frame = codec
        .read_frame(&mut BufReader::new(file))?
        .ok_or_else(|| Error::format(format!("empty manifest {}", path.display())))?;
    if frame.frame_type != ContainerType::BackupMetadata.code() {
        return Err(Error::format(format!(
            "unexpected manifest frame type {}",
            frame.frame_type
        )));
    }
    match Container::decode(frame.frame_type, &frame.content)? {
        Container::BackupMetadata(metadata) => Ok(metadata),
        other => Err(Error::format(format!(
            "manifest decoded as {}",
            other.container_type().name()
        ))),
    }
}

/// Modification times recorded by a previous archive.
#[derive(Debug, Clone, Default)]
pub struct IncrementalIndex {
    timestamps: HashMap<ObjectKey, i64>,
}

impl IncrementalIndex {
    /// Build an index from a manifest.
    pub fn from_metadata(metadata: &BackupMetadata) -> Self {
        IncrementalIndex {
            timestamps: metadata.timestamp_index(),
        }
    }

    /// Recorded modification time for `key`
    pub fn get(&self, key: &ObjectKey) -> Option<i64> {
        self.timestamps.get(key).copied()
    }

    /// Whether `key` was captured with exactly this modification time.
    pub fn is_unchanged(&self, key: &ObjectKey, mod_time_nanos: i64) -> bool {
        self.get(key) == Some(mod_time_nanos)
    }

    /// Number of recorded objects
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no objects are recorded
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Load the index an incremental backup compares against.
pub fn load_incremental_metadata(
    dir: impl AsRef<Path>,
    codec: &FrameCodec,
) -> Result<IncrementalIndex> {
    let dir = dir.as_ref();
    let metadata = read_metadata(dir, codec)?;
    let index = IncrementalIndex::from_metadata(&metadata);
    info!(
        base = %dir.display(),
        objects = index.len(),
        files = metadata.file_count,
        "Loaded incremental base"
    );
    Ok(index)
}
