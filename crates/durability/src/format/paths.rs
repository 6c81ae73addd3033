//! Archive directory structure
//!
//! An archive is a flat directory:
//!
//! ```text
//! archive/
//! ├── pools.txt          # Pools selected for the run (informational)
//! ├── ARCHIVE00000.bin   # Data files, read in index order
//! ├── ARCHIVE00001.bin
//! ├── ...
//! └── METADATA.bin       # Single BackupMetadata frame, written last
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Manifest file name
pub const METADATA_FILE_NAME: &str = "METADATA.bin";

/// Informational pool list file name
pub const POOL_LIST_FILE_NAME: &str = "pools.txt";

const DATA_FILE_PREFIX: &str = "ARCHIVE";
const DATA_FILE_SUFFIX: &str = ".bin";

/// File name of the data file at `index`, e.g. `ARCHIVE00003.bin`.
pub fn data_file_name(index: u32) -> String {
    format!("{}{:05}{}", DATA_FILE_PREFIX, index, DATA_FILE_SUFFIX)
}

/// Parse a data file name back to its index.
pub fn parse_data_file_index(name: &str) -> Option<u32> {
    let digits = name
        .strip_prefix(DATA_FILE_PREFIX)?
        .strip_suffix(DATA_FILE_SUFFIX)?;
    if digits.len() < 5 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Archive directory paths
#[derive(Debug, Clone)]
pub struct ArchivePaths {
    root: PathBuf,
}

impl ArchivePaths {
    /// Create paths from root directory
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        ArchivePaths {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the archive directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the data file at `index`
    pub fn data_file(&self, index: u32) -> PathBuf {
        self.root.join(data_file_name(index))
    }

    /// Path of the manifest
    pub fn metadata(&self) -> PathBuf {
        self.root.join(METADATA_FILE_NAME)
    }

    /// Path of the informational pool list
    pub fn pool_list(&self) -> PathBuf {
        self.root.join(POOL_LIST_FILE_NAME)
    }

    /// Whether a manifest exists
    pub fn has_metadata(&self) -> bool {
        self.metadata().is_file()
    }

    /// Create the directory if needed and check that it has no entries.
    ///
    /// Returns `false` when the directory already contains something.
    pub fn create_empty(&self) -> io::Result<bool> {
        std::fs::create_dir_all(&self.root)?;
        Ok(std::fs::read_dir(&self.root)?.next().is_none())
    }

    /// Indices of the data files present, sorted.
    pub fn list_data_files(&self) -> io::Result<Vec<u32>> {
        let mut indices = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(index) = parse_data_file_index(&entry.file_name().to_string_lossy()) {
                indices.push(index);
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }
}
