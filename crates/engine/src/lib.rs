//! Backup engine for tsvault
//!
//! This crate drives the archive layer against live stores:
//! - Backup: concurrent object capture, key-value capture, manifest
//! - Restore: sequential replay with pool remapping
//! - Clear: wipe selected pools and the key-value store
//! - Inspect: read-only archive summary
//!
//! Stores are reached only through the `tsvault_core` store traits, and the
//! archive only through `tsvault_durability`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backup;
pub mod clear;
pub mod config;
pub mod context;
pub mod inspect;
pub mod pools;
pub mod restore;

pub use backup::{create_backup, BackupOptions, BackupReport};
pub use clear::{clear_stores, ClearReport};
pub use config::{BackupConfig, ConfigError, RestoreConfig};
pub use context::BackupContext;
pub use inspect::{inspect_archive, InspectReport, ManifestSummary};
pub use pools::{check_pools_exist, select_pools, PoolMap, PoolSelection};
pub use restore::{restore_backup, RestoreOptions, RestoreReport};
