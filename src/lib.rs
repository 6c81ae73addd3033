//! tsvault - encrypted, sharded backups of an object store and a key-value store
//!
//! An archive is a directory of numbered data files plus a manifest. Every
//! file is a sequence of frames; each frame is Snappy-compressed, then
//! sealed with AES-256-GCM under a key derived from a passphrase.
//!
//! # Quick Start
//!
//! ```ignore
//! use tsvault::{create_backup, restore_backup, ArchiveKey, BackupOptions, RestoreOptions};
//! use tsvault::{MemoryKvStore, MemoryObjectStore, PoolMap};
//!
//! let key = ArchiveKey::derive("passphrase");
//! let objects = MemoryObjectStore::with_pools(["p1"]);
//! let kv = MemoryKvStore::new();
//!
//! create_backup(&key, &BackupOptions::new("backup.dir")
//!     .with_object_store(&objects)
//!     .with_kv_store(&kv))?;
//!
//! let target = MemoryObjectStore::with_pools(["p2"]);
//! restore_backup(&key, &RestoreOptions::new("backup.dir")
//!     .with_object_store(&target)
//!     .with_pool_map(PoolMap::default().with("p1", "p2")))?;
//! ```
//!
//! # Architecture
//!
//! - `tsvault-core`: container model, error type, store traits and stores
//! - `tsvault-durability`: frame codec, key derivation, sharded archive files
//! - `tsvault-engine`: backup, restore, clear and inspect

pub use tsvault_core::{
    BackupMetadata, CephObject, Container, ContainerType, Error, ErrorCategory, EtcdRecords,
    KeyValue, KvListing, KvStore, LocalKvStore, LocalObjectStore, MemoryKvStore,
    MemoryObjectStore, ObjectKey, ObjectLocator, ObjectStat, ObjectStore, PoolHandle, Result,
    MAX_OBJECT_SIZE,
};
pub use tsvault_durability::{ArchiveKey, ArchivePaths, FrameCodec, ShardConfig};
pub use tsvault_engine::{
    clear_stores, create_backup, inspect_archive, restore_backup, BackupConfig, BackupOptions,
    BackupReport, ClearReport, InspectReport, PoolMap, PoolSelection, RestoreConfig,
    RestoreOptions, RestoreReport,
};
