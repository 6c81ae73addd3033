//! Core types and traits for tsvault
//!
//! This crate defines the foundational types used throughout the system:
//! - ObjectKey / ObjectLocator / KeyValue: object and row addressing
//! - Container: typed archive payloads and their MessagePack encoding
//! - Error: error type hierarchy with coarse categories
//! - Store traits: ObjectStore, PoolHandle, KvStore plus memory and local implementations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod container;
pub mod error;
pub mod store;
pub mod types;
mod wire;

pub use container::{
    BackupMetadata, CephObject, Container, ContainerType, EtcdRecords, TimestampEntry,
    MAX_OBJECT_SIZE,
};
pub use error::{Error, ErrorCategory, Result};
pub use store::{
    KvListing, KvStore, LocalKvStore, LocalObjectStore, MemoryKvStore, MemoryObjectStore,
    ObjectSnapshot, ObjectStore, PoolHandle,
};
pub use types::{KeyValue, ObjectKey, ObjectLocator, ObjectStat};
