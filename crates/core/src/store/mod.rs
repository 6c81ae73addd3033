//! Store abstractions for the two backends an archive captures.
//!
//! The engine never talks to a cluster client directly. It talks to these
//! traits, which mirror the subset of the object-store and key-value store
//! client APIs that backup, restore and clear need:
//!
//! - [`ObjectStore`] lists pools and opens per-pool handles. Handles are not
//!   shared between threads; each backup worker opens its own.
//! - [`PoolHandle`] addresses objects by namespace and name inside one pool.
//! - [`KvStore`] lists, writes and deletes rows under a key prefix.
//!
//! Two implementations ship with the crate: [`memory`] (tests, reference
//! model) and [`local`] (a directory tree on disk).

pub mod local;
pub mod memory;

use crate::error::Result;
use crate::types::{KeyValue, ObjectLocator, ObjectStat};
use std::time::Duration;

pub use local::{LocalKvStore, LocalObjectStore};
pub use memory::{MemoryKvStore, MemoryObjectStore, ObjectSnapshot};

/// Object-store connection.
///
/// Thread safety: the connection is shared by every backup worker, so
/// implementations must be `Send + Sync`.
pub trait ObjectStore: Send + Sync {
    /// Names of all pools in the store.
    fn list_pools(&self) -> Result<Vec<String>>;

    /// Open a handle on one pool.
    ///
    /// # Errors
    ///
    /// Returns `Error::PoolNotFound` if the pool does not exist.
    fn open_pool(&self, pool: &str) -> Result<Box<dyn PoolHandle>>;
}

/// Handle on a single pool, valid across all of its namespaces.
pub trait PoolHandle: Send {
    /// Pool this handle addresses.
    fn pool(&self) -> &str;

    /// Every object in the pool, across all namespaces.
    fn list_objects(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectLocator>> + '_>>;

    /// Size and modification time of an object.
    fn stat(&self, namespace: &str, name: &str) -> Result<ObjectStat>;

    /// Read up to `limit` bytes of content into `buf`, replacing its contents.
    ///
    /// Returns the number of bytes read.
    fn read(&self, namespace: &str, name: &str, buf: &mut Vec<u8>, limit: usize) -> Result<usize>;

    /// All extended attributes of an object.
    fn xattrs(&self, namespace: &str, name: &str) -> Result<Vec<KeyValue>>;

    /// Up to `limit` omap entries with keys strictly after `start_after`,
    /// in key order.
    fn omap_values(
        &self,
        namespace: &str,
        name: &str,
        start_after: &str,
        limit: usize,
    ) -> Result<Vec<KeyValue>>;

    /// Replace the object's content, creating the object if needed.
    fn write_full(&self, namespace: &str, name: &str, content: &[u8]) -> Result<()>;

    /// Set one extended attribute, creating the object if needed.
    fn set_xattr(&self, namespace: &str, name: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Insert or overwrite omap entries, creating the object if needed.
    fn set_omap(&self, namespace: &str, name: &str, entries: &[KeyValue]) -> Result<()>;

    /// Delete an object.
    fn remove(&self, namespace: &str, name: &str) -> Result<()>;
}

/// Result of a single key-value listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvListing {
    /// Rows returned by this call
    pub rows: Vec<KeyValue>,
    /// The store holds more rows than were returned
    pub more: bool,
}

/// Key-value store connection.
pub trait KvStore: Send + Sync {
    /// List every row whose key starts with `prefix`.
    fn get_all(&self, prefix: &str) -> Result<KvListing>;

    /// Write one row, failing if the store does not acknowledge within `timeout`.
    fn put(&self, key: &str, value: &[u8], timeout: Duration) -> Result<()>;

    /// Delete every row whose key starts with `prefix`. Returns the number deleted.
    fn delete_all(&self, prefix: &str) -> Result<u64>;
}
