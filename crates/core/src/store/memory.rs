//! In-memory stores.
//!
//! Reference model of both backends, used by the test suites. Every mutation
//! advances a logical clock that becomes the object's modification time, and
//! content reads are counted so tests can prove that an object was not
//! re-fetched.

use super::{KvListing, KvStore, ObjectStore, PoolHandle};
use crate::error::{Error, Result};
use crate::types::{KeyValue, ObjectKey, ObjectLocator, ObjectStat};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Logical clock origin for object modification times
const CLOCK_START: i64 = 1_600_000_000_000_000_000;

#[derive(Debug, Clone, Default)]
struct MemoryObject {
    content: Vec<u8>,
    xattrs: BTreeMap<String, Vec<u8>>,
    omap: BTreeMap<String, Vec<u8>>,
    mod_time_nanos: i64,
}

/// Objects of one pool keyed by (namespace, name)
type PoolObjects = BTreeMap<(String, String), MemoryObject>;

#[derive(Debug, Default)]
struct MemoryState {
    pools: BTreeMap<String, PoolObjects>,
    clock: i64,
}

impl MemoryState {
    fn tick(&mut self) -> i64 {
        if self.clock == 0 {
            self.clock = CLOCK_START;
        }
        self.clock += 1;
        self.clock
    }
}

/// Copy of one stored object, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSnapshot {
    /// Object content
    pub content: Vec<u8>,
    /// Extended attributes in key order
    pub xattrs: Vec<KeyValue>,
    /// Omap entries in key order
    pub omap: Vec<KeyValue>,
    /// Modification time
    pub mod_time_nanos: i64,
}

/// In-memory object store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    state: Arc<RwLock<MemoryState>>,
    content_reads: Arc<AtomicU64>,
    mutations: Arc<AtomicU64>,
}

impl MemoryObjectStore {
    /// Create an empty store with no pools
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given (empty) pools
    pub fn with_pools<I, S>(pools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for pool in pools {
            store.create_pool(pool);
        }
        store
    }

    /// Create a pool if it does not exist
    pub fn create_pool(&self, pool: impl Into<String>) {
        self.state.write().pools.entry(pool.into()).or_default();
    }

    /// Store a complete object, replacing any existing one.
    ///
    /// Returns the modification time assigned to it.
    pub fn put_object(
        &self,
        key: &ObjectKey,
        content: &[u8],
        xattrs: &[KeyValue],
        omap: &[KeyValue],
    ) -> Result<i64> {
        let mut state = self.state.write();
        let mod_time_nanos = state.tick();
        let objects = state
            .pools
            .get_mut(&key.pool)
            .ok_or_else(|| Error::PoolNotFound(key.pool.clone()))?;
        objects.insert(
            (key.namespace.clone(), key.name.clone()),
            MemoryObject {
                content: content.to_vec(),
                xattrs: xattrs.iter().map(|kv| (kv.key.clone(), kv.value.clone())).collect(),
                omap: omap.iter().map(|kv| (kv.key.clone(), kv.value.clone())).collect(),
                mod_time_nanos,
            },
        );
        Ok(mod_time_nanos)
    }

    /// Overwrite an object's modification time without touching its data
    pub fn set_mod_time(&self, key: &ObjectKey, mod_time_nanos: i64) -> Result<()> {
        let mut state = self.state.write();
        let object = state
            .pools
            .get_mut(&key.pool)
            .and_then(|objects| objects.get_mut(&(key.namespace.clone(), key.name.clone())))
            .ok_or_else(|| Error::ObjectNotFound(key.clone()))?;
        object.mod_time_nanos = mod_time_nanos;
        Ok(())
    }

    /// Copy of an object, if it exists
    pub fn object(&self, key: &ObjectKey) -> Option<ObjectSnapshot> {
        let state = self.state.read();
        let object = state
            .pools
            .get(&key.pool)?
            .get(&(key.namespace.clone(), key.name.clone()))?;
        Some(ObjectSnapshot {
            content: object.content.clone(),
            xattrs: to_key_values(&object.xattrs),
            omap: to_key_values(&object.omap),
            mod_time_nanos: object.mod_time_nanos,
        })
    }

    /// Number of objects in a pool (0 if the pool does not exist)
    pub fn object_count(&self, pool: &str) -> usize {
        self.state.read().pools.get(pool).map_or(0, |objects| objects.len())
    }

    /// Number of content reads served so far
    pub fn content_reads(&self) -> u64 {
        self.content_reads.load(Ordering::SeqCst)
    }

    /// Number of mutating handle calls served so far
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }
}

fn to_key_values(map: &BTreeMap<String, Vec<u8>>) -> Vec<KeyValue> {
    map.iter()
        .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
        .collect()
}

impl ObjectStore for MemoryObjectStore {
    fn list_pools(&self) -> Result<Vec<String>> {
        Ok(self.state.read().pools.keys().cloned().collect())
    }

    fn open_pool(&self, pool: &str) -> Result<Box<dyn PoolHandle>> {
        if !self.state.read().pools.contains_key(pool) {
            return Err(Error::PoolNotFound(pool.to_string()));
        }
        Ok(Box::new(MemoryPoolHandle {
            pool: pool.to_string(),
            store: self.clone(),
        }))
    }
}

struct MemoryPoolHandle {
    pool: String,
    store: MemoryObjectStore,
}

impl MemoryPoolHandle {
    fn with_object<T>(
        &self,
        namespace: &str,
        name: &str,
        f: impl FnOnce(&MemoryObject) -> T,
    ) -> Result<T> {
        let state = self.store.state.read();
        let objects = state
            .pools
            .get(&self.pool)
            .ok_or_else(|| Error::PoolNotFound(self.pool.clone()))?;
        objects
            .get(&(namespace.to_string(), name.to_string()))
            .map(f)
            .ok_or_else(|| Error::ObjectNotFound(ObjectKey::new(&self.pool, namespace, name)))
    }

    fn mutate(&self, namespace: &str, name: &str, f: impl FnOnce(&mut MemoryObject)) -> Result<()> {
        let mut state = self.store.state.write();
        let now = state.tick();
        let objects = state
            .pools
            .get_mut(&self.pool)
            .ok_or_else(|| Error::PoolNotFound(self.pool.clone()))?;
        let object = objects
            .entry((namespace.to_string(), name.to_string()))
            .or_default();
        f(object);
        object.mod_time_nanos = now;
        self.store.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PoolHandle for MemoryPoolHandle {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn list_objects(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectLocator>> + '_>> {
        let state = self.store.state.read();
        let objects = state
            .pools
            .get(&self.pool)
            .ok_or_else(|| Error::PoolNotFound(self.pool.clone()))?;
        let locators: Vec<ObjectLocator> = objects
            .keys()
            .map(|(ns, name)| ObjectLocator::new(ns.clone(), name.clone()))
            .collect();
        Ok(Box::new(locators.into_iter().map(Ok)))
    }

    fn stat(&self, namespace: &str, name: &str) -> Result<ObjectStat> {
        self.with_object(namespace, name, |object| ObjectStat {
            size: object.content.len() as u64,
            mod_time_nanos: object.mod_time_nanos,
        })
    }

    fn read(&self, namespace: &str, name: &str, buf: &mut Vec<u8>, limit: usize) -> Result<usize> {
        let n = self.with_object(namespace, name, |object| {
            let n = object.content.len().min(limit);
            buf.clear();
            buf.extend_from_slice(&object.content[..n]);
            n
        })?;
        self.store.content_reads.fetch_add(1, Ordering::SeqCst);
        Ok(n)
    }

    fn xattrs(&self, namespace: &str, name: &str) -> Result<Vec<KeyValue>> {
        self.with_object(namespace, name, |object| to_key_values(&object.xattrs))
    }

    fn omap_values(
        &self,
        namespace: &str,
        name: &str,
        start_after: &str,
        limit: usize,
    ) -> Result<Vec<KeyValue>> {
        self.with_object(namespace, name, |object| {
            let lower = if start_after.is_empty() {
                Bound::Unbounded
            } else {
                Bound::Excluded(start_after)
            };
            object
                .omap
                .range::<str, _>((lower, Bound::Unbounded))
                .take(limit)
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
                .collect()
        })
    }

    fn write_full(&self, namespace: &str, name: &str, content: &[u8]) -> Result<()> {
        self.mutate(namespace, name, |object| object.content = content.to_vec())
    }

    fn set_xattr(&self, namespace: &str, name: &str, key: &str, value: &[u8]) -> Result<()> {
        self.mutate(namespace, name, |object| {
            object.xattrs.insert(key.to_string(), value.to_vec());
        })
    }

    fn set_omap(&self, namespace: &str, name: &str, entries: &[KeyValue]) -> Result<()> {
        self.mutate(namespace, name, |object| {
            for kv in entries {
                object.omap.insert(kv.key.clone(), kv.value.clone());
            }
        })
    }

    fn remove(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.store.state.write();
        let objects = state
            .pools
            .get_mut(&self.pool)
            .ok_or_else(|| Error::PoolNotFound(self.pool.clone()))?;
        objects
            .remove(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| Error::ObjectNotFound(ObjectKey::new(&self.pool, namespace, name)))?;
        self.store.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    rows: RwLock<BTreeMap<String, Vec<u8>>>,
    listing_limit: Option<usize>,
    puts: AtomicU64,
}

impl MemoryKvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the given rows
    pub fn with_rows<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        let store = Self::new();
        {
            let mut map = store.rows.write();
            for (k, v) in rows {
                map.insert(k.into(), v.into());
            }
        }
        store
    }

    /// Cap the rows returned by one `get_all` call, reporting `more` beyond it
    pub fn with_listing_limit(mut self, limit: usize) -> Self {
        self.listing_limit = Some(limit);
        self
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.rows.read().get(key).cloned()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// True if the store holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Number of `put` calls served so far
    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }
}

impl KvStore for MemoryKvStore {
    fn get_all(&self, prefix: &str) -> Result<KvListing> {
        let rows = self.rows.read();
        let mut matching = rows
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()));
        let limit = self.listing_limit.unwrap_or(usize::MAX);
        let listed: Vec<KeyValue> = matching.by_ref().take(limit).collect();
        let more = matching.next().is_some();
        Ok(KvListing { rows: listed, more })
    }

    fn put(&self, key: &str, value: &[u8], _timeout: Duration) -> Result<()> {
        self.rows.write().insert(key.to_string(), value.to_vec());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete_all(&self, prefix: &str) -> Result<u64> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|k, _| !k.starts_with(prefix));
        Ok((before - rows.len()) as u64)
    }
}
