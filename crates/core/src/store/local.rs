//! Stores backed by a local directory tree.
//!
//! Layout of a [`LocalObjectStore`] root:
//!
//! ```text
//! <root>/
//! └── <pool>/
//!     └── ns-<hex(namespace)>/
//!         └── obj-<hex(name)>      [content len u64 BE][MessagePack {content, xattrs, omap}]
//! ```
//!
//! Names are hex encoded so any namespace or object name, including the empty
//! namespace, maps to a valid file name. An object's modification time is the
//! file's mtime, and `stat` reads only the length prefix. A [`LocalKvStore`]
//! is a single MessagePack map file.
//!
//! All writes go through a uniquely named temp file + fsync + rename, so
//! concurrent writers never share a temp file.

use super::{KvListing, KvStore, ObjectStore, PoolHandle};
use crate::error::{Error, Result};
use crate::types::{KeyValue, ObjectKey, ObjectLocator, ObjectStat};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, warn};

const NAMESPACE_PREFIX: &str = "ns-";
const OBJECT_PREFIX: &str = "obj-";
const TEMP_PREFIX: &str = ".tmp-";
const SIZE_PREFIX_LEN: usize = 8;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LocalObjectRecord {
    #[serde(default, with = "crate::wire::bytes")]
    content: Vec<u8>,
    #[serde(default)]
    xattrs: BTreeMap<String, ByteBuf>,
    #[serde(default)]
    omap: BTreeMap<String, ByteBuf>,
}

impl LocalObjectRecord {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(SIZE_PREFIX_LEN + self.content.len());
        bytes.write_u64::<BigEndian>(self.content.len() as u64)?;
        rmp_serde::encode::write_named(&mut bytes, self)?;
        Ok(bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SIZE_PREFIX_LEN {
            return Err(Error::object_store("object record shorter than its size prefix"));
        }
        Ok(rmp_serde::from_slice(&bytes[SIZE_PREFIX_LEN..])?)
    }
}

/// Write a file atomically: unique temp file + fsync + rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn validate_pool_name(pool: &str) -> Result<()> {
    if pool.is_empty() || pool.starts_with('.') || pool.contains(['/', '\\']) {
        return Err(Error::invalid_operation(format!(
            "invalid pool name {:?}",
            pool
        )));
    }
    Ok(())
}

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(LocalObjectStore { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a pool if it does not exist
    pub fn create_pool(&self, pool: &str) -> Result<()> {
        validate_pool_name(pool)?;
        fs::create_dir_all(self.root.join(pool))?;
        debug!(pool, root = %self.root.display(), "Created local pool");
        Ok(())
    }
}

impl ObjectStore for LocalObjectStore {
    fn list_pools(&self) -> Result<Vec<String>> {
        let mut pools = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !name.starts_with('.') => pools.push(name),
                Ok(_) => {}
                Err(name) => warn!(?name, "Skipping pool directory with non UTF-8 name"),
            }
        }
        pools.sort();
        Ok(pools)
    }

    fn open_pool(&self, pool: &str) -> Result<Box<dyn PoolHandle>> {
        validate_pool_name(pool)?;
        let dir = self.root.join(pool);
        if !dir.is_dir() {
            return Err(Error::PoolNotFound(pool.to_string()));
        }
        Ok(Box::new(LocalPoolHandle {
            pool: pool.to_string(),
            dir,
        }))
    }
}

struct LocalPoolHandle {
    pool: String,
    dir: PathBuf,
}

impl LocalPoolHandle {
    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", NAMESPACE_PREFIX, hex::encode(namespace)))
    }

    fn object_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}{}", OBJECT_PREFIX, hex::encode(name)))
    }

    fn key(&self, namespace: &str, name: &str) -> ObjectKey {
        ObjectKey::new(&self.pool, namespace, name)
    }

    fn load(&self, namespace: &str, name: &str) -> Result<LocalObjectRecord> {
        match fs::read(self.object_path(namespace, name)) {
            Ok(bytes) => LocalObjectRecord::from_bytes(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::ObjectNotFound(self.key(namespace, name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(
        &self,
        namespace: &str,
        name: &str,
        f: impl FnOnce(&mut LocalObjectRecord),
    ) -> Result<()> {
        let mut record = match self.load(namespace, name) {
            Ok(record) => record,
            Err(Error::ObjectNotFound(_)) => LocalObjectRecord::default(),
            Err(e) => return Err(e),
        };
        f(&mut record);
        fs::create_dir_all(self.namespace_dir(namespace))?;
        let bytes = record.to_bytes()?;
        write_atomic(&self.object_path(namespace, name), &bytes)?;
        Ok(())
    }

    fn decode_entry_name(file_name: &str, prefix: &str) -> Option<String> {
        let encoded = file_name.strip_prefix(prefix)?;
        let raw = hex::decode(encoded).ok()?;
        String::from_utf8(raw).ok()
    }

    fn scan(&self) -> Result<Vec<ObjectLocator>> {
        let mut locators = Vec::new();
        for ns_entry in fs::read_dir(&self.dir)? {
            let ns_entry = ns_entry?;
            let ns_file_name = ns_entry.file_name().to_string_lossy().into_owned();
            let Some(namespace) = Self::decode_entry_name(&ns_file_name, NAMESPACE_PREFIX) else {
                warn!(pool = %self.pool, entry = %ns_file_name, "Skipping unrecognized entry in pool directory");
                continue;
            };
            for obj_entry in fs::read_dir(ns_entry.path())? {
                let obj_file_name = obj_entry?.file_name().to_string_lossy().into_owned();
                if obj_file_name.starts_with(TEMP_PREFIX) {
                    continue;
                }
                match Self::decode_entry_name(&obj_file_name, OBJECT_PREFIX) {
                    Some(name) => locators.push(ObjectLocator::new(namespace.clone(), name)),
                    None => {
                        warn!(pool = %self.pool, entry = %obj_file_name, "Skipping unrecognized entry in namespace directory")
                    }
                }
            }
        }
        locators.sort();
        Ok(locators)
    }
}

impl PoolHandle for LocalPoolHandle {
    fn pool(&self) -> &str {
        &self.pool
    }

    fn list_objects(&self) -> Result<Box<dyn Iterator<Item = Result<ObjectLocator>> + '_>> {
        Ok(Box::new(self.scan()?.into_iter().map(Ok)))
    }

    fn stat(&self, namespace: &str, name: &str) -> Result<ObjectStat> {
        let path = self.object_path(namespace, name);
        let mut file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ObjectNotFound(self.key(namespace, name)))
            }
            Err(e) => return Err(e.into()),
        };
        let mod_time_nanos = file
            .metadata()?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::object_store(format!("mtime before epoch for {}: {}", path.display(), e)))?
            .as_nanos() as i64;
        let size = file.read_u64::<BigEndian>().map_err(|e| {
            Error::object_store(format!("unreadable size prefix in {}: {}", path.display(), e))
        })?;
        Ok(ObjectStat {
            size,
            mod_time_nanos,
        })
    }

    fn read(&self, namespace: &str, name: &str, buf: &mut Vec<u8>, limit: usize) -> Result<usize> {
        let record = self.load(namespace, name)?;
        let n = record.content.len().min(limit);
        buf.clear();
        buf.extend_from_slice(&record.content[..n]);
        Ok(n)
    }

    fn xattrs(&self, namespace: &str, name: &str) -> Result<Vec<KeyValue>> {
        let record = self.load(namespace, name)?;
        Ok(record
            .xattrs
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v.into_vec()))
            .collect())
    }

    fn omap_values(
        &self,
        namespace: &str,
        name: &str,
        start_after: &str,
        limit: usize,
    ) -> Result<Vec<KeyValue>> {
        let record = self.load(namespace, name)?;
        let lower = if start_after.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(start_after)
        };
        Ok(record
            .omap
            .range::<str, _>((lower, Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| KeyValue::new(k.clone(), v.to_vec()))
            .collect())
    }

    fn write_full(&self, namespace: &str, name: &str, content: &[u8]) -> Result<()> {
        self.update(namespace, name, |record| record.content = content.to_vec())
    }

    fn set_xattr(&self, namespace: &str, name: &str, key: &str, value: &[u8]) -> Result<()> {
        self.update(namespace, name, |record| {
            record
                .xattrs
                .insert(key.to_string(), ByteBuf::from(value.to_vec()));
        })
    }

    fn set_omap(&self, namespace: &str, name: &str, entries: &[KeyValue]) -> Result<()> {
        self.update(namespace, name, |record| {
            for kv in entries {
                record
                    .omap
                    .insert(kv.key.clone(), ByteBuf::from(kv.value.clone()));
            }
        })
    }

    fn remove(&self, namespace: &str, name: &str) -> Result<()> {
        match fs::remove_file(self.object_path(namespace, name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::ObjectNotFound(self.key(namespace, name)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Key-value store persisted as one MessagePack map file.
#[derive(Debug)]
pub struct LocalKvStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalKvStore {
    /// Open (creating parent directories if needed) a store at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(LocalKvStore {
            path,
            lock: Mutex::new(()),
        })
    }

    fn load(&self) -> Result<BTreeMap<String, ByteBuf>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(rmp_serde::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, rows: &BTreeMap<String, ByteBuf>) -> Result<()> {
        let bytes = rmp_serde::to_vec(rows)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

impl KvStore for LocalKvStore {
    fn get_all(&self, prefix: &str) -> Result<KvListing> {
        let _guard = self.lock.lock();
        let rows = self
            .load()?
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| KeyValue::new(k, v.into_vec()))
            .collect();
        Ok(KvListing { rows, more: false })
    }

    fn put(&self, key: &str, value: &[u8], _timeout: Duration) -> Result<()> {
        let _guard = self.lock.lock();
        let mut rows = self.load()?;
        rows.insert(key.to_string(), ByteBuf::from(value.to_vec()));
        self.save(&rows)
    }

    fn delete_all(&self, prefix: &str) -> Result<u64> {
        let _guard = self.lock.lock();
        let mut rows = self.load()?;
        let before = rows.len();
        rows.retain(|k, _| !k.starts_with(prefix));
        let deleted = (before - rows.len()) as u64;
        if deleted > 0 {
            self.save(&rows)?;
        }
        Ok(deleted)
    }
}
