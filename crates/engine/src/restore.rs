//! Restore: sequential replay of an archive into live stores.
//!
//! Objects go back under their original namespace and name, into the pool
//! their source pool is mapped to. Objects from unmapped pools are counted
//! and skipped. Key-value rows are written back one `put` at a time.

use crate::config::RestoreConfig;
use crate::pools::{check_pools_exist, PoolMap};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use tsvault_core::{
    CephObject, Container, EtcdRecords, Error, KvStore, ObjectStore, PoolHandle, Result,
};
use tsvault_durability::{ArchiveKey, FrameCodec, ShardReader};

/// Where to restore from and to.
pub struct RestoreOptions<'a> {
    /// Archive directory
    pub archive_dir: PathBuf,
    /// Object store to restore into, `None` to skip object containers
    pub object_store: Option<&'a dyn ObjectStore>,
    /// Key-value store to restore into, `None` to skip key-value containers
    pub kv_store: Option<&'a dyn KvStore>,
    /// Source pool to destination pool mapping
    pub pool_map: PoolMap,
    /// Restore parameters
    pub config: RestoreConfig,
}

impl<'a> RestoreOptions<'a> {
    /// Restore nothing yet from `archive_dir`.
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        RestoreOptions {
            archive_dir: archive_dir.into(),
            object_store: None,
            kv_store: None,
            pool_map: PoolMap::default(),
            config: RestoreConfig::default(),
        }
    }

    /// Restore objects into this store (builder pattern).
    pub fn with_object_store(mut self, store: &'a dyn ObjectStore) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Restore rows into this store (builder pattern).
    pub fn with_kv_store(mut self, store: &'a dyn KvStore) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Set the pool mapping (builder pattern).
    pub fn with_pool_map(mut self, pool_map: PoolMap) -> Self {
        self.pool_map = pool_map;
        self
    }

    /// Set restore parameters (builder pattern).
    pub fn with_config(mut self, config: RestoreConfig) -> Self {
        self.config = config;
        self
    }
}

/// Outcome of a restore run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Objects written to the object store
    pub objects_restored: u64,
    /// Objects skipped because their source pool has no mapping
    pub objects_skipped: u64,
    /// Key-value rows written
    pub kv_rows_restored: u64,
}

/// Replay an archive into the configured stores.
pub fn restore_backup(key: &ArchiveKey, options: &RestoreOptions<'_>) -> Result<RestoreReport> {
    options.config.validate()?;
    if options.object_store.is_none() && options.kv_store.is_none() {
        return Err(Error::invalid_operation(
            "skipping both the object store and the key-value store leaves nothing to restore",
        ));
    }
    if let Some(store) = options.object_store {
        check_pools_exist(&store.list_pools()?, &options.pool_map.destinations())?;
    }

    let reader = ShardReader::open(&options.archive_dir, FrameCodec::new(key))?;
    let mut restorer = Restorer {
        options,
        handles: HashMap::new(),
        report: RestoreReport::default(),
    };
    for container in reader {
        match container? {
            Container::CephObject(object) => restorer.restore_object(object)?,
            Container::EtcdRecords(records) => restorer.restore_rows(records)?,
            Container::BackupMetadata(_) => {
                return Err(Error::format("manifest frame found inside a data file"))
            }
        }
    }

    let report = restorer.report;
    info!(
        restored = report.objects_restored,
        skipped = report.objects_skipped,
        kv_rows = report.kv_rows_restored,
        "Restore complete"
    );
    Ok(report)
}

struct Restorer<'o, 'a> {
    options: &'o RestoreOptions<'a>,
    handles: HashMap<String, Box<dyn PoolHandle>>,
    report: RestoreReport,
}

impl Restorer<'_, '_> {
    fn restore_object(&mut self, object: CephObject) -> Result<()> {
        let Some(store) = self.options.object_store else {
            return Ok(());
        };
        let Some(destination) = self.options.pool_map.destination(&object.pool) else {
            self.report.objects_skipped += 1;
            return Ok(());
        };

        self.report.objects_restored += 1;
        let interval = self.options.config.progress_interval;
        if interval > 0 && self.report.objects_restored % interval == 0 {
            info!(
                restored = self.report.objects_restored,
                skipped = self.report.objects_skipped,
                "Restore progress"
            );
        }

        if !self.handles.contains_key(destination) {
            let handle = store.open_pool(destination)?;
            self.handles.insert(destination.to_string(), handle);
        }
        let handle = self
            .handles
            .get(destination)
            .ok_or_else(|| Error::PoolNotFound(destination.to_string()))?;

        let (namespace, name) = (&object.namespace, &object.name);
        if !object.content.is_empty() {
            handle.write_full(namespace, name, &object.content)?;
        }
        for kv in &object.xattrs {
            handle.set_xattr(namespace, name, &kv.key, &kv.value)?;
        }
        for kv in &object.omap {
            handle.set_omap(namespace, name, std::slice::from_ref(kv))?;
        }
        Ok(())
    }

    fn restore_rows(&mut self, records: EtcdRecords) -> Result<()> {
        let Some(kv) = self.options.kv_store else {
            return Ok(());
        };
        for row in &records.rows {
            kv.put(&row.key, &row.value, self.options.config.kv_put_timeout)?;
            self.report.kv_rows_restored += 1;
        }
        Ok(())
    }
}
