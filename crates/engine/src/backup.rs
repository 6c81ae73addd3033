//! Backup pipeline.
//!
//! # Stages
//!
//! ```text
//! scanner ──(work queue)──▶ fetch workers ×N ──(object queue)──▶ writer
//! ```
//!
//! - One scanner thread lists every object of every selected pool.
//! - N fetch workers stat, filter (incremental) and read objects. Each
//!   worker opens its own pool handles lazily and reuses one read buffer.
//! - The calling thread is the only writer to the archive.
//!
//! Both queues are bounded. The work queue receiver is shared by the workers
//! and is dropped when the last worker exits, so a scanner blocked on a full
//! queue always wakes up. Any stage error aborts the run; the first error is
//! returned once every thread has been joined.
//!
//! The key-value store is captured after the object store, then the manifest
//! is written.

use crate::config::BackupConfig;
use crate::context::BackupContext;
use crate::pools::{select_pools, PoolSelection};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};
use tsvault_core::{
    BackupMetadata, CephObject, Container, EtcdRecords, Error, KeyValue, KvStore, ObjectKey,
    ObjectStore, PoolHandle, Result,
};
use tsvault_durability::{load_incremental_metadata, ArchiveKey, FrameCodec, ShardWriter};

/// What to back up and where.
pub struct BackupOptions<'a> {
    /// Archive directory to create (must be empty or absent)
    pub output_dir: PathBuf,
    /// Object store to capture, `None` to skip it
    pub object_store: Option<&'a dyn ObjectStore>,
    /// Key-value store to capture, `None` to skip it
    pub kv_store: Option<&'a dyn KvStore>,
    /// Pools to capture from the object store
    pub pools: PoolSelection,
    /// Previous archive to compare modification times against
    pub incremental_over: Option<PathBuf>,
    /// Pipeline parameters
    pub config: BackupConfig,
}

impl<'a> BackupOptions<'a> {
    /// Back up nothing yet into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        BackupOptions {
            output_dir: output_dir.into(),
            object_store: None,
            kv_store: None,
            pools: PoolSelection::all(),
            incremental_over: None,
            config: BackupConfig::default(),
        }
    }

    /// Capture this object store (builder pattern).
    pub fn with_object_store(mut self, store: &'a dyn ObjectStore) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Capture this key-value store (builder pattern).
    pub fn with_kv_store(mut self, store: &'a dyn KvStore) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Restrict the pools captured (builder pattern).
    pub fn with_pools(mut self, pools: PoolSelection) -> Self {
        self.pools = pools;
        self
    }

    /// Skip objects unchanged since the archive in `dir` (builder pattern).
    pub fn incremental_over(mut self, dir: impl Into<PathBuf>) -> Self {
        self.incremental_over = Some(dir.into());
        self
    }

    /// Set pipeline parameters (builder pattern).
    pub fn with_config(mut self, config: BackupConfig) -> Self {
        self.config = config;
        self
    }
}

/// Outcome of a backup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    /// Pools captured
    pub pools: Vec<String>,
    /// Objects written to the archive
    pub objects_written: u64,
    /// Objects skipped because their mod time matched the incremental base
    pub objects_unchanged: u64,
    /// Key-value rows written
    pub kv_rows: u64,
    /// `EtcdRecords` containers written
    pub kv_batches: u64,
    /// Data files in the archive
    pub file_count: u32,
    /// Bytes written to data files
    pub bytes: u64,
}

/// Run a backup.
pub fn create_backup(key: &ArchiveKey, options: &BackupOptions<'_>) -> Result<BackupReport> {
    let config = &options.config;
    config.validate()?;
    if options.object_store.is_none() && options.kv_store.is_none() {
        return Err(Error::invalid_operation(
            "skipping both the object store and the key-value store leaves nothing to back up",
        ));
    }

    let codec = FrameCodec::new(key);
    let incremental = options
        .incremental_over
        .as_deref()
        .map(|dir| load_incremental_metadata(dir, &codec))
        .transpose()?;
    let pools = match options.object_store {
        Some(store) => select_pools(store, &options.pools)?,
        None => Vec::new(),
    };

    let mut writer = ShardWriter::new(&options.output_dir, codec, config.shard.clone())?;
    let ctx = BackupContext::new(incremental);
    let mut report = BackupReport {
        pools: pools.clone(),
        ..Default::default()
    };

    match options.object_store {
        Some(store) => {
            info!(pools = ?pools, incremental = ctx.is_incremental(), "Backing up object store");
            writer.write_pool_list(&pools)?;
            report.objects_written = capture_objects(store, &pools, &ctx, &mut writer, config)?;
            report.objects_unchanged = ctx.unchanged_count();
            info!(
                objects = report.objects_written,
                unchanged = report.objects_unchanged,
                "Object store capture complete"
            );
        }
        None => info!("Skipping object store backup"),
    }

    match options.kv_store {
        Some(kv) => {
            let (rows, batches) = capture_kv(kv, &mut writer, config)?;
            report.kv_rows = rows;
            report.kv_batches = batches;
        }
        None => info!("Skipping key-value store backup"),
    }

    let metadata = BackupMetadata::from_timestamps(writer.file_count(), ctx.take_timestamps());
    writer.write_meta(&Container::BackupMetadata(metadata))?;
    let summary = writer.finish()?;
    report.file_count = summary.file_count;
    report.bytes = summary.bytes;
    Ok(report)
}

/// Capture every object of `pools`. Returns the number of objects written.
fn capture_objects(
    store: &dyn ObjectStore,
    pools: &[String],
    ctx: &BackupContext,
    writer: &mut ShardWriter,
    config: &BackupConfig,
) -> Result<u64> {
    let written = thread::scope(|s| -> Result<u64> {
        let (work_tx, work_rx) = mpsc::sync_channel::<ObjectKey>(config.queue_depth);
        let (object_tx, object_rx) = mpsc::sync_channel::<CephObject>(config.queue_depth);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let scanner = thread::Builder::new()
            .name("tsvault-scan".to_string())
            .spawn_scoped(s, move || {
                if let Err(e) = scan_pools(store, pools, ctx, work_tx) {
                    ctx.fail(e);
                }
            })?;

        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let work_rx = Arc::clone(&work_rx);
            let object_tx = object_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("tsvault-fetch-{}", i))
                .spawn_scoped(s, move || fetch_worker(store, ctx, config, work_rx, object_tx));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    ctx.fail(e.into());
                    break;
                }
            }
        }
        // Only the workers may keep these alive.
        drop(work_rx);
        drop(object_tx);

        let written = match drain(writer, object_rx, ctx, config) {
            Ok(n) => n,
            Err(e) => {
                ctx.fail(e);
                0
            }
        };

        for handle in std::iter::once(scanner).chain(workers) {
            if let Err(payload) = handle.join() {
                std::panic::resume_unwind(payload);
            }
        }
        Ok(written)
    })?;

    match ctx.take_error() {
        Some(e) => Err(e),
        None => Ok(written),
    }
}

/// List every object of every pool into the work queue.
fn scan_pools(
    store: &dyn ObjectStore,
    pools: &[String],
    ctx: &BackupContext,
    work: SyncSender<ObjectKey>,
) -> Result<()> {
    for pool in pools {
        let handle = store.open_pool(pool)?;
        let mut listed = 0u64;
        for locator in handle.list_objects()? {
            if ctx.is_aborted() {
                return Ok(());
            }
            if work.send(locator?.into_key(pool)).is_err() {
                // Every worker is gone.
                return Ok(());
            }
            listed += 1;
        }
        debug!(pool = %pool, objects = listed, "Listed pool");
    }
    Ok(())
}

fn fetch_worker(
    store: &dyn ObjectStore,
    ctx: &BackupContext,
    config: &BackupConfig,
    work: Arc<Mutex<Receiver<ObjectKey>>>,
    objects: SyncSender<CephObject>,
) {
    let mut handles: HashMap<String, Box<dyn PoolHandle>> = HashMap::new();
    let mut buf = Vec::new();
    loop {
        if ctx.is_aborted() {
            return;
        }
        let next = work.lock().recv();
        let Ok(key) = next else {
            return;
        };
        match fetch_object(store, &mut handles, &mut buf, key, ctx, config) {
            Ok(Some(object)) => {
                if objects.send(object).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                ctx.fail(e);
                return;
            }
        }
    }
}

/// Fetch one object, or `None` when it is unchanged since the incremental base.
fn fetch_object(
    store: &dyn ObjectStore,
    handles: &mut HashMap<String, Box<dyn PoolHandle>>,
    buf: &mut Vec<u8>,
    key: ObjectKey,
    ctx: &BackupContext,
    config: &BackupConfig,
) -> Result<Option<CephObject>> {
    let handle = match handles.entry(key.pool.clone()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(store.open_pool(&key.pool)?),
    };

    let stat = handle.stat(&key.namespace, &key.name)?;
    if ctx.is_unchanged(&key, stat.mod_time_nanos) {
        ctx.note_unchanged();
        return Ok(None);
    }
    if stat.size > config.max_object_size {
        return Err(Error::ObjectTooLarge {
            key,
            size: stat.size,
            limit: config.max_object_size,
        });
    }
    ctx.record_timestamp(key.clone(), stat.mod_time_nanos);

    // One byte past the limit tells an object of exactly the limit apart from
    // one that grew since the stat.
    let n = handle.read(&key.namespace, &key.name, buf, config.max_object_size as usize + 1)?;
    if n as u64 > config.max_object_size {
        return Err(Error::ObjectTooLarge {
            key,
            size: n as u64,
            limit: config.max_object_size,
        });
    }
    let content = buf[..n].to_vec();
    let xattrs = handle.xattrs(&key.namespace, &key.name)?;
    let omap = read_omap(&**handle, &key.namespace, &key.name, config.omap_page_size)?;

    Ok(Some(CephObject {
        omap,
        xattrs,
        content,
        name: key.name,
        namespace: key.namespace,
        pool: key.pool,
    }))
}

/// Page through every omap entry of an object.
fn read_omap(
    handle: &dyn PoolHandle,
    namespace: &str,
    name: &str,
    page_size: usize,
) -> Result<Vec<KeyValue>> {
    let mut entries: Vec<KeyValue> = Vec::new();
    let mut start_after = String::new();
    loop {
        let page = handle.omap_values(namespace, name, &start_after, page_size)?;
        let page_len = page.len();
        let Some(last) = page.last() else {
            break;
        };
        if !entries.is_empty() && last.key <= start_after {
            return Err(Error::object_store(format!(
                "omap listing of {}/{}/{} did not advance past {:?}",
                handle.pool(),
                namespace,
                name,
                start_after
            )));
        }
        start_after = last.key.clone();
        entries.extend(page);
        if page_len < page_size {
            break;
        }
    }
    Ok(entries)
}

/// Write fetched objects to the archive in arrival order.
fn drain(
    writer: &mut ShardWriter,
    objects: Receiver<CephObject>,
    ctx: &BackupContext,
    config: &BackupConfig,
) -> Result<u64> {
    let mut written = 0u64;
    for object in objects.iter() {
        if ctx.is_aborted() {
            break;
        }
        writer.write(&Container::CephObject(object))?;
        written += 1;
        if config.progress_interval > 0 && written % config.progress_interval == 0 {
            info!(objects = written, files = writer.file_count(), "Backup progress");
        }
    }
    Ok(written)
}

/// Capture the whole key space in one listing. Returns `(rows, batches)`.
fn capture_kv(kv: &dyn KvStore, writer: &mut ShardWriter, config: &BackupConfig) -> Result<(u64, u64)> {
    let listing = kv.get_all("")?;
    if listing.more {
        return Err(Error::KvListingIncomplete {
            returned: listing.rows.len(),
        });
    }

    let total = listing.rows.len() as u64;
    let mut batches = 0u64;
    let mut rows = listing.rows.into_iter().peekable();
    while rows.peek().is_some() {
        let batch: Vec<KeyValue> = rows.by_ref().take(config.kv_batch_size).collect();
        writer.write(&Container::EtcdRecords(EtcdRecords::new(batch)))?;
        batches += 1;
    }
    info!(rows = total, batches, "Key-value capture complete");
    Ok((total, batches))
}
