//! Clear: wipe live stores ahead of a restore.
//!
//! Only pools named explicitly are touched. The whole key space of the
//! key-value store is deleted.

use crate::pools::check_pools_exist;
use serde::Serialize;
use tracing::{debug, info};
use tsvault_core::{Error, KvStore, ObjectLocator, ObjectStore, Result};

/// Outcome of a clear run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    /// Pools emptied
    pub pools: Vec<String>,
    /// Objects deleted
    pub objects_deleted: u64,
    /// Key-value rows deleted
    pub kv_rows_deleted: u64,
}

/// Delete every object in `pools` and every key-value row.
///
/// `None` skips that store. Every pool must exist before anything is deleted.
pub fn clear_stores(
    object_store: Option<&dyn ObjectStore>,
    kv_store: Option<&dyn KvStore>,
    pools: &[String],
) -> Result<ClearReport> {
    if object_store.is_none() && kv_store.is_none() {
        return Err(Error::invalid_operation(
            "skipping both the object store and the key-value store leaves nothing to clear",
        ));
    }

    let mut report = ClearReport::default();
    if let Some(store) = object_store {
        check_pools_exist(&store.list_pools()?, pools)?;
        for pool in pools {
            let handle = store.open_pool(pool)?;
            // Collect first so deletion does not race the listing.
            let locators = handle.list_objects()?.collect::<Result<Vec<ObjectLocator>>>()?;
            for locator in locators {
                debug!(pool = %pool, namespace = %locator.namespace, name = %locator.name, "Deleting object");
                handle.remove(&locator.namespace, &locator.name)?;
                report.objects_deleted += 1;
            }
            info!(pool = %pool, "Pool cleared");
        }
        report.pools = pools.to_vec();
    }

    if let Some(kv) = kv_store {
        report.kv_rows_deleted = kv.delete_all("")?;
        info!(rows = report.kv_rows_deleted, "Key-value store cleared");
    }
    Ok(report)
}
