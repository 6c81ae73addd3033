//! Backup and restore configuration.

use std::time::Duration;
use tsvault_core::MAX_OBJECT_SIZE;
use tsvault_durability::{ShardConfig, ShardConfigError};

/// Backup pipeline parameters.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Object fetch workers (default: 8).
    pub workers: usize,

    /// Depth of both bounded queues: scanner to workers and workers to
    /// writer (default: 50).
    pub queue_depth: usize,

    /// Omap entries requested per page (default: 1000).
    pub omap_page_size: usize,

    /// Key-value rows per `EtcdRecords` container (default: 100).
    pub kv_batch_size: usize,

    /// Objects between progress log lines (default: 1000).
    pub progress_interval: u64,

    /// Largest object content accepted (default and ceiling: 50MiB).
    pub max_object_size: u64,

    /// Archive file layout.
    pub shard: ShardConfig,
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            workers: 8,
            queue_depth: 50,
            omap_page_size: 1000,
            kv_batch_size: 100,
            progress_interval: 1000,
            max_object_size: MAX_OBJECT_SIZE,
            shard: ShardConfig::default(),
        }
    }
}

impl BackupConfig {
    /// Create a backup configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set worker count (builder pattern).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set queue depth (builder pattern).
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Set omap page size (builder pattern).
    pub fn with_omap_page_size(mut self, size: usize) -> Self {
        self.omap_page_size = size;
        self
    }

    /// Set key-value batch size (builder pattern).
    pub fn with_kv_batch_size(mut self, size: usize) -> Self {
        self.kv_batch_size = size;
        self
    }

    /// Set progress log interval (builder pattern).
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set maximum object size (builder pattern).
    pub fn with_max_object_size(mut self, size: u64) -> Self {
        self.max_object_size = size;
        self
    }

    /// Set archive file layout (builder pattern).
    pub fn with_shard(mut self, shard: ShardConfig) -> Self {
        self.shard = shard;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::ZeroQueueDepth);
        }
        if self.omap_page_size == 0 {
            return Err(ConfigError::ZeroOmapPageSize);
        }
        if self.kv_batch_size == 0 {
            return Err(ConfigError::ZeroKvBatchSize);
        }
        if self.max_object_size == 0 || self.max_object_size > MAX_OBJECT_SIZE {
            return Err(ConfigError::ObjectSizeOutOfRange(self.max_object_size));
        }
        self.shard.validate()?;
        Ok(())
    }

    /// Create a configuration optimized for testing (small queues, pages
    /// and files so that every boundary is crossed).
    pub fn for_testing() -> Self {
        BackupConfig {
            workers: 3,
            queue_depth: 2,
            omap_page_size: 3,
            kv_batch_size: 4,
            progress_interval: 5,
            max_object_size: MAX_OBJECT_SIZE,
            shard: ShardConfig::for_testing(),
        }
    }
}

/// Restore parameters.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Timeout applied to each key-value `put` (default: 30s).
    pub kv_put_timeout: Duration,

    /// Restored objects between progress log lines (default: 200).
    pub progress_interval: u64,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        RestoreConfig {
            kv_put_timeout: Duration::from_secs(30),
            progress_interval: 200,
        }
    }
}

impl RestoreConfig {
    /// Create a restore configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set per-put timeout (builder pattern).
    pub fn with_kv_put_timeout(mut self, timeout: Duration) -> Self {
        self.kv_put_timeout = timeout;
        self
    }

    /// Set progress log interval (builder pattern).
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kv_put_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No fetch workers configured.
    #[error("Backup needs at least one worker")]
    ZeroWorkers,

    /// Queue depth of zero.
    #[error("Queue depth must be at least 1")]
    ZeroQueueDepth,

    /// Omap page size of zero.
    #[error("Omap page size must be at least 1")]
    ZeroOmapPageSize,

    /// Key-value batch size of zero.
    #[error("Key-value batch size must be at least 1")]
    ZeroKvBatchSize,

    /// Object size limit outside `1..=MAX_OBJECT_SIZE`.
    #[error("Maximum object size {0} must be between 1 and 50MiB")]
    ObjectSizeOutOfRange(u64),

    /// Zero timeout for key-value writes.
    #[error("Key-value put timeout must be non-zero")]
    ZeroTimeout,

    /// Invalid archive layout.
    #[error(transparent)]
    Shard(#[from] ShardConfigError),
}

impl From<ConfigError> for tsvault_core::Error {
    fn from(e: ConfigError) -> Self {
        tsvault_core::Error::invalid_operation(e.to_string())
    }
}
