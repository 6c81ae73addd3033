//! Sharder configuration.

/// Sharder configuration parameters.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    /// Soft cap on a data file's size in bytes (default: 2GiB).
    ///
    /// The writer moves to the next file before a frame that would push the
    /// current file past this size, unless the current file is still empty.
    pub max_file_size: u64,
}

impl Default for ShardConfig {
    fn default() -> Self {
        ShardConfig {
            max_file_size: 2 * 1024 * 1024 * 1024, // 2GiB
        }
    }
}

impl ShardConfig {
    /// Create a sharder configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum data file size (builder pattern).
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ShardConfigError> {
        if self.max_file_size < 1024 {
            return Err(ShardConfigError::FileSizeTooSmall);
        }
        Ok(())
    }

    /// Create a configuration optimized for testing (small files).
    pub fn for_testing() -> Self {
        ShardConfig {
            max_file_size: 64 * 1024, // 64KB for faster rollover in tests
        }
    }
}

/// Sharder configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardConfigError {
    /// Maximum file size is too small (minimum 1KB).
    #[error("Maximum archive file size must be at least 1KB")]
    FileSizeTooSmall,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShardConfig::default();
        assert_eq!(config.max_file_size, 2 * 1024 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = ShardConfig::new().with_max_file_size(512);
        assert_eq!(config.validate(), Err(ShardConfigError::FileSizeTooSmall));
        assert!(ShardConfig::new().with_max_file_size(1024).validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = ShardConfig::for_testing();
        assert!(config.validate().is_ok());
        assert!(config.max_file_size < ShardConfig::default().max_file_size);
    }
}
