//! Error types for tsvault
//!
//! A single error enum is shared by every crate in the workspace. Each variant
//! belongs to one [`ErrorCategory`], which is what callers match on when they
//! need to tell archive corruption apart from a store outage.

use crate::types::ObjectKey;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tsvault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Local filesystem failure
    Io,
    /// Malformed archive bytes (framing, encoding, unknown tags)
    Format,
    /// AEAD tag mismatch
    Authentication,
    /// Object store or key-value store failure
    Store,
    /// A rule of the engine was violated
    Policy,
}

/// Error types for archive, store and pipeline operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on archive files or local stores
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Container encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Archive bytes do not follow the frame or layout format
    #[error("Archive format error: {0}")]
    Format(String),

    /// Frame failed authenticated decryption
    #[error("wrong passphrase or corrupted archive")]
    Authentication,

    /// Frame carried a type code with no container variant
    #[error("Unknown container type code {0}")]
    UnknownContainer(u32),

    /// Object store client failure
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Key-value store client failure
    #[error("Key-value store error: {0}")]
    KvStore(String),

    /// The key-value store holds more rows than one listing returned
    #[error("Key-value store returned {returned} rows but reported more; paginated capture is not supported")]
    KvListingIncomplete {
        /// Rows delivered by the single listing call
        returned: usize,
    },

    /// Object does not exist in the store
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectKey),

    /// Pool does not exist in the object store
    #[error("Pool not found: {0}")]
    PoolNotFound(String),

    /// Object content exceeds the per-object size limit
    #[error("Object {key} holds at least {size} bytes, exceeding the {limit} byte limit")]
    ObjectTooLarge {
        /// The offending object
        key: ObjectKey,
        /// Bytes observed
        size: u64,
        /// Configured limit
        limit: u64,
    },

    /// Refusing to write an archive into a directory with existing entries
    #[error("Output directory {} already contains files", .0.display())]
    OutputNotEmpty(PathBuf),

    /// Invalid operation or argument combination
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an object store error
    pub fn object_store(msg: impl Into<String>) -> Self {
        Self::ObjectStore(msg.into())
    }

    /// Create a key-value store error
    pub fn kv_store(msg: impl Into<String>) -> Self {
        Self::KvStore(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// The category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io(_) => ErrorCategory::Io,
            Error::Serialization(_) | Error::Format(_) | Error::UnknownContainer(_) => {
                ErrorCategory::Format
            }
            Error::Authentication => ErrorCategory::Authentication,
            Error::ObjectStore(_) | Error::KvStore(_) | Error::ObjectNotFound(_) => {
                ErrorCategory::Store
            }
            Error::KvListingIncomplete { .. }
            | Error::PoolNotFound(_)
            | Error::ObjectTooLarge { .. }
            | Error::OutputNotEmpty(_)
            | Error::InvalidOperation(_) => ErrorCategory::Policy,
        }
    }

    /// True when the archive itself is damaged or the passphrase is wrong.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Format | ErrorCategory::Authentication
        )
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
