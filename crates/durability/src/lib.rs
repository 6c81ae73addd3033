//! Durability layer for tsvault
//!
//! This crate handles everything that touches archive files:
//!
//! - Key derivation: PBKDF2-HMAC-SHA3-512 passphrase to AES-256 key
//! - Frame codec: snappy + AES-256-GCM frames with a 32-byte header
//! - Archive layout: numbered data files, manifest, pool list
//! - Sharder: writer with file rollover, reader that spans files
//! - Manifest loading for incremental backups

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec; // Key derivation and the frame wire format
pub mod format; // Frame header and archive file layout
pub mod manifest; // METADATA.bin and incremental index
pub mod sharder; // Multi-file writer and reader

pub use codec::{ArchiveKey, Frame, FrameCodec, KEY_DERIVATION_ROUNDS};
pub use format::{ArchivePaths, FrameHeader, FRAME_HEADER_SIZE, FRAME_SENTINEL, MAX_CIPHERTEXT_LEN};
pub use manifest::{load_incremental_metadata, read_metadata, IncrementalIndex};
pub use sharder::{ShardConfig, ShardConfigError, ShardReader, ShardSummary, ShardWriter};
