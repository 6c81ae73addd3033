//! On-disk byte formats and file layout for archives.
//!
//! - `frame_header`: 32-byte frame header
//! - `paths`: data file naming, manifest and pool list locations

pub mod frame_header;
pub mod paths;

pub use frame_header::{
    FrameHeader, FRAME_HEADER_SIZE, FRAME_NONCE_SIZE, FRAME_SENTINEL, MAX_CIPHERTEXT_LEN,
};
pub use paths::{
    data_file_name, parse_data_file_index, ArchivePaths, METADATA_FILE_NAME, POOL_LIST_FILE_NAME,
};
