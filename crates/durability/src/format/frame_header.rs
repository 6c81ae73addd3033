//! Frame header format.
//!
//! Every frame on disk is a fixed 32-byte header followed by the ciphertext
//! (AES-GCM output, tag included):
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────────┬────────────────┐
//! │ sentinel (4) │ type (4, BE) │ ciphertext len (8,BE)│ nonce (16)     │
//! │ BD DB 55 AA  │              │                      │                │
//! └──────────────┴──────────────┴──────────────────────┴────────────────┘
//! ```

use byteorder::{BigEndian, ByteOrder};
use tsvault_core::{Error, Result};

/// Leading bytes of every frame
pub const FRAME_SENTINEL: [u8; 4] = [0xBD, 0xDB, 0x55, 0xAA];

/// Size of the frame header in bytes
pub const FRAME_HEADER_SIZE: usize = 32;

/// Size of the per-frame nonce in bytes
pub const FRAME_NONCE_SIZE: usize = 16;

/// Largest ciphertext a reader will accept (1 GiB)
pub const MAX_CIPHERTEXT_LEN: u64 = 1024 * 1024 * 1024;

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Container type code
    pub frame_type: u32,
    /// Length of the ciphertext following the header
    pub ciphertext_len: u64,
    /// AES-GCM nonce for this frame
    pub nonce: [u8; FRAME_NONCE_SIZE],
}

impl FrameHeader {
    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&FRAME_SENTINEL);
        BigEndian::write_u32(&mut bytes[4..8], self.frame_type);
        BigEndian::write_u64(&mut bytes[8..16], self.ciphertext_len);
        bytes[16..32].copy_from_slice(&self.nonce);
        bytes
    }

    /// Parse and validate a header.
    ///
    /// Fails on a sentinel mismatch or a ciphertext length above
    /// [`MAX_CIPHERTEXT_LEN`].
    pub fn from_bytes(bytes: &[u8; FRAME_HEADER_SIZE]) -> Result<Self> {
        if bytes[0..4] != FRAME_SENTINEL {
            return Err(Error::format(format!(
                "bad frame sentinel {:02X?}",
                &bytes[0..4]
            )));
        }
        let ciphertext_len = BigEndian::read_u64(&bytes[8..16]);
        if ciphertext_len > MAX_CIPHERTEXT_LEN {
            return Err(Error::format(format!(
                "frame ciphertext length {} exceeds the {} byte limit",
                ciphertext_len, MAX_CIPHERTEXT_LEN
            )));
        }
        let mut nonce = [0u8; FRAME_NONCE_SIZE];
        nonce.copy_from_slice(&bytes[16..32]);
        Ok(FrameHeader {
            frame_type: BigEndian::read_u32(&bytes[4..8]),
            ciphertext_len,
            nonce,
        })
    }
}
