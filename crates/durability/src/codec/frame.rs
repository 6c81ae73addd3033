//! Authenticated, compressed frames.
//!
//! A frame's payload is snappy-compressed (raw block format) and then sealed
//! with AES-256-GCM using a 16-byte nonce and no associated data. The nonce is
//! an 8-byte random prefix chosen when the codec is created, followed by a
//! big-endian counter that is bumped for every frame. One codec is shared by
//! everything written in a run, so nonces never repeat under one key.

use super::key::ArchiveKey;
use crate::format::{FrameHeader, FRAME_HEADER_SIZE, FRAME_NONCE_SIZE};
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use tsvault_core::{Error, Result};

/// AES-256-GCM with a 16-byte nonce.
type FrameCipher = AesGcm<Aes256, U16>;

/// AES-GCM tag length appended to every ciphertext
pub const FRAME_TAG_SIZE: usize = 16;

const INITIAL_BODY_CAPACITY: u64 = 1024 * 1024;

/// A decoded frame: container type code plus decompressed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Container type code
    pub frame_type: u32,
    /// Plaintext content
    pub content: Vec<u8>,
}

/// Encrypts and decrypts frames under one archive key.
///
/// # Thread Safety
///
/// `FrameCodec` is `Send + Sync`; the nonce counter is atomic.
pub struct FrameCodec {
    cipher: FrameCipher,
    nonce_prefix: [u8; 8],
    counter: AtomicU64,
}

impl FrameCodec {
    /// Create a codec with a fresh random nonce prefix.
    pub fn new(key: &ArchiveKey) -> Self {
        let mut nonce_prefix = [0u8; 8];
        OsRng.fill_bytes(&mut nonce_prefix);
        Self::with_nonce_prefix(key, nonce_prefix)
    }

    /// Create a codec with an explicit nonce prefix.
    pub fn with_nonce_prefix(key: &ArchiveKey, nonce_prefix: [u8; 8]) -> Self {
        FrameCodec {
            cipher: FrameCipher::new(Key::<FrameCipher>::from_slice(key.as_bytes())),
            nonce_prefix,
            counter: AtomicU64::new(0),
        }
    }

    /// Number of frames sealed so far
    pub fn frames_sealed(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    fn next_nonce(&self) -> [u8; FRAME_NONCE_SIZE] {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut nonce = [0u8; FRAME_NONCE_SIZE];
        nonce[0..8].copy_from_slice(&self.nonce_prefix);
        nonce[8..16].copy_from_slice(&n.to_be_bytes());
        nonce
    }

    /// Build the complete on-disk bytes (header + ciphertext) of one frame.
    pub fn seal(&self, frame_type: u32, content: &[u8]) -> Result<Vec<u8>> {
        let compressed = snap::raw::Encoder::new()
            .compress_vec(content)
            .map_err(|e| Error::format(format!("snappy compression failed: {}", e)))?;
        let nonce = self.next_nonce();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::<U16>::from_slice(&nonce), compressed.as_slice())
            .map_err(|_| Error::format("frame encryption failed"))?;

        let header = FrameHeader {
            frame_type,
            ciphertext_len: ciphertext.len() as u64,
            nonce,
        };
        let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + ciphertext.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Seal a frame and write it to `out`.
    ///
    /// Returns the number of bytes written.
    pub fn write_frame<W: Write>(&self, out: &mut W, frame_type: u32, content: &[u8]) -> Result<u64> {
        let bytes = self.seal(frame_type, content)?;
        out.write_all(&bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Read the next frame from `input`.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly at a frame boundary.
    pub fn read_frame<R: Read>(&self, input: &mut R) -> Result<Option<Frame>> {
        let mut header_bytes = [0u8; FRAME_HEADER_SIZE];
        match read_full(input, &mut header_bytes)? {
            0 => return Ok(None),
            FRAME_HEADER_SIZE => {}
            n => {
                return Err(Error::format(format!(
                    "truncated frame header ({} of {} bytes)",
                    n, FRAME_HEADER_SIZE
                )))
            }
        }
        let header = FrameHeader::from_bytes(&header_bytes)?;

        // Grow with the data instead of trusting the header's length up front.
        let mut ciphertext =
            Vec::with_capacity(header.ciphertext_len.min(INITIAL_BODY_CAPACITY) as usize);
        input
            .by_ref()
            .take(header.ciphertext_len)
            .read_to_end(&mut ciphertext)?;
        if (ciphertext.len() as u64) < header.ciphertext_len {
            return Err(Error::format(format!(
                "truncated frame body ({} of {} bytes)",
                ciphertext.len(),
                header.ciphertext_len
            )));
        }

        let compressed = self
            .cipher
            .decrypt(Nonce::<U16>::from_slice(&header.nonce), ciphertext.as_slice())
            .map_err(|_| Error::Authentication)?;
        let content = snap::raw::Decoder::new()
            .decompress_vec(&compressed)
            .map_err(|e| Error::format(format!("snappy decompression failed: {}", e)))?;

        Ok(Some(Frame {
            frame_type: header.frame_type,
            content,
        }))
    }
}

/// Fill `buf` from `input`, stopping early only at end of stream.
///
/// Returns the number of bytes read.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
