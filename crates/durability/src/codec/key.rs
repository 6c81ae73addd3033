//! Passphrase-derived archive key.

use sha3::Sha3_512;
use std::fmt;
use std::time::Instant;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// PBKDF2 rounds used for every archive.
pub const KEY_DERIVATION_ROUNDS: u32 = 200_000;

/// Application-wide PBKDF2 salt. Fixed so that any archive can be opened
/// with nothing but its passphrase.
pub const KEY_DERIVATION_SALT: &[u8] =
    b"b9c4c1ee74b1db7b88c11f6dd8cab7196840ef2591d8885a313d2bf5d2866107";

/// AES-256 key length in bytes
pub const ARCHIVE_KEY_LEN: usize = 32;

/// AES-256 key derived from a passphrase with PBKDF2-HMAC-SHA3-512.
///
/// The key bytes are wiped when the key is dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ArchiveKey([u8; ARCHIVE_KEY_LEN]);

impl ArchiveKey {
    /// Derive the key used by archives.
    pub fn derive(passphrase: &str) -> Self {
        Self::derive_with_rounds(passphrase, KEY_DERIVATION_ROUNDS)
    }

    /// Derive with an explicit round count.
    ///
    /// Archives are always written with [`KEY_DERIVATION_ROUNDS`]; a lower
    /// count only makes sense for tests.
    pub fn derive_with_rounds(passphrase: &str, rounds: u32) -> Self {
        let start = Instant::now();
        let mut key = ArchiveKey([0u8; ARCHIVE_KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha3_512>(passphrase.as_bytes(), KEY_DERIVATION_SALT, rounds, &mut key.0);
        debug!(rounds, elapsed_ms = start.elapsed().as_millis() as u64, "Derived archive key");
        key
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; ARCHIVE_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ArchiveKey(<redacted>)")
    }
}
