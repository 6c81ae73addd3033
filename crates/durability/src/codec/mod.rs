//! Archive codec: key derivation and the encrypted frame format.

pub mod frame;
pub mod key;

pub use frame::{Frame, FrameCodec, FRAME_TAG_SIZE};
pub use key::{ArchiveKey, ARCHIVE_KEY_LEN, KEY_DERIVATION_ROUNDS, KEY_DERIVATION_SALT};
