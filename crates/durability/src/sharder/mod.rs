//! Multi-file archive layer.
//!
//! # Components
//!
//! - `ShardConfig`: file size cap and validation
//! - `ShardWriter`: appends containers with rollover, writes the manifest last
//! - `ShardReader`: replays data containers across files in index order

pub mod config;
pub mod reader;
pub mod writer;

pub use config::{ShardConfig, ShardConfigError};
pub use reader::ShardReader;
pub use writer::{ShardSummary, ShardWriter};
