//! Archive writer with file rollover.
//!
//! The writer appends container frames to `ARCHIVE%05d.bin` files in order.
//! Files are created lazily on the first container, so a run that captures
//! nothing leaves only `METADATA.bin` behind.

use super::config::ShardConfig;
use crate::codec::FrameCodec;
use crate::format::ArchivePaths;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};
use tsvault_core::{Container, ContainerType, Error, Result};

/// Totals reported when the writer finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardSummary {
    /// Data files created
    pub file_count: u32,
    /// Frames written to data files
    pub frames: u64,
    /// Bytes written to data files
    pub bytes: u64,
}

struct ActiveFile {
    out: BufWriter<File>,
    index: u32,
    size: u64,
    frames: u64,
}

impl ActiveFile {
    fn sync(&mut self) -> Result<()> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        Ok(())
    }
}

/// Writes containers into a fresh archive directory.
pub struct ShardWriter {
    paths: ArchivePaths,
    codec: FrameCodec,
    config: ShardConfig,
    current: Option<ActiveFile>,
    files_created: u32,
    total_frames: u64,
    total_bytes: u64,
    meta_written: bool,
}

impl ShardWriter {
    /// Create a writer for `dir`.
    ///
    /// The directory is created if needed and must not contain any entry.
    pub fn new(dir: impl AsRef<Path>, codec: FrameCodec, config: ShardConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::invalid_operation(e.to_string()))?;
        let paths = ArchivePaths::from_root(dir);
        if !paths.create_empty()? {
            return Err(Error::OutputNotEmpty(paths.root().to_path_buf()));
        }
        Ok(ShardWriter {
            paths,
            codec,
            config,
            current: None,
            files_created: 0,
            total_frames: 0,
            total_bytes: 0,
            meta_written: false,
        })
    }

    /// Archive directory
    pub fn dir(&self) -> &Path {
        self.paths.root()
    }

    /// Data files created so far
    pub fn file_count(&self) -> u32 {
        self.files_created
    }

    /// Record the selected pools in `pools.txt`, one per line.
    pub fn write_pool_list(&mut self, pools: &[String]) -> Result<()> {
        let mut contents = String::new();
        for pool in pools {
            contents.push_str(pool);
            contents.push('\n');
        }
        std::fs::write(self.paths.pool_list(), contents)?;
        Ok(())
    }

    /// Append one data container.
    pub fn write(&mut self, container: &Container) -> Result<()> {
        if self.meta_written {
            return Err(Error::invalid_operation(
                "cannot write data after the manifest",
            ));
        }
        if container.container_type() == ContainerType::BackupMetadata {
            return Err(Error::invalid_operation(
                "the manifest belongs in METADATA.bin, not a data file",
            ));
        }

        let content = container.encode()?;
        let frame = self.codec.seal(container.container_type().code(), &content)?;
        let frame_len = frame.len() as u64;

        let needs_new_file = match &self.current {
            None => true,
            Some(file) => file.frames > 0 && file.size + frame_len > self.config.max_file_size,
        };
        if needs_new_file {
            self.roll()?;
        }

        let file = self
            .current
            .as_mut()
            .ok_or_else(|| Error::invalid_operation("no active archive file"))?;
        file.out.write_all(&frame)?;
        file.size += frame_len;
        file.frames += 1;
        self.total_frames += 1;
        self.total_bytes += frame_len;
        Ok(())
    }

    /// Close the current file and open the next one.
    fn roll(&mut self) -> Result<()> {
        self.close_current()?;

        let index = self.files_created;
        let path = self.paths.data_file(index);
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        self.files_created += 1;
        debug!(file = %path.display(), index, "Created archive file");

        self.current = Some(ActiveFile {
            out: BufWriter::new(file),
            index,
            size: 0,
            frames: 0,
        });
        Ok(())
    }

    fn close_current(&mut self) -> Result<()> {
        if let Some(mut file) = self.current.take() {
            file.sync()?;
            debug!(index = file.index, bytes = file.size, frames = file.frames, "Closed archive file");
        }
        Ok(())
    }

    /// Write `METADATA.bin`. Allowed once; closes the current data file first.
    pub fn write_meta(&mut self, container: &Container) -> Result<()> {
        if self.meta_written {
            return Err(Error::invalid_operation("manifest already written"));
        }
        if container.container_type() != ContainerType::BackupMetadata {
            return Err(Error::invalid_operation(format!(
                "manifest must be a BackupMetadata container, got {}",
                container.container_type().name()
            )));
        }
        self.close_current()?;

        let content = container.encode()?;
        let mut file = File::create(self.paths.metadata())?;
        self.codec
            .write_frame(&mut file, container.container_type().code(), &content)?;
        file.sync_all()?;
        self.meta_written = true;
        Ok(())
    }

    /// Flush and fsync everything written.
    pub fn finish(mut self) -> Result<ShardSummary> {
        self.close_current()?;
        let summary = ShardSummary {
            file_count: self.files_created,
            frames: self.total_frames,
            bytes: self.total_bytes,
        };
        info!(
            dir = %self.paths.root().display(),
            files = summary.file_count,
            frames = summary.frames,
            bytes = summary.bytes,
            "Archive finished"
        );
        Ok(summary)
    }
}
