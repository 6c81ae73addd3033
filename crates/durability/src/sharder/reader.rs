//! Archive reader.
//!
//! Reads data files in index order and yields their containers. A clean end
//! of one file moves on to the next index; the first missing index ends the
//! archive. When the archive has a manifest, that index must equal the
//! manifest's data file count.

use crate::codec::{Frame, FrameCodec};
use crate::format::ArchivePaths;
use crate::manifest::read_metadata;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;
use tsvault_core::{Container, ContainerType, Error, Result};

/// Sequential reader over an archive's data files.
pub struct ShardReader {
    paths: ArchivePaths,
    codec: FrameCodec,
    current: Option<BufReader<File>>,
    index: u32,
    expected_files: Option<u32>,
    done: bool,
}

impl ShardReader {
    /// Open the archive in `dir`.
    ///
    /// An archive whose manifest records no data files is valid and empty.
    /// Without a manifest the data files are read until the first gap.
    pub fn open(dir: impl AsRef<Path>, codec: FrameCodec) -> Result<Self> {
        let paths = ArchivePaths::from_root(dir);
        let expected_files = if paths.has_metadata() {
            Some(read_metadata(paths.root(), &codec)?.file_count)
        } else {
            None
        };
        let current = match File::open(paths.data_file(0)) {
            Ok(file) => Some(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => match expected_files {
                None => {
                    return Err(Error::format(format!(
                        "not an archive directory: {}",
                        paths.root().display()
                    )))
                }
                Some(0) => None,
                Some(count) => return Err(missing_files(&paths, 0, count)),
            },
            Err(e) => return Err(e.into()),
        };
        Ok(ShardReader {
            done: current.is_none(),
            paths,
            codec,
            current,
            index: 0,
            expected_files,
        })
    }

    /// Index of the data file currently being read
    pub fn file_index(&self) -> u32 {
        self.index
    }

    /// Read the next data container, or `None` at the end of the archive.
    pub fn next_container(&mut self) -> Result<Option<Container>> {
        loop {
            if self.done {
                return Ok(None);
            }
            let Some(reader) = self.current.as_mut() else {
                self.done = true;
                return Ok(None);
            };
            match self.codec.read_frame(reader)? {
                Some(frame) => return Self::dispatch(frame).map(Some),
                None => self.advance()?,
            }
        }
    }

    fn advance(&mut self) -> Result<()> {
        self.current = None;
        self.index += 1;
        let path = self.paths.data_file(self.index);
        match File::open(&path) {
            Ok(file) => {
                debug!(file = %path.display(), index = self.index, "Opened archive file");
                self.current = Some(BufReader::new(file));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.done = true;
                if let Some(count) = self.expected_files {
                    if count != self.index {
                        return Err(missing_files(&self.paths, self.index, count));
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn dispatch(frame: Frame) -> Result<Container> {
        match ContainerType::try_from(frame.frame_type)? {
            ContainerType::BackupMetadata => Err(Error::format(
                "manifest frame found inside a data file",
            )),
            ContainerType::EtcdRecords | ContainerType::CephObject => {
                Container::decode(frame.frame_type, &frame.content)
            }
        }
    }
}

fn missing_files(paths: &ArchivePaths, found: u32, expected: u32) -> Error {
    Error::format(format!(
        "archive {} has {} data files, manifest records {}",
        paths.root().display(),
        found,
        expected
    ))
}

impl Iterator for ShardReader {
    type Item = Result<Container>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_container() {
            Ok(Some(container)) => Some(Ok(container)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
