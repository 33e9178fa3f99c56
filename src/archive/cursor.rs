use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::header::{self, BLOCK_SIZE, HeaderRecord};
use crate::config::IndexOptions;
use crate::error::{Error, Result};

/// Lifecycle of a [`HeaderCursor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Holding the archive open, positioned on a header block
    Positioned,
    /// Reached the end of the archive or hit an error; the handle is released
    Exhausted,
    /// Closed by the caller
    Closed,
}

/// Walks the header blocks of a tar archive, one entry per step.
///
/// The cursor owns a read handle until the trailer is reached, a step fails,
/// or [`close`](Self::close) is called. A caller that stops iterating early
/// should close the cursor to release the file right away; dropping it has
/// the same effect.
///
/// The last two blocks of the file are never read as headers: every
/// well-formed archive ends with two zero blocks, so the scan stops once
/// fewer than two blocks remain.
#[derive(Debug)]
pub struct HeaderCursor {
    path: PathBuf,
    file: Option<File>,
    archive_len: u64,
    position: u64,
    state: CursorState,
    verify_checksums: bool,
}

impl HeaderCursor {
    /// Open a cursor positioned on the first header block
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &IndexOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &IndexOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )
            .into());
        }
        let archive_len = metadata.len();

        Ok(Self {
            path,
            file: Some(file),
            archive_len,
            position: 0,
            state: CursorState::Positioned,
            verify_checksums: options.verify_checksums,
        })
    }

    /// Read the next header.
    ///
    /// Returns `Ok(None)` at the end of the archive. Any error also ends the
    /// walk: the handle is released and later calls return `Ok(None)`.
    /// Calling this after [`close`](Self::close) fails with [`Error::Closed`].
    pub fn next_record(&mut self) -> Result<Option<HeaderRecord>> {
        match self.state {
            CursorState::Closed => return Err(Error::Closed),
            CursorState::Exhausted => return Ok(None),
            CursorState::Positioned => {}
        }

        match self.step() {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                self.release(CursorState::Exhausted);
                Ok(None)
            }
            Err(e) => {
                self.release(CursorState::Exhausted);
                Err(e)
            }
        }
    }

    fn step(&mut self) -> Result<Option<HeaderRecord>> {
        if self.position >= self.archive_len.saturating_sub(2 * BLOCK_SIZE) {
            return Ok(None);
        }

        let file = self.file.as_mut().ok_or(Error::Closed)?;
        let mut block = [0u8; BLOCK_SIZE as usize];
        file.read_exact(&mut block)?;
        let data_offset = self.position + BLOCK_SIZE;

        // GNU tar pads archives to a 10 KiB record, so zero blocks can show up
        // before the last two
        if header::is_zero_block(&block) {
            debug!("zero block at offset {}, end of archive", self.position);
            return Ok(None);
        }

        if self.verify_checksums {
            let actual = header::checksum(&block);
            let expected = header::stored_checksum(&block)
                .ok_or_else(|| Error::parse(self.position, "checksum field has no digits"))?;
            if expected != actual {
                return Err(Error::Checksum {
                    offset: self.position,
                    expected,
                    actual,
                });
            }
        }

        let record = header::decode(&block, data_offset)?;

        let end = data_offset
            .checked_add(record.size())
            .filter(|&end| end <= self.archive_len)
            .ok_or_else(|| Error::Truncated {
                name: record.name().to_string(),
                end: data_offset.saturating_add(record.size()),
                archive_len: self.archive_len,
            })?;

        let next = data_offset + record.padded_size();
        file.seek(SeekFrom::Start(next))?;
        self.position = next;

        debug!(
            "header {:?}: size={} data_offset={} end={}",
            record.name(),
            record.size(),
            data_offset,
            end
        );

        Ok(Some(record))
    }

    fn release(&mut self, state: CursorState) {
        self.file = None;
        self.state = state;
    }

    /// Release the archive handle. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.state != CursorState::Closed {
            self.release(CursorState::Closed);
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Offset of the next header block to be read
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn archive_len(&self) -> u64 {
        self.archive_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lenient view: a failed step ends the sequence.
impl Iterator for HeaderCursor {
    type Item = HeaderRecord;

    fn next(&mut self) -> Option<HeaderRecord> {
        match self.next_record() {
            Ok(record) => record,
            Err(Error::Closed) => None,
            Err(e) => {
                warn!(
                    "stopping scan of {} at offset {}: {e}",
                    self.path.display(),
                    self.position
                );
                None
            }
        }
    }
}

impl FusedIterator for HeaderCursor {}
