use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::header::HeaderRecord;
use crate::error::{Error, Result};

/// A bounded reader over the content of one archived entry.
///
/// Each reader opens its own handle to the archive, so any number of them can
/// read from the same file at once. Reads stop at the end of the entry; they
/// never run into the padding or the next header.
#[derive(Debug)]
pub struct EntryReader {
    file: Option<File>,
    /// Absolute offset of the first content byte
    start: u64,
    /// Absolute offset one past the last content byte
    eof: u64,
    /// Absolute offset of the next byte to read
    position: u64,
}

impl EntryReader {
    /// Open the archive and position a reader at the start of `record`'s content
    pub fn open<P: AsRef<Path>>(record: &HeaderRecord, archive_path: P) -> Result<Self> {
        let mut file = File::open(archive_path.as_ref())?;
        file.seek(SeekFrom::Start(record.data_offset()))?;

        Ok(Self {
            file: Some(file),
            start: record.data_offset(),
            eof: record.end_offset(),
            position: record.data_offset(),
        })
    }

    /// Bytes left before the end of the entry, saturated to `u32::MAX`.
    ///
    /// Use [`remaining_wide`](Self::remaining_wide) for entries above 4 GiB.
    pub fn remaining(&self) -> Result<u32> {
        Ok(u32::try_from(self.remaining_wide()?).unwrap_or(u32::MAX))
    }

    /// Bytes left before the end of the entry
    pub fn remaining_wide(&self) -> Result<u64> {
        if self.file.is_none() {
            return Err(Error::Closed);
        }
        Ok(self.eof - self.position)
    }

    /// Advance by up to `n` bytes, returning how many were skipped.
    ///
    /// A negative `n` skips nothing. Skipping past the end stops at the end.
    pub fn skip(&mut self, n: i64) -> Result<u64> {
        let remaining = self.remaining_wide()?;
        let Ok(n) = u64::try_from(n) else {
            return Ok(0);
        };

        let skipped = n.min(remaining);
        self.seek_absolute(self.position + skipped)?;
        Ok(skipped)
    }

    /// Read the rest of the entry into memory
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let capacity = usize::try_from(self.remaining_wide()?).unwrap_or(0);
        let mut buf = Vec::with_capacity(capacity);
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Release the archive handle. Safe to call more than once.
    pub fn close(&mut self) {
        self.file = None;
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Position relative to the start of the entry
    pub fn position(&self) -> u64 {
        self.position - self.start
    }

    /// Total size of the entry
    pub fn len(&self) -> u64 {
        self.eof - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.eof == self.start
    }

    fn seek_absolute(&mut self, target: u64) -> io::Result<u64> {
        let file = self.file.as_mut().ok_or_else(closed)?;
        file.seek(SeekFrom::Start(target))?;
        self.position = target;
        Ok(target)
    }
}

fn closed() -> io::Error {
    io::Error::other(Error::Closed)
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file.as_mut().ok_or_else(closed)?;
        if self.position >= self.eof {
            return Ok(0);
        }

        let left = self.eof - self.position;
        let want = usize::try_from(left).map_or(buf.len(), |left| left.min(buf.len()));
        let n = file.read(&mut buf[..want])?;
        self.position += n as u64;
        Ok(n)
    }
}

/// Seeks are relative to the start of the entry. Seeking past the end
/// clamps to the end.
impl Seek for EntryReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.len();
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => len.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.position().checked_add_signed(offset),
        }
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before the start of the entry",
            )
        })?;

        let clamped = target.min(len);
        self.seek_absolute(self.start + clamped)?;
        Ok(clamped)
    }
}
