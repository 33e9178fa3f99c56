//! Snapshot format for [`ArchiveIndex`].
//!
//! ```text
//! +--------+-----------------+------------------------------------------+
//! | "TIDX" | version: u16 BE | zlib( postcard( Snapshot ) )             |
//! +--------+-----------------+------------------------------------------+
//! ```
//!
//! `Snapshot` is a tagged enum, one variant per schema revision. Compression
//! is applied to the encoded snapshot as a whole and uses the fastest zlib
//! level, since snapshots are loaded and saved far more often than archives
//! are re-indexed.

use chrono::DateTime;
use flate2::Compression;
use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ArchiveIndex;
use crate::archive::{FileType, HeaderRecord};
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"TIDX";
const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
enum Snapshot {
    V1(SnapshotV1),
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotV1 {
    /// Raw bytes of the archive path, which need not be valid UTF-8
    archive_path: Vec<u8>,
    last_modified_secs: i64,
    entries: Vec<EntryV1>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryV1 {
    name: String,
    size: u64,
    type_flag: u8,
    data_offset: u64,
}

impl From<&HeaderRecord> for EntryV1 {
    fn from(record: &HeaderRecord) -> Self {
        Self {
            name: record.name().to_string(),
            size: record.size(),
            type_flag: record.file_type().as_byte(),
            data_offset: record.data_offset(),
        }
    }
}

impl ArchiveIndex {
    /// Write a compressed snapshot of the whole index to `sink`
    pub fn serialize<W: Write>(&self, mut sink: W) -> Result<()> {
        let mut entries: Vec<EntryV1> = self.entries().map(EntryV1::from).collect();
        // Stable output for identical indexes
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let snapshot = Snapshot::V1(SnapshotV1 {
            archive_path: path_to_bytes(self.archive_path())?,
            last_modified_secs: self.last_modified().timestamp(),
            entries,
        });
        let payload =
            postcard::to_allocvec(&snapshot).map_err(|e| Error::Serialize(e.to_string()))?;

        sink.write_all(MAGIC)?;
        sink.write_all(&FORMAT_VERSION.to_be_bytes())?;

        let mut encoder = ZlibEncoder::new(sink, Compression::fast());
        encoder.write_all(&payload)?;
        encoder.finish()?.flush()?;

        debug!(
            "serialized index of {} ({} entries, {} bytes before compression)",
            self.archive_path().display(),
            self.size(),
            payload.len()
        );
        Ok(())
    }

    /// Rebuild an index from a snapshot written by [`serialize`](Self::serialize).
    ///
    /// The whole snapshot is decoded and validated before the index is
    /// assembled; on any failure nothing is returned.
    pub fn deserialize<R: Read>(source: R) -> Result<Self> {
        let mut source = BufReader::new(source);
        let mut preamble = [0u8; 6];
        source.read_exact(&mut preamble).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::BadMagic,
            _ => Error::Io(e),
        })?;
        if &preamble[..4] != MAGIC {
            return Err(Error::BadMagic);
        }
        let version = u16::from_be_bytes([preamble[4], preamble[5]]);
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut payload = Vec::new();
        let mut decoder = ZlibDecoder::new(source);
        decoder
            .read_to_end(&mut payload)
            .map_err(|e| match e.kind() {
                io::ErrorKind::InvalidInput
                | io::ErrorKind::InvalidData
                | io::ErrorKind::UnexpectedEof => {
                    Error::Deserialize(format!("corrupt compressed stream: {e}"))
                }
                _ => Error::Io(e),
            })?;

        let mut source = decoder.into_inner();
        if source.read(&mut [0u8; 1])? != 0 {
            return Err(Error::Deserialize(
                "trailing bytes after compressed stream".to_string(),
            ));
        }

        let (snapshot, rest) = postcard::take_from_bytes::<Snapshot>(&payload)
            .map_err(|e| Error::Deserialize(e.to_string()))?;
        if !rest.is_empty() {
            return Err(Error::Deserialize(format!(
                "{} trailing bytes after snapshot",
                rest.len()
            )));
        }

        let Snapshot::V1(snapshot) = snapshot;
        let index = from_v1(snapshot)?;
        debug!(
            "deserialized index of {} ({} entries)",
            index.archive_path().display(),
            index.size()
        );
        Ok(index)
    }

    /// Write a snapshot to `path`, replacing it atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.serialize(BufWriter::new(tmp.as_file_mut()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::deserialize(file)
    }
}

fn from_v1(snapshot: SnapshotV1) -> Result<ArchiveIndex> {
    let last_modified = DateTime::from_timestamp(snapshot.last_modified_secs, 0).ok_or_else(|| {
        Error::Deserialize(format!(
            "timestamp {} out of range",
            snapshot.last_modified_secs
        ))
    })?;

    let mut entries = HashMap::with_capacity(snapshot.entries.len());
    for entry in snapshot.entries {
        let file_type = FileType::from_byte(entry.type_flag);
        if !file_type.is_normal() {
            return Err(Error::Deserialize(format!(
                "entry {:?} has non-file type {:?}",
                entry.name, file_type
            )));
        }
        if entry.data_offset.checked_add(entry.size).is_none() {
            return Err(Error::Deserialize(format!(
                "entry {:?} extends past the addressable range",
                entry.name
            )));
        }

        let record = HeaderRecord::new(entry.name, entry.size, file_type, entry.data_offset);
        match entries.entry(record.name().to_string()) {
            Entry::Occupied(slot) => {
                return Err(Error::Deserialize(format!(
                    "duplicate entry {:?}",
                    slot.key()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    Ok(ArchiveIndex::from_parts(
        path_from_bytes(snapshot.archive_path)?,
        last_modified,
        entries,
    ))
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Ok(path.as_os_str().as_bytes().to_vec())
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Result<Vec<u8>> {
    path.to_str()
        .map(|s| s.as_bytes().to_vec())
        .ok_or_else(|| Error::Serialize(format!("archive path {} is not unicode", path.display())))
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Ok(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|e| Error::Deserialize(format!("archive path is not unicode: {e}")))
}
