pub mod persist;

use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::archive::{EntryReader, HeaderCursor, HeaderRecord};
use crate::config::{IndexOptions, ScanMode};
use crate::error::Result;

/// Archive index - maps the path of every regular file in a tar archive to
/// its header record.
///
/// The index is built once and never changes afterwards, so it can be shared
/// between threads and queried without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndex {
    archive_path: PathBuf,
    last_modified: DateTime<Utc>,
    entries: HashMap<String, HeaderRecord>,
}

impl ArchiveIndex {
    /// Index `archive_path` with the default (lenient) options.
    ///
    /// Only an archive that cannot be opened is an error. Scanning stops at the
    /// first malformed header, so a damaged archive yields a partial index;
    /// use [`build_with`](Self::build_with) and [`IndexOptions::strict`] to have
    /// damage reported instead.
    pub fn build<P: AsRef<Path>>(archive_path: P) -> Result<Self> {
        Self::build_with(archive_path, IndexOptions::default())
    }

    pub fn build_with<P: AsRef<Path>>(archive_path: P, options: IndexOptions) -> Result<Self> {
        let started = Instant::now();
        let archive_path = archive_path.as_ref().to_path_buf();
        let last_modified = modified_time(&archive_path)?;

        let mut cursor = HeaderCursor::open_with(&archive_path, &options)?;
        let mut entries = HashMap::new();
        let mut skipped = 0usize;

        loop {
            let record = match options.mode {
                ScanMode::Strict => cursor.next_record()?,
                ScanMode::Lenient => cursor.next(),
            };
            let Some(record) = record else {
                break;
            };

            if record.file_type().is_normal() {
                // Later duplicates replace earlier ones, as when extracting
                entries.insert(record.name().to_string(), record);
            } else {
                skipped += 1;
            }
        }

        info!(
            "indexed {}: {} files ({} other entries skipped) in {:?}",
            archive_path.display(),
            entries.len(),
            skipped,
            started.elapsed()
        );

        Ok(Self {
            archive_path,
            last_modified,
            entries,
        })
    }

    pub(crate) fn from_parts(
        archive_path: PathBuf,
        last_modified: DateTime<Utc>,
        entries: HashMap<String, HeaderRecord>,
    ) -> Self {
        Self {
            archive_path,
            last_modified,
            entries,
        }
    }

    /// Look up a file by its path inside the archive (including directories).
    /// A path that is not indexed is simply `None`.
    pub fn get(&self, path: &str) -> Option<&HeaderRecord> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of indexed files
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All indexed records, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &HeaderRecord> {
        self.entries.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The archive this index was built from
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Modification time of the archive when it was indexed, whole seconds
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// Whether the archive's modification time has moved since indexing
    pub fn is_stale(&self) -> Result<bool> {
        Ok(modified_time(&self.archive_path)? != self.last_modified)
    }

    /// Open a reader over the content of `path`, if it is indexed
    pub fn open_entry(&self, path: &str) -> Result<Option<EntryReader>> {
        self.get(path)
            .map(|record| EntryReader::open(record, &self.archive_path))
            .transpose()
    }
}

/// File modification time with the sub-second part dropped
pub(crate) fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let modified: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();
    Ok(modified.trunc_subsecs(0))
}
