use thiserror::Error;

/// Errors produced while scanning archives, reading entries, or loading index snapshots
#[derive(Error, Debug)]
pub enum Error {
    /// The archive or index file could not be opened, read, or written
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A header block could not be decoded
    #[error("malformed tar header at offset {offset}: {reason}")]
    Parse { offset: u64, reason: String },

    /// A header block's stored checksum does not match its contents
    #[error("header checksum mismatch at offset {offset}: stored {expected}, computed {actual}")]
    Checksum {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    /// An entry's data region extends past the end of the archive
    #[error("entry {name:?} ends at byte {end} but the archive is only {archive_len} bytes")]
    Truncated {
        name: String,
        end: u64,
        archive_len: u64,
    },

    /// The cursor or reader was used after `close`
    #[error("stream closed")]
    Closed,

    /// The index could not be encoded as a snapshot
    #[error("failed to serialize tar index: {0}")]
    Serialize(String),

    /// A persisted index snapshot is corrupt
    #[error("failed to deserialize tar index: {0}")]
    Deserialize(String),

    /// A persisted index snapshot was written by an unknown format version
    #[error("unsupported tar index format version {0}")]
    UnsupportedVersion(u16),

    /// The input is not a tar index snapshot at all
    #[error("not a tar index snapshot (bad magic)")]
    BadMagic,
}

/// Result type alias for tar index operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(offset: u64, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether this error describes a damaged archive rather than a failing disk
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. } | Error::Checksum { .. } | Error::Truncated { .. }
        )
    }
}
