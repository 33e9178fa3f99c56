//! Random access to the files inside an uncompressed tar archive.
//!
//! [`ArchiveIndex::build`] walks the archive's header blocks once and keeps
//! the location of every regular file. An [`EntryReader`] then reads one file
//! straight out of the archive without touching the rest of it. Indexes can
//! be saved to disk with [`ArchiveIndex::save`] so large archives only have
//! to be scanned once.
//!
//! ```no_run
//! use std::io::Read;
//! use tarindex::ArchiveIndex;
//!
//! # fn main() -> tarindex::Result<()> {
//! let index = ArchiveIndex::build("site.tar")?;
//! if let Some(mut reader) = index.open_entry("scripts/glUtils.js")? {
//!     let mut text = String::new();
//!     reader.read_to_string(&mut text)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod index;

pub use archive::{CursorState, EntryReader, FileType, HeaderCursor, HeaderRecord};
pub use cache::IndexCache;
pub use config::{IndexOptions, ScanMode};
pub use error::{Error, Result};
pub use index::ArchiveIndex;
