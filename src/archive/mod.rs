//! Reading tar archives: header decoding, header iteration, and bounded
//! random access to a single entry's content.

pub mod cursor;
pub mod header;
pub mod reader;

pub use cursor::{CursorState, HeaderCursor};
pub use header::{BLOCK_SIZE, FileType, HeaderRecord};
pub use reader::EntryReader;
