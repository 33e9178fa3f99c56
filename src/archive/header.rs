//! Decoding and encoding of 512-byte tar header blocks.
//!
//! Layout of the fields this module touches:
//!
//! | Offset | Size | Field                      |
//! |--------|------|----------------------------|
//! | 0      | 100  | name                       |
//! | 100    | 8    | mode                       |
//! | 108    | 8    | uid                        |
//! | 116    | 8    | gid                        |
//! | 124    | 12   | size (octal ASCII)         |
//! | 136    | 12   | mtime                      |
//! | 148    | 8    | checksum                   |
//! | 156    | 1    | type flag                  |
//! | 157    | 100  | link name                  |
//! | 257    | 6    | UStar magic `"ustar\0"`    |
//! | 263    | 2    | UStar version `"00"`       |
//!
//! Everything here is pure; no I/O happens in this module.

use crate::error::{Error, Result};

/// Size of a header block and of the data blocks that follow it
pub const BLOCK_SIZE: u64 = 512;

const NAME: (usize, usize) = (0, 100);
const MODE: (usize, usize) = (100, 8);
const UID: (usize, usize) = (108, 8);
const GID: (usize, usize) = (116, 8);
const SIZE: (usize, usize) = (124, 12);
const MTIME: (usize, usize) = (136, 12);
const CHECKSUM: (usize, usize) = (148, 8);
const TYPEFLAG: usize = 156;
const MAGIC: (usize, usize) = (257, 6);
const VERSION: (usize, usize) = (263, 2);

const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Largest size representable in the 11 octal digits of the size field
pub const MAX_ENTRY_SIZE: u64 = 0o77_777_777_777;

/// A raw header block
pub type Block = [u8; BLOCK_SIZE as usize];

/// Entry type, from the type flag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// `'0'`
    Normal,
    /// `'1'`
    HardLink,
    /// `'2'`
    SymbolicLink,
    /// `'3'`
    CharDevice,
    /// `'4'`
    BlockDevice,
    /// `'5'`
    Directory,
    /// `'6'`
    Fifo,
    /// `'7'`
    Contiguous,
    /// NUL, the pre-POSIX spelling of a regular file
    LegacyNormal,
    /// Any other flag byte, kept verbatim
    Other(u8),
}

impl FileType {
    pub fn from_byte(flag: u8) -> Self {
        match flag {
            b'0' => FileType::Normal,
            b'1' => FileType::HardLink,
            b'2' => FileType::SymbolicLink,
            b'3' => FileType::CharDevice,
            b'4' => FileType::BlockDevice,
            b'5' => FileType::Directory,
            b'6' => FileType::Fifo,
            b'7' => FileType::Contiguous,
            0 => FileType::LegacyNormal,
            other => FileType::Other(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FileType::Normal => b'0',
            FileType::HardLink => b'1',
            FileType::SymbolicLink => b'2',
            FileType::CharDevice => b'3',
            FileType::BlockDevice => b'4',
            FileType::Directory => b'5',
            FileType::Fifo => b'6',
            FileType::Contiguous => b'7',
            FileType::LegacyNormal => 0,
            FileType::Other(b) => b,
        }
    }

    /// Regular file content, in either the POSIX or the legacy spelling
    pub fn is_normal(self) -> bool {
        matches!(self, FileType::Normal | FileType::LegacyNormal)
    }
}

/// Metadata for one archived entry.
///
/// Only the name, content size, type, and the absolute offset of the content
/// are kept; the archive itself is never referenced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderRecord {
    name: String,
    size: u64,
    file_type: FileType,
    data_offset: u64,
}

impl HeaderRecord {
    pub fn new(name: impl Into<String>, size: u64, file_type: FileType, data_offset: u64) -> Self {
        Self {
            name: name.into(),
            size,
            file_type,
            data_offset,
        }
    }

    /// Archive-relative path, including directories
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Absolute offset of the first content byte
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Absolute offset one past the last content byte
    pub fn end_offset(&self) -> u64 {
        self.data_offset + self.size
    }

    /// Content size rounded up to a whole number of blocks
    pub fn padded_size(&self) -> u64 {
        padded_size(self.size)
    }
}

impl std::fmt::Display for HeaderRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Round up to next 512-byte boundary
pub fn padded_size(size: u64) -> u64 {
    size + (BLOCK_SIZE - size % BLOCK_SIZE) % BLOCK_SIZE
}

/// Decode a header block.
///
/// `data_offset` is the archive position immediately after `block`, which is
/// where the entry's content starts.
pub fn decode(block: &Block, data_offset: u64) -> Result<HeaderRecord> {
    let header_offset = data_offset.saturating_sub(BLOCK_SIZE);
    let name = parse_name(field(block, NAME));
    let size = parse_octal(field(block, SIZE))
        .map_err(|reason| Error::parse(header_offset, format!("size field: {reason}")))?;

    Ok(HeaderRecord {
        name,
        size,
        file_type: FileType::from_byte(block[TYPEFLAG]),
        data_offset,
    })
}

/// Encode a record as a UStar header block with a valid checksum.
///
/// Mode is written as `0644`, owner and timestamp as zero. The record's
/// `data_offset` is not part of the block.
pub fn encode(record: &HeaderRecord) -> Result<Block> {
    let mut block = [0u8; BLOCK_SIZE as usize];

    let name: Vec<u8> = record
        .name
        .chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| c))
        .collect::<std::result::Result<Vec<u8>, char>>()
        .map_err(|c| Error::parse(0, format!("name character {c:?} is not 8-bit")))?;
    if name.len() > NAME.1 {
        return Err(Error::parse(
            0,
            format!("name is {} bytes, limit is {}", name.len(), NAME.1),
        ));
    }
    if record.size > MAX_ENTRY_SIZE {
        return Err(Error::parse(
            0,
            format!("size {} does not fit the octal size field", record.size),
        ));
    }

    block[..name.len()].copy_from_slice(&name);
    write_octal(field_mut(&mut block, MODE), 0o644);
    write_octal(field_mut(&mut block, UID), 0);
    write_octal(field_mut(&mut block, GID), 0);
    write_octal(field_mut(&mut block, SIZE), record.size);
    write_octal(field_mut(&mut block, MTIME), 0);
    block[TYPEFLAG] = record.file_type.as_byte();
    field_mut(&mut block, MAGIC).copy_from_slice(USTAR_MAGIC);
    field_mut(&mut block, VERSION).copy_from_slice(b"00");

    // Six digits, NUL, space: the layout every tar writer uses
    let sum = checksum(&block);
    let cksum = field_mut(&mut block, CHECKSUM);
    write_octal(&mut cksum[..7], u64::from(sum));
    cksum[7] = b' ';

    Ok(block)
}

/// Unsigned sum of the header bytes, with the checksum field read as spaces
pub fn checksum(block: &Block) -> u32 {
    let (start, len) = CHECKSUM;
    block
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            if (start..start + len).contains(&i) {
                u32::from(b' ')
            } else {
                u32::from(b)
            }
        })
        .sum()
}

/// Checksum recorded in the header, if the field holds any digits
pub fn stored_checksum(block: &Block) -> Option<u32> {
    parse_octal(field(block, CHECKSUM))
        .ok()
        .and_then(|v| u32::try_from(v).ok())
}

/// Whether the block carries the UStar magic
pub fn is_ustar(block: &Block) -> bool {
    field(block, MAGIC) == USTAR_MAGIC
}

/// End-of-archive marker
pub fn is_zero_block(block: &Block) -> bool {
    block.iter().all(|&b| b == 0)
}

fn field(block: &Block, (offset, len): (usize, usize)) -> &[u8] {
    &block[offset..offset + len]
}

fn field_mut(block: &mut Block, (offset, len): (usize, usize)) -> &mut [u8] {
    &mut block[offset..offset + len]
}

/// Parse a NUL-terminated name, one char per byte
fn parse_name(field: &[u8]) -> String {
    field
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

/// Parse an octal number, ignoring anything that is not a decimal digit
fn parse_octal(field: &[u8]) -> std::result::Result<u64, String> {
    let digits: String = field
        .iter()
        .filter(|b| b.is_ascii_digit())
        .map(|&b| char::from(b))
        .collect();
    if digits.is_empty() {
        return Err("no digits".to_string());
    }
    u64::from_str_radix(&digits, 8).map_err(|e| format!("{digits:?} is not octal: {e}"))
}

/// Write `value` as zero-padded octal followed by a NUL
fn write_octal(dst: &mut [u8], value: u64) {
    let width = dst.len() - 1;
    let text = format!("{value:0width$o}");
    dst[..width].copy_from_slice(&text.as_bytes()[text.len() - width..]);
    dst[width] = 0;
}
