//! Physical layout of a construction file. All integers are big-endian.
//!
//! ```text
//! [magic "constrct"][format version u8]
//! [section blob 0] ... [section blob N-1]
//! [metadata blob]
//! [metadata offset u32][magic "constrct"]
//! ```

use crate::error::{ConstructionError, MagicLocation, Result, VersionComponent};

pub const MAGIC: [u8; 8] = *b"constrct";

/// Magic token plus the format version byte.
pub const HEADER_SIZE: u64 = 9;

/// Metadata offset plus the closing magic token.
pub const FOOTER_SIZE: u64 = 12;

pub const SECTION_VERSION: i8 = 0;

/// Metadata keys
pub mod keys {
    pub const SECTION_VERSION: &str = "section_version";
    pub const EXPORT_VERSION: &str = "export_version";
    pub const EDITION: &str = "edition";
    pub const VERSION: &str = "version";
    pub const SELECTION_BOXES: &str = "selection_boxes";
    pub const SECTION_INDEX_TABLE: &str = "section_index_table";
    pub const BLOCK_PALETTE: &str = "block_palette";
    pub const PRIMARY_BLOCK_COUNT: &str = "primary_block_count";
}

/// Known layouts, keyed by the byte after the leading magic token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// Offset/length index table with a closing magic token.
    V0,
}

impl FormatVersion {
    pub const LATEST: FormatVersion = FormatVersion::V0;

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(FormatVersion::V0),
            other => Err(ConstructionError::UnsupportedVersion {
                component: VersionComponent::Format,
                version: i32::from(other),
            }),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FormatVersion::V0 => 0,
        }
    }

    pub fn has_footer_magic(self) -> bool {
        match self {
            FormatVersion::V0 => true,
        }
    }
}

pub fn header(version: FormatVersion) -> [u8; HEADER_SIZE as usize] {
    let mut header = [0u8; HEADER_SIZE as usize];
    header[..8].copy_from_slice(&MAGIC);
    header[8] = version.as_byte();
    header
}

pub fn footer(metadata_offset: u32) -> [u8; FOOTER_SIZE as usize] {
    let mut footer = [0u8; FOOTER_SIZE as usize];
    footer[..4].copy_from_slice(&metadata_offset.to_be_bytes());
    footer[4..].copy_from_slice(&MAGIC);
    footer
}

pub fn check_magic(bytes: &[u8], location: MagicLocation) -> Result<()> {
    if bytes == MAGIC {
        Ok(())
    } else {
        Err(ConstructionError::InvalidMagic {
            location,
            found: bytes.to_vec(),
        })
    }
}

/// Validates the header bytes, returning the format version they declare.
pub fn parse_header(bytes: &[u8]) -> Result<FormatVersion> {
    if bytes.len() < HEADER_SIZE as usize {
        return Err(ConstructionError::InvalidMagic {
            location: MagicLocation::Header,
            found: bytes.to_vec(),
        });
    }
    check_magic(&bytes[..8], MagicLocation::Header)?;
    FormatVersion::from_byte(bytes[8])
}
