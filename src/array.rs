//! Narrowest-width storage for block index grids.
//!
//! The byte path only accepts values up to 127 so every element survives a round trip
//! through a signed NBT byte array. Existing files rely on that boundary, so 128 already
//! moves to the int path.

use crate::error::{ConstructionError, Result};
use construction_nbt::Tag;

/// Tag id written as `blocks_array_type` when a section has no block grid.
pub const ABSENT_ARRAY_TYPE: i8 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockArrayType {
    Byte,
    Int,
    Long,
}

impl BlockArrayType {
    /// Picks the narrowest type holding every value. Empty arrays use `Byte`.
    pub fn fitting(values: &[u32]) -> Self {
        match values.iter().copied().max().unwrap_or(0) {
            0..=127 => BlockArrayType::Byte,
            128..=0x7FFF_FFFF => BlockArrayType::Int,
            _ => BlockArrayType::Long,
        }
    }

    /// The NBT tag id of the backing array type.
    pub fn tag_id(self) -> i8 {
        match self {
            BlockArrayType::Byte => 7,
            BlockArrayType::Int => 11,
            BlockArrayType::Long => 12,
        }
    }

    pub fn from_tag_id(tag_id: i8) -> Result<Self> {
        match tag_id {
            7 => Ok(BlockArrayType::Byte),
            11 => Ok(BlockArrayType::Int),
            12 => Ok(BlockArrayType::Long),
            other => Err(ConstructionError::MalformedSection(format!(
                "Unknown blocks_array_type {}",
                other
            ))),
        }
    }
}

/// Encodes `values` with the narrowest fitting array type.
pub fn encode(values: &[u32]) -> (BlockArrayType, Tag) {
    let array_type = BlockArrayType::fitting(values);
    let tag = match array_type {
        BlockArrayType::Byte => Tag::ByteArray(values.iter().map(|&v| v as i8).collect()),
        BlockArrayType::Int => Tag::IntArray(values.iter().map(|&v| v as i32).collect()),
        BlockArrayType::Long => Tag::LongArray(values.iter().map(|&v| i64::from(v)).collect()),
    };
    (array_type, tag)
}

fn to_index<T: Copy + Into<i64>>(value: T) -> Result<u32> {
    let wide: i64 = value.into();
    u32::try_from(wide).map_err(|_| {
        ConstructionError::MalformedSection(format!("Block index {} out of range", wide))
    })
}

/// Reinterprets `tag` as `array_type`, rejecting mismatched tags and negative indices.
pub fn decode(array_type: BlockArrayType, tag: &Tag) -> Result<Vec<u32>> {
    let mismatch = || {
        ConstructionError::MalformedSection(format!(
            "blocks_array_type {} does not match tag type {}",
            array_type.tag_id(),
            tag.get_type_id()
        ))
    };

    match array_type {
        BlockArrayType::Byte => tag
            .as_byte_array()
            .ok_or_else(mismatch)?
            .iter()
            .map(|&v| to_index(v))
            .collect(),
        BlockArrayType::Int => tag
            .as_int_array()
            .ok_or_else(mismatch)?
            .iter()
            .map(|&v| to_index(v))
            .collect(),
        BlockArrayType::Long => tag
            .as_long_array()
            .ok_or_else(mismatch)?
            .iter()
            .map(|&v| to_index(v))
            .collect(),
    }
}
