//! The section index table: one fixed-width record per section, in insertion order.
//!
//! Record layout (big-endian, 23 bytes):
//! `x: i32, y: i32, z: i32, sx: u8, sy: u8, sz: u8, offset: u32, length: u32`
//!
//! Coordinates on disk are relative to the declared minimum; in memory they are absolute.

use crate::error::{ConstructionError, Result};
use crate::section::{Coordinate, Shape};
use bytes::{Buf, BufMut, BytesMut};
use std::ops::Range;

pub const ENTRY_SIZE: usize = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionIndexEntry {
    pub origin: Coordinate,
    pub shape: Shape,
    /// Absolute byte offset of the section blob
    pub offset: u32,
    pub length: u32,
}

impl SectionIndexEntry {
    pub fn byte_range(&self) -> Range<u64> {
        let start = u64::from(self.offset);
        start..start + u64::from(self.length)
    }
}

fn relative(origin: Coordinate, minimum: Coordinate) -> Result<Coordinate> {
    let axis = |value: i32, min: i32| {
        value.checked_sub(min).ok_or_else(|| {
            ConstructionError::MalformedSection(format!(
                "Section origin {:?} is not representable relative to {:?}",
                origin, minimum
            ))
        })
    };
    Ok((
        axis(origin.0, minimum.0)?,
        axis(origin.1, minimum.1)?,
        axis(origin.2, minimum.2)?,
    ))
}

fn absolute(origin: Coordinate, minimum: Coordinate) -> Result<Coordinate> {
    let axis = |value: i32, min: i32| {
        value.checked_add(min).ok_or_else(|| {
            ConstructionError::MalformedMetadata(format!(
                "Index origin {:?} overflows when offset by {:?}",
                origin, minimum
            ))
        })
    };
    Ok((
        axis(origin.0, minimum.0)?,
        axis(origin.1, minimum.1)?,
        axis(origin.2, minimum.2)?,
    ))
}

/// Serializes `entries` into the opaque `section_index_table` byte array.
pub fn encode_table(entries: &[SectionIndexEntry], minimum: Coordinate) -> Result<Vec<u8>> {
    let mut table = BytesMut::with_capacity(entries.len() * ENTRY_SIZE);
    for entry in entries {
        let (x, y, z) = relative(entry.origin, minimum)?;
        table.put_i32(x);
        table.put_i32(y);
        table.put_i32(z);
        table.put_u8(entry.shape.0);
        table.put_u8(entry.shape.1);
        table.put_u8(entry.shape.2);
        table.put_u32(entry.offset);
        table.put_u32(entry.length);
    }
    Ok(table.to_vec())
}

/// Scans the table at a fixed stride, restoring absolute origins.
pub fn decode_table(mut table: &[u8], minimum: Coordinate) -> Result<Vec<SectionIndexEntry>> {
    if table.len() % ENTRY_SIZE != 0 {
        return Err(ConstructionError::MalformedMetadata(format!(
            "section_index_table is {} bytes, not a multiple of {}",
            table.len(),
            ENTRY_SIZE
        )));
    }

    let mut entries = Vec::with_capacity(table.len() / ENTRY_SIZE);
    while table.has_remaining() {
        let origin = (table.get_i32(), table.get_i32(), table.get_i32());
        let shape = (table.get_u8(), table.get_u8(), table.get_u8());
        let offset = table.get_u32();
        let length = table.get_u32();
        if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
            return Err(ConstructionError::MalformedMetadata(format!(
                "Index entry {} has an empty shape {:?}",
                entries.len(),
                shape
            )));
        }
        entries.push(SectionIndexEntry {
            origin: absolute(origin, minimum)?,
            shape,
            offset,
            length,
        });
    }
    Ok(entries)
}
