//! One rectangular sub-volume of a construction and its compressed blob codec.

use crate::array::{self, BlockArrayType, ABSENT_ARRAY_TYPE};
use crate::error::{ConstructionError, Result};
use construction_nbt::{Compound, NBTFile, Tag};
use flate2::Compression;

/// Absolute block coordinate of a section's minimum corner.
pub type Coordinate = (i32, i32, i32);

/// Size along x, y and z. Every axis is at least 1.
pub type Shape = (u8, u8, u8);

pub fn volume(shape: Shape) -> usize {
    usize::from(shape.0) * usize::from(shape.1) * usize::from(shape.2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    origin: Coordinate,
    shape: Shape,
    /// Palette indices, x-major then y then z
    blocks: Option<Vec<u32>>,
    entities: Vec<Tag>,
    block_entities: Option<Vec<Tag>>,
}

impl Section {
    /// Fails with `MalformedSection` when an axis of `shape` is zero or the grid length
    /// does not match the shape's volume.
    pub fn new(
        origin: Coordinate,
        shape: Shape,
        blocks: Option<Vec<u32>>,
        entities: Vec<Tag>,
        block_entities: Option<Vec<Tag>>,
    ) -> Result<Self> {
        if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
            return Err(ConstructionError::MalformedSection(format!(
                "Section at {:?} has an empty shape {:?}",
                origin, shape
            )));
        }
        if let Some(blocks) = &blocks {
            if blocks.len() != volume(shape) {
                return Err(ConstructionError::MalformedSection(format!(
                    "Section at {:?} with shape {:?} needs {} blocks, got {}",
                    origin,
                    shape,
                    volume(shape),
                    blocks.len()
                )));
            }
        }

        Ok(Self {
            origin,
            shape,
            blocks,
            entities,
            block_entities,
        })
    }

    /// A section whose every cell holds `index`.
    pub fn filled(origin: Coordinate, shape: Shape, index: u32) -> Result<Self> {
        Self::new(origin, shape, Some(vec![index; volume(shape)]), Vec::new(), Some(Vec::new()))
    }

    pub fn origin(&self) -> Coordinate {
        self.origin
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn volume(&self) -> usize {
        volume(self.shape)
    }

    pub fn blocks(&self) -> Option<&[u32]> {
        self.blocks.as_deref()
    }

    pub fn entities(&self) -> &[Tag] {
        &self.entities
    }

    pub fn block_entities(&self) -> Option<&[Tag]> {
        self.block_entities.as_deref()
    }

    fn flat_index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        let (sx, sy, sz) = (
            usize::from(self.shape.0),
            usize::from(self.shape.1),
            usize::from(self.shape.2),
        );
        if x >= sx || y >= sy || z >= sz {
            return None;
        }
        Some(x * sy * sz + y * sz + z)
    }

    /// Palette index at local `(x, y, z)`, `None` outside the shape or without a grid.
    pub fn block_at(&self, x: usize, y: usize, z: usize) -> Option<u32> {
        let index = self.flat_index(x, y, z)?;
        self.blocks.as_ref().map(|blocks| blocks[index])
    }

    /// Returns `false` when the cell is outside the shape or the section has no grid.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, value: u32) -> bool {
        match (self.flat_index(x, y, z), self.blocks.as_mut()) {
            (Some(index), Some(blocks)) => {
                blocks[index] = value;
                true
            }
            _ => false,
        }
    }

    pub fn push_entity(&mut self, entity: Tag) {
        self.entities.push(entity);
    }

    /// Encodes the section as one gzip-compressed NBT blob.
    pub fn encode(&self, level: Compression) -> Result<Vec<u8>> {
        let mut record = Compound::new();
        record.insert("entities".to_owned(), Tag::List(self.entities.clone()));
        if let Some(block_entities) = &self.block_entities {
            record.insert("block_entities".to_owned(), Tag::List(block_entities.clone()));
        }
        match &self.blocks {
            Some(blocks) => {
                let (array_type, tag) = array::encode(blocks);
                record.insert("blocks".to_owned(), tag);
                record.insert(
                    "blocks_array_type".to_owned(),
                    Tag::Byte(array_type.tag_id()),
                );
            }
            None => {
                record.insert("blocks_array_type".to_owned(), Tag::Byte(ABSENT_ARRAY_TYPE));
            }
        }

        NBTFile::new(String::new(), Tag::Compound(record))
            .to_gzip_bytes(level)
            .map_err(ConstructionError::Nbt)
    }

    /// Decodes a blob produced by [`Section::encode`], reshaping the grid to `shape`.
    pub fn decode(blob: &[u8], origin: Coordinate, shape: Shape) -> Result<Self> {
        let file = NBTFile::from_gzip_bytes(blob).map_err(ConstructionError::Nbt)?;
        let Tag::Compound(mut record) = file.root else {
            return Err(ConstructionError::MalformedSection(format!(
                "Section at {:?} is not a compound",
                origin
            )));
        };

        let entities = take_list(&mut record, "entities", origin)?.unwrap_or_default();
        let block_entities = match take_list(&mut record, "block_entities", origin)? {
            Some(list) => Some(list),
            None => take_list(&mut record, "tile_entities", origin)?,
        };

        let array_type = record
            .get("blocks_array_type")
            .and_then(Tag::as_i8)
            .ok_or_else(|| {
                ConstructionError::MalformedSection(format!(
                    "Section at {:?} has no blocks_array_type",
                    origin
                ))
            })?;
        let blocks = if array_type == ABSENT_ARRAY_TYPE {
            None
        } else {
            let array_type = BlockArrayType::from_tag_id(array_type)?;
            let tag = record.get("blocks").ok_or_else(|| {
                ConstructionError::MalformedSection(format!(
                    "Section at {:?} declares a grid but has no blocks",
                    origin
                ))
            })?;
            Some(array::decode(array_type, tag)?)
        };

        Self::new(origin, shape, blocks, entities, block_entities)
    }
}

fn take_list(record: &mut Compound, key: &str, origin: Coordinate) -> Result<Option<Vec<Tag>>> {
    match record.remove(key) {
        None => Ok(None),
        Some(Tag::List(list)) => Ok(Some(list)),
        Some(other) => Err(ConstructionError::MalformedSection(format!(
            "Section at {:?}: {} has tag type {}, expected a list",
            origin,
            key,
            other.get_type_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn chest() -> Tag {
        let mut chest = Compound::new();
        chest.insert("id".to_owned(), Tag::String("minecraft:chest".to_owned()));
        chest.insert("x".to_owned(), Tag::Int(3));
        Tag::Compound(chest)
    }

    fn octants() -> Vec<u32> {
        let mut blocks = vec![0; 16 * 16 * 16];
        for x in 0..16 {
            for y in 0..16 {
                for z in 0..16 {
                    blocks[x * 256 + y * 16 + z] =
                        1 + (x / 8) as u32 * 4 + (y / 8) as u32 * 2 + (z / 8) as u32;
                }
            }
        }
        blocks
    }

    #[test]
    fn test_row_major_indexing() {
        let section = Section::new((0, 0, 0), (16, 16, 16), Some(octants()), vec![], None).unwrap();
        assert_eq!(section.block_at(0, 0, 0), Some(1));
        assert_eq!(section.block_at(0, 0, 8), Some(2));
        assert_eq!(section.block_at(0, 8, 0), Some(3));
        assert_eq!(section.block_at(8, 0, 0), Some(5));
        assert_eq!(section.block_at(15, 15, 15), Some(8));
        assert_eq!(section.block_at(16, 0, 0), None);
    }

    #[test]
    fn test_blob_round_trip() {
        let section = Section::new(
            (16, -32, 48),
            (16, 16, 16),
            Some(octants()),
            vec![],
            Some(vec![chest()]),
        )
        .unwrap();
        let blob = section.encode(Compression::default()).unwrap();
        let decoded = Section::decode(&blob, (16, -32, 48), (16, 16, 16)).unwrap();
        assert_eq!(decoded, section);
    }

    #[test]
    fn test_absent_grid_and_block_entities_stay_absent() {
        let section = Section::new((0, 0, 0), (4, 4, 4), None, vec![chest()], None).unwrap();
        let blob = section.encode(Compression::fast()).unwrap();

        let record = NBTFile::from_gzip_bytes(&blob).unwrap().root;
        assert_eq!(record.get("blocks"), None);
        assert_eq!(record.get("block_entities"), None);
        assert_eq!(record.get("blocks_array_type"), Some(&Tag::Byte(-1)));

        let decoded = Section::decode(&blob, (0, 0, 0), (4, 4, 4)).unwrap();
        assert_eq!(decoded.blocks(), None);
        assert_eq!(decoded.block_entities(), None);
        assert_eq!(decoded.entities(), &[chest()]);
    }

    #[test]
    fn test_all_zero_grid_is_not_absent() {
        let section = Section::filled((0, 0, 0), (2, 2, 2), 0).unwrap();
        let blob = section.encode(Compression::default()).unwrap();
        let decoded = Section::decode(&blob, (0, 0, 0), (2, 2, 2)).unwrap();
        assert_eq!(decoded.blocks(), Some(&[0u32; 8][..]));
    }

    #[test]
    fn test_wide_indices_use_int_array() {
        let mut section = Section::filled((0, 0, 0), (2, 1, 1), 0).unwrap();
        assert!(section.set_block(1, 0, 0, 128));
        let blob = section.encode(Compression::default()).unwrap();
        let record = NBTFile::from_gzip_bytes(&blob).unwrap().root;
        assert_eq!(record.get("blocks_array_type"), Some(&Tag::Byte(11)));
        assert_eq!(record.get("blocks"), Some(&Tag::IntArray(vec![0, 128])));
    }

    #[test]
    fn test_legacy_tile_entities_key() {
        let mut record = Compound::new();
        record.insert("entities".to_owned(), Tag::List(vec![]));
        record.insert("tile_entities".to_owned(), Tag::List(vec![chest()]));
        record.insert("blocks".to_owned(), Tag::ByteArray(vec![1]));
        record.insert("blocks_array_type".to_owned(), Tag::Byte(7));
        let blob = NBTFile::new(String::new(), Tag::Compound(record))
            .to_gzip_bytes(Compression::default())
            .unwrap();

        let decoded = Section::decode(&blob, (0, 0, 0), (1, 1, 1)).unwrap();
        assert_eq!(decoded.block_entities(), Some(&[chest()][..]));
    }

    #[test]
    fn test_shape_mismatch_is_malformed() {
        assert_matches!(
            Section::new((0, 0, 0), (2, 2, 2), Some(vec![0; 7]), vec![], None),
            Err(ConstructionError::MalformedSection(_))
        );
        assert_matches!(
            Section::new((0, 0, 0), (0, 2, 2), None, vec![], None),
            Err(ConstructionError::MalformedSection(_))
        );

        let blob = Section::filled((0, 0, 0), (2, 2, 2), 1)
            .unwrap()
            .encode(Compression::default())
            .unwrap();
        assert_matches!(
            Section::decode(&blob, (0, 0, 0), (3, 2, 2)),
            Err(ConstructionError::MalformedSection(_))
        );
    }

    #[test]
    fn test_corrupt_blob_is_nbt_error() {
        assert_matches!(
            Section::decode(b"not gzip at all", (0, 0, 0), (1, 1, 1)),
            Err(ConstructionError::Nbt(_))
        );
    }
}
