//! The metadata record stored near the end of the file.

use crate::error::{ConstructionError, Result, VersionComponent};
use crate::format::{keys, SECTION_VERSION};
use crate::index::{self, SectionIndexEntry};
use crate::palette::{self, PaletteLayout};
use crate::selection::{declared_minimum, SelectionBox};
use construction_block::Block;
use construction_nbt::{Compound, Tag};
use serde::{Deserialize, Serialize};

/// Game edition and version that produced the construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportVersion {
    pub edition: String,
    pub version: (i32, i32, i32),
}

impl ExportVersion {
    pub fn new(edition: impl Into<String>, version: (i32, i32, i32)) -> Self {
        Self {
            edition: edition.into(),
            version,
        }
    }

    fn to_tag(&self) -> Tag {
        let mut export = Compound::new();
        export.insert(keys::EDITION.to_owned(), Tag::String(self.edition.clone()));
        export.insert(
            keys::VERSION.to_owned(),
            Tag::List(vec![
                Tag::Int(self.version.0),
                Tag::Int(self.version.1),
                Tag::Int(self.version.2),
            ]),
        );
        Tag::Compound(export)
    }

    fn from_tag(tag: &Tag) -> Result<Self> {
        let edition = tag
            .get(keys::EDITION)
            .ok_or(ConstructionError::MissingMetadataField(keys::EDITION))?
            .as_string()
            .cloned()
            .ok_or_else(|| ConstructionError::MalformedMetadata("edition is not a string".to_owned()))?;

        let version: Vec<i32> = match tag.get(keys::VERSION) {
            None => return Err(ConstructionError::MissingMetadataField(keys::VERSION)),
            Some(Tag::IntArray(values)) => values.clone(),
            Some(Tag::List(values)) => values.iter().filter_map(Tag::as_i32).collect(),
            Some(_) => Vec::new(),
        };
        match version[..] {
            [major, minor, patch] => Ok(Self::new(edition, (major, minor, patch))),
            _ => Err(ConstructionError::MalformedMetadata(
                "version must hold three ints".to_owned(),
            )),
        }
    }
}

/// Everything a reader needs before touching any section blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub export_version: ExportVersion,
    pub selection_boxes: Vec<SelectionBox>,
    /// Entries carry absolute origins
    pub index: Vec<SectionIndexEntry>,
    /// The primary palette with extra blocks composed in
    pub palette: Vec<Block>,
}

pub fn encode(
    export_version: &ExportVersion,
    selection_boxes: &[SelectionBox],
    index: &[SectionIndexEntry],
    layout: &PaletteLayout,
) -> Result<Tag> {
    let table = index::encode_table(index, declared_minimum(selection_boxes))?;
    let primary_len = i32::try_from(layout.primary_len).map_err(|_| {
        ConstructionError::MalformedPalette(format!(
            "{} palette entries do not fit in an int",
            layout.primary_len
        ))
    })?;

    let mut record = Compound::new();
    record.insert(keys::SECTION_VERSION.to_owned(), Tag::Byte(SECTION_VERSION));
    record.insert(keys::EXPORT_VERSION.to_owned(), export_version.to_tag());
    record.insert(
        keys::SELECTION_BOXES.to_owned(),
        Tag::IntArray(selection_boxes.iter().flat_map(SelectionBox::to_ints).collect()),
    );
    record.insert(
        keys::SECTION_INDEX_TABLE.to_owned(),
        Tag::ByteArray(table.into_iter().map(|b| b as i8).collect()),
    );
    record.insert(keys::BLOCK_PALETTE.to_owned(), palette::encode(layout)?);
    record.insert(keys::PRIMARY_BLOCK_COUNT.to_owned(), Tag::Int(primary_len));
    Ok(Tag::Compound(record))
}

pub fn decode(root: &Tag) -> Result<Metadata> {
    if root.as_compound().is_none() {
        return Err(ConstructionError::MalformedMetadata(
            "metadata root is not a compound".to_owned(),
        ));
    }

    if let Some(version) = root.get(keys::SECTION_VERSION) {
        let version = version.as_i8().ok_or_else(|| {
            ConstructionError::MalformedMetadata("section_version is not a byte".to_owned())
        })?;
        if version != SECTION_VERSION {
            return Err(ConstructionError::UnsupportedVersion {
                component: VersionComponent::Section,
                version: i32::from(version),
            });
        }
    }

    let export_version = ExportVersion::from_tag(
        root.get(keys::EXPORT_VERSION)
            .ok_or(ConstructionError::MissingMetadataField(keys::EXPORT_VERSION))?,
    )?;

    let selection_boxes = match root.get(keys::SELECTION_BOXES) {
        None => Vec::new(),
        Some(Tag::IntArray(values)) => SelectionBox::from_ints(values)?,
        Some(_) => {
            return Err(ConstructionError::MalformedMetadata(
                "selection_boxes is not an int array".to_owned(),
            ))
        }
    };

    let table: Vec<u8> = root
        .get(keys::SECTION_INDEX_TABLE)
        .ok_or(ConstructionError::MissingMetadataField(keys::SECTION_INDEX_TABLE))?
        .as_byte_array()
        .ok_or_else(|| {
            ConstructionError::MalformedMetadata("section_index_table is not a byte array".to_owned())
        })?
        .iter()
        .map(|&b| b as u8)
        .collect();
    let index = index::decode_table(&table, declared_minimum(&selection_boxes))?;

    let primary_len = match root.get(keys::PRIMARY_BLOCK_COUNT) {
        None => None,
        Some(count) => {
            let count = count.as_i32().ok_or_else(|| {
                ConstructionError::MalformedMetadata("primary_block_count is not an int".to_owned())
            })?;
            Some(usize::try_from(count).map_err(|_| {
                ConstructionError::MalformedMetadata(format!("primary_block_count {} is negative", count))
            })?)
        }
    };
    let palette = palette::decode(
        root.get(keys::BLOCK_PALETTE)
            .ok_or(ConstructionError::MissingMetadataField(keys::BLOCK_PALETTE))?,
        primary_len,
    )?;

    Ok(Metadata {
        export_version,
        selection_boxes,
        index,
        palette,
    })
}
