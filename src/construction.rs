use crate::error::Result;
use crate::metadata::ExportVersion;
use crate::reader::ConstructionReader;
use crate::section::{Coordinate, Section};
use crate::selection::SelectionBox;
use crate::writer::{self, WriteOptions};
use bytes::Bytes;
use construction_block::Block;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A set of sections sharing one block palette.
///
/// Sections keep their insertion order, which is also the order of the section index on
/// disk. Inserting a section at an origin that is already present replaces it in place.
#[derive(Debug, Clone)]
pub struct Construction {
    sections: Vec<Section>,
    positions: HashMap<Coordinate, usize>,
    palette: Vec<Block>,
    export_version: ExportVersion,
    selection_boxes: Option<Vec<SelectionBox>>,
}

impl Construction {
    pub fn new(palette: Vec<Block>, edition: impl Into<String>, version: (i32, i32, i32)) -> Self {
        Self {
            sections: Vec::new(),
            positions: HashMap::new(),
            palette,
            export_version: ExportVersion::new(edition, version),
            selection_boxes: None,
        }
    }

    /// Collects `sections` in iteration order; later duplicates of an origin win.
    pub fn from_sections<I>(
        sections: I,
        palette: Vec<Block>,
        edition: impl Into<String>,
        version: (i32, i32, i32),
    ) -> Self
    where
        I: IntoIterator<Item = Section>,
    {
        let mut construction = Self::new(palette, edition, version);
        for section in sections {
            construction.insert_section(section);
        }
        construction
    }

    pub fn with_selection_boxes(mut self, boxes: Vec<SelectionBox>) -> Self {
        self.selection_boxes = Some(boxes);
        self
    }

    /// Returns the section previously stored at the same origin.
    pub fn insert_section(&mut self, section: Section) -> Option<Section> {
        match self.positions.get(&section.origin()) {
            Some(&slot) => Some(std::mem::replace(&mut self.sections[slot], section)),
            None => {
                self.positions.insert(section.origin(), self.sections.len());
                self.sections.push(section);
                None
            }
        }
    }

    pub fn section(&self, origin: Coordinate) -> Option<&Section> {
        self.positions.get(&origin).map(|&slot| &self.sections[slot])
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn palette(&self) -> &[Block] {
        &self.palette
    }

    /// Resolves a grid value to its block.
    pub fn block(&self, index: u32) -> Option<&Block> {
        self.palette.get(index as usize)
    }

    pub fn export_version(&self) -> &ExportVersion {
        &self.export_version
    }

    pub fn source_edition(&self) -> &str {
        &self.export_version.edition
    }

    pub fn source_version(&self) -> (i32, i32, i32) {
        self.export_version.version
    }

    /// Caller-supplied boxes, if any were given.
    pub fn selection_boxes(&self) -> Option<&[SelectionBox]> {
        self.selection_boxes.as_deref()
    }

    pub fn bounds(&self) -> Result<Option<SelectionBox>> {
        SelectionBox::bounding(&self.sections)
    }

    /// The boxes a writer stores: the supplied ones, else the single bounding box.
    pub fn effective_selection_boxes(&self) -> Result<Vec<SelectionBox>> {
        match &self.selection_boxes {
            Some(boxes) => Ok(boxes.clone()),
            None => Ok(self.bounds()?.into_iter().collect()),
        }
    }

    pub fn write_to<W: Write>(&self, sink: W) -> Result<()> {
        writer::write_construction(self, sink, &WriteOptions::default())
    }

    pub fn write_to_with<W: Write>(&self, sink: W, options: &WriteOptions) -> Result<()> {
        writer::write_construction(self, sink, options)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Writes to `path`, replacing any existing file. A failed write leaves a partial file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    /// Reads and decodes every section of the file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        ConstructionReader::open(path)?.into_construction()
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        ConstructionReader::from_bytes(data)?.into_construction()
    }
}

/// Sections (in order) and palette must match, as must the edition and version.
/// Selection boxes do not take part.
impl PartialEq for Construction {
    fn eq(&self, other: &Self) -> bool {
        self.sections == other.sections
            && self.palette == other.palette
            && self.export_version == other.export_version
    }
}
