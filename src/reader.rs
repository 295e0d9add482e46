//! Read sessions over a construction file or buffer.
//!
//! A session walks `Unopened -> HeaderValidated -> MetadataLoaded`. Sections can then be
//! decoded one at a time through the index. Any validation or decode failure moves the
//! session to `Failed` and releases the byte source; closing moves it to `Closed`.

use crate::construction::Construction;
use crate::error::{ConstructionError, MagicLocation, Result};
use crate::format::{self, FormatVersion, FOOTER_SIZE, HEADER_SIZE};
use crate::index::SectionIndexEntry;
use crate::metadata::{self, ExportVersion, Metadata};
use crate::section::{Coordinate, Section};
use crate::selection::SelectionBox;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use construction_block::Block;
use construction_logger::log;
use construction_logger::LogSeverity::{Debug, Error};
use construction_nbt::NBTFile;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Unopened,
    HeaderValidated,
    MetadataLoaded,
    Closed,
    Failed,
}

#[derive(Debug)]
pub struct ConstructionReader<S: Read + Seek> {
    source: Option<S>,
    state: ReaderState,
    format_version: Option<FormatVersion>,
    source_len: u64,
    metadata: Option<Metadata>,
}

impl ConstructionReader<BufReader<File>> {
    /// Opens `path` and loads its metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_source(BufReader::new(file))
    }
}

impl ConstructionReader<Cursor<Bytes>> {
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        Self::from_source(Cursor::new(data.into()))
    }
}

fn read_exact_at<S: Read + Seek>(source: &mut S, offset: u64, length: u64, source_len: u64) -> Result<Vec<u8>> {
    if offset.checked_add(length).map_or(true, |end| end > source_len) {
        return Err(ConstructionError::io_at(
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("range ends past the end of a {} byte source", source_len),
            ),
            offset,
            length,
        ));
    }
    let mut buffer = vec![0u8; length as usize];
    source
        .seek(SeekFrom::Start(offset))
        .and_then(|_| source.read_exact(&mut buffer))
        .map_err(|e| ConstructionError::io_at(e, offset, length))?;
    Ok(buffer)
}

impl<S: Read + Seek> ConstructionReader<S> {
    /// A session in the `Unopened` state. Nothing is read yet.
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            state: ReaderState::Unopened,
            format_version: None,
            source_len: 0,
            metadata: None,
        }
    }

    /// Validates the header and footer, then loads the metadata.
    pub fn from_source(source: S) -> Result<Self> {
        let mut reader = Self::new(source);
        reader.load_metadata()?;
        Ok(reader)
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn format_version(&self) -> Option<FormatVersion> {
        self.format_version
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn export_version(&self) -> Option<&ExportVersion> {
        self.metadata.as_ref().map(|m| &m.export_version)
    }

    pub fn selection_boxes(&self) -> &[SelectionBox] {
        self.metadata.as_ref().map_or(&[], |m| &m.selection_boxes)
    }

    pub fn palette(&self) -> &[Block] {
        self.metadata.as_ref().map_or(&[], |m| &m.palette)
    }

    /// Index entries with absolute origins, in file order.
    pub fn index(&self) -> &[SectionIndexEntry] {
        self.metadata.as_ref().map_or(&[], |m| &m.index)
    }

    pub fn len(&self) -> usize {
        self.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index().is_empty()
    }

    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            log(format!("Construction read failed: {}", err), Error);
            self.state = ReaderState::Failed;
            self.source = None;
        }
        result
    }

    fn source_mut(&mut self) -> Result<&mut S> {
        self.source.as_mut().ok_or(ConstructionError::SessionClosed)
    }

    /// `Unopened -> HeaderValidated`. A no-op once past that state.
    pub fn validate_header(&mut self) -> Result<()> {
        match self.state {
            ReaderState::Unopened => {}
            ReaderState::Closed | ReaderState::Failed => return Err(ConstructionError::SessionClosed),
            _ => return Ok(()),
        }
        let result = self.read_header();
        let version = self.guard(result)?;
        self.format_version = Some(version);
        self.state = ReaderState::HeaderValidated;
        Ok(())
    }

    fn read_header(&mut self) -> Result<FormatVersion> {
        let source = self.source_mut()?;
        let source_len = source
            .seek(SeekFrom::End(0))
            .map_err(|e| ConstructionError::io_at(e, 0, 0))?;
        source
            .seek(SeekFrom::Start(0))
            .map_err(|e| ConstructionError::io_at(e, 0, 0))?;

        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        source
            .by_ref()
            .take(HEADER_SIZE)
            .read_to_end(&mut header)
            .map_err(|e| ConstructionError::io_at(e, 0, HEADER_SIZE))?;
        let version = format::parse_header(&header)?;
        self.source_len = source_len;
        Ok(version)
    }

    /// `HeaderValidated -> MetadataLoaded`, validating the header first if needed.
    pub fn load_metadata(&mut self) -> Result<()> {
        self.validate_header()?;
        if self.state == ReaderState::MetadataLoaded {
            return Ok(());
        }
        let result = self.read_metadata();
        let metadata = self.guard(result)?;
        log(
            format!(
                "Loaded construction metadata: {} {:?}, {} sections, {} palette entries",
                metadata.export_version.edition,
                metadata.export_version.version,
                metadata.index.len(),
                metadata.palette.len()
            ),
            Debug,
        );
        self.metadata = Some(metadata);
        self.state = ReaderState::MetadataLoaded;
        Ok(())
    }

    fn read_metadata(&mut self) -> Result<Metadata> {
        let version = self.format_version.unwrap_or(FormatVersion::LATEST);
        let source_len = self.source_len;
        if source_len < HEADER_SIZE + FOOTER_SIZE {
            let source = self.source_mut()?;
            let tail = read_exact_at(source, HEADER_SIZE, source_len - HEADER_SIZE, source_len)?;
            return Err(ConstructionError::InvalidMagic {
                location: MagicLocation::Footer,
                found: tail,
            });
        }

        let source = self.source_mut()?;
        if version.has_footer_magic() {
            let magic = read_exact_at(source, source_len - 8, 8, source_len)?;
            format::check_magic(&magic, MagicLocation::Footer)?;
        }

        let offset_position = source_len - FOOTER_SIZE;
        let metadata_offset = source
            .seek(SeekFrom::Start(offset_position))
            .and_then(|_| source.read_u32::<BigEndian>())
            .map_err(|e| ConstructionError::io_at(e, offset_position, 4))?;
        let metadata_offset = u64::from(metadata_offset);
        if metadata_offset < HEADER_SIZE || metadata_offset > offset_position {
            return Err(ConstructionError::MalformedMetadata(format!(
                "Metadata offset {} outside {}..{}",
                metadata_offset, HEADER_SIZE, offset_position
            )));
        }

        let blob = read_exact_at(
            source,
            metadata_offset,
            offset_position - metadata_offset,
            source_len,
        )?;
        let file = NBTFile::from_gzip_bytes(&blob).map_err(ConstructionError::Nbt)?;
        metadata::decode(&file.root)
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        match self.state {
            ReaderState::MetadataLoaded => Ok(()),
            ReaderState::Closed | ReaderState::Failed => Err(ConstructionError::SessionClosed),
            _ => self.load_metadata(),
        }
    }

    /// Decodes the section for index entry `i`, `None` past the end of the index.
    pub fn read_section(&mut self, i: usize) -> Result<Option<Section>> {
        self.ensure_loaded()?;
        let Some(entry) = self.index().get(i).copied() else {
            return Ok(None);
        };
        let result = self.decode_entry(&entry);
        self.guard(result).map(Some)
    }

    /// Decodes the section whose origin is `origin`, if the index has one.
    pub fn section_at(&mut self, origin: Coordinate) -> Result<Option<Section>> {
        self.ensure_loaded()?;
        match self.index().iter().position(|entry| entry.origin == origin) {
            Some(i) => self.read_section(i),
            None => Ok(None),
        }
    }

    fn decode_entry(&mut self, entry: &SectionIndexEntry) -> Result<Section> {
        let source_len = self.source_len;
        let source = self.source_mut()?;
        let blob = read_exact_at(
            source,
            u64::from(entry.offset),
            u64::from(entry.length),
            source_len,
        )?;
        Section::decode(&blob, entry.origin, entry.shape)
    }

    /// Releases the byte source. Metadata stays readable.
    pub fn close(&mut self) {
        self.source = None;
        if self.state != ReaderState::Failed {
            self.state = ReaderState::Closed;
        }
    }

    /// A lazy, single-pass sequence of every section in index order. The byte source is
    /// released once the sequence is exhausted or dropped.
    pub fn into_sections(self) -> SectionIter<S> {
        SectionIter {
            reader: self,
            next: 0,
        }
    }

    /// Decodes every section into an in-memory construction.
    pub fn into_construction(mut self) -> Result<Construction> {
        self.ensure_loaded()?;
        let Some(metadata) = self.metadata.clone() else {
            return Err(ConstructionError::SessionClosed);
        };

        let mut construction = Construction::new(
            metadata.palette,
            metadata.export_version.edition,
            metadata.export_version.version,
        )
        .with_selection_boxes(metadata.selection_boxes);
        for section in self.into_sections() {
            construction.insert_section(section?);
        }
        Ok(construction)
    }
}

pub struct SectionIter<S: Read + Seek> {
    reader: ConstructionReader<S>,
    next: usize,
}

impl<S: Read + Seek> SectionIter<S> {
    /// The session backing this iterator.
    pub fn reader(&self) -> &ConstructionReader<S> {
        &self.reader
    }
}

impl<S: Read + Seek> Iterator for SectionIter<S> {
    type Item = Result<Section>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.state != ReaderState::MetadataLoaded {
            if matches!(self.reader.state, ReaderState::Unopened | ReaderState::HeaderValidated) {
                if let Err(err) = self.reader.load_metadata() {
                    return Some(Err(err));
                }
            } else {
                return None;
            }
        }

        match self.reader.read_section(self.next) {
            Ok(Some(section)) => {
                self.next += 1;
                Some(Ok(section))
            }
            Ok(None) => {
                self.reader.close();
                None
            }
            Err(err) => Some(Err(err)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.reader.state == ReaderState::MetadataLoaded {
            let remaining = self.reader.len().saturating_sub(self.next);
            (0, Some(remaining))
        } else {
            (0, None)
        }
    }
}
