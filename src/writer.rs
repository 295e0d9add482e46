use crate::construction::Construction;
use crate::error::{ConstructionError, Result};
use crate::format::{self, FormatVersion};
use crate::index::SectionIndexEntry;
use crate::metadata;
use crate::palette;
use construction_logger::log;
use construction_logger::LogSeverity::Debug;
use construction_nbt::NBTFile;
use flate2::Compression;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// gzip level for section and metadata blobs
    pub compression: Compression,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
        }
    }
}

/// Wraps a sink and tracks how many bytes went through it, so offsets can be recorded
/// without requiring `Seek`.
struct PositionedWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> PositionedWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Writes `bytes` and returns the offset they start at.
    fn put(&mut self, bytes: &[u8]) -> Result<u64> {
        let start = self.position;
        self.inner
            .write_all(bytes)
            .map_err(|e| ConstructionError::io_at(e, start, bytes.len() as u64))?;
        self.position += bytes.len() as u64;
        Ok(start)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| ConstructionError::io_at(e, self.position, 0))
    }
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        ConstructionError::io_at(
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} {} exceeds the 32-bit offset range", what, value),
            ),
            value,
            0,
        )
    })
}

/// Serializes `construction` into `sink` in the latest format.
pub fn write_construction<W: Write>(
    construction: &Construction,
    sink: W,
    options: &WriteOptions,
) -> Result<()> {
    let layout = palette::derive_extra_pool(construction.palette())?;
    let mut out = PositionedWriter::new(sink);
    out.put(&format::header(FormatVersion::LATEST))?;

    let mut index = Vec::with_capacity(construction.len());
    for section in construction.sections() {
        let blob = section.encode(options.compression)?;
        let offset = out.put(&blob)?;
        index.push(SectionIndexEntry {
            origin: section.origin(),
            shape: section.shape(),
            offset: to_u32(offset, "Section offset")?,
            length: to_u32(blob.len() as u64, "Section length")?,
        });
    }

    let selection_boxes = construction.effective_selection_boxes()?;
    let record = metadata::encode(
        construction.export_version(),
        &selection_boxes,
        &index,
        &layout,
    )?;
    let blob = NBTFile::new(String::new(), record)
        .to_gzip_bytes(options.compression)
        .map_err(ConstructionError::Nbt)?;

    let metadata_offset = to_u32(out.put(&blob)?, "Metadata offset")?;
    out.put(&format::footer(metadata_offset))?;
    out.flush()?;

    log(
        format!(
            "Wrote construction: {} sections, {} palette entries ({} pooled), {} bytes",
            index.len(),
            layout.primary_len,
            layout.pool_len(),
            out.position
        ),
        Debug,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::Section;
    use crate::format::{FOOTER_SIZE, HEADER_SIZE, MAGIC};
    use assert_matches::assert_matches;
    use construction_block::Block;

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn construction() -> Construction {
        Construction::from_sections(
            vec![Section::filled((0, 0, 0), (16, 16, 16), 1).unwrap()],
            vec![Block::new("minecraft", "air"), Block::new("minecraft", "stone")],
            "java",
            (1, 13, 2),
        )
    }

    #[test]
    fn test_layout_framing() {
        let bytes = construction().to_bytes().unwrap();
        assert_eq!(&bytes[..8], &MAGIC);
        assert_eq!(bytes[8], 0);
        assert_eq!(&bytes[bytes.len() - 8..], &MAGIC);

        let footer_start = bytes.len() - FOOTER_SIZE as usize;
        let offset = u32::from_be_bytes([
            bytes[footer_start],
            bytes[footer_start + 1],
            bytes[footer_start + 2],
            bytes[footer_start + 3],
        ]) as usize;
        assert!(offset > HEADER_SIZE as usize && offset < footer_start);
        // Section blobs and metadata are gzip members
        assert_eq!(&bytes[HEADER_SIZE as usize..HEADER_SIZE as usize + 2], &[0x1f, 0x8b]);
        assert_eq!(&bytes[offset..offset + 2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_output_is_deterministic() {
        assert_eq!(
            construction().to_bytes().unwrap(),
            construction().to_bytes().unwrap()
        );
    }

    #[test]
    fn test_sink_failure_reports_offset() {
        let result = construction().write_to(FailingSink);
        assert_matches!(
            result,
            Err(ConstructionError::Io {
                offset: 0,
                length: 9,
                ..
            })
        );
    }

    #[test]
    fn test_nested_extra_fails_before_writing() {
        let mut vine = Block::new("minecraft", "vine");
        vine.extra_blocks.push(Block::new("minecraft", "water"));
        let mut stone = Block::new("minecraft", "stone");
        stone.extra_blocks.push(vine);
        let construction = Construction::from_sections(
            vec![Section::filled((0, 0, 0), (2, 2, 2), 0).unwrap()],
            vec![stone],
            "java",
            (1, 13, 2),
        );

        let mut sink = Vec::new();
        assert_matches!(
            construction.write_to(&mut sink),
            Err(ConstructionError::MalformedPalette(_))
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_compression_level_changes_size() {
        let fast = WriteOptions {
            compression: Compression::none(),
        };
        let mut stored = Vec::new();
        construction().write_to_with(&mut stored, &fast).unwrap();
        assert!(stored.len() > construction().to_bytes().unwrap().len());
    }
}
