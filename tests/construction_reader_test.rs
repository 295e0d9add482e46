mod common;

use assert_matches::assert_matches;
use common::*;
use construction::error::MagicLocation;
use construction::{Construction, ConstructionError, ConstructionReader, ReaderState, Section};

fn stacked_column() -> Vec<u8> {
    let sections = (0..3).map(|i| Section::filled((0, i * 16, 0), (16, 16, 16), i as u32).unwrap());
    Construction::from_sections(sections, basic_palette(), "java", (1, 13, 2))
        .to_bytes()
        .unwrap()
}

#[test]
fn test_metadata_without_sections() {
    let reader = ConstructionReader::from_bytes(stacked_column()).unwrap();
    assert_eq!(reader.state(), ReaderState::MetadataLoaded);
    assert_eq!(reader.len(), 3);
    assert_eq!(reader.palette(), basic_palette().as_slice());
    assert_eq!(reader.export_version().unwrap().edition, "java");

    let origins: Vec<_> = reader.index().iter().map(|entry| entry.origin).collect();
    assert_eq!(origins, vec![(0, 0, 0), (0, 16, 0), (0, 32, 0)]);
    assert_eq!(reader.selection_boxes().len(), 1);
    assert_eq!(reader.selection_boxes()[0].size, (16, 48, 16));
}

#[test]
fn test_lazy_iteration_in_index_order() {
    let sections: Vec<Section> = ConstructionReader::from_bytes(stacked_column())
        .unwrap()
        .into_sections()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(sections.len(), 3);
    for (i, section) in sections.iter().enumerate() {
        assert_eq!(section.origin(), (0, i as i32 * 16, 0));
        assert_eq!(section.block_at(15, 15, 15), Some(i as u32));
    }
}

#[test]
fn test_partial_iteration_then_drop() {
    let (source, dropped) = TrackedSource::new(stacked_column());
    let mut sections = ConstructionReader::from_source(source).unwrap().into_sections();
    let first = sections.next().unwrap().unwrap();
    assert_eq!(first.origin(), (0, 0, 0));
    assert_eq!(sections.reader().state(), ReaderState::MetadataLoaded);
    assert!(!dropped.get());

    drop(sections);
    assert!(dropped.get());
}

#[test]
fn test_exhausted_iteration_releases_source() {
    let (source, dropped) = TrackedSource::new(stacked_column());
    let mut sections = ConstructionReader::from_source(source).unwrap().into_sections();
    assert_eq!(sections.by_ref().count(), 3);

    // Released while the iterator itself is still alive
    assert!(dropped.get());
    assert_eq!(sections.reader().state(), ReaderState::Closed);
}

#[test]
fn test_failed_session_releases_source() {
    let mut bytes = stacked_column();
    let last = bytes.len() - 1;
    bytes[last] = b'X';
    let (source, dropped) = TrackedSource::new(bytes);
    let mut reader = ConstructionReader::new(source);
    assert!(reader.load_metadata().is_err());
    assert_eq!(reader.state(), ReaderState::Failed);
    assert!(dropped.get());
}

#[test]
fn test_file_session() {
    let path = TempPath::new("reader-session");
    std::fs::write(&path.0, stacked_column()).unwrap();

    let mut reader = ConstructionReader::open(&path.0).unwrap();
    let top = reader.section_at((0, 32, 0)).unwrap().unwrap();
    assert_eq!(top.block_at(0, 0, 0), Some(2));
    reader.close();
    assert_eq!(reader.state(), ReaderState::Closed);
    assert_matches!(reader.read_section(0), Err(ConstructionError::SessionClosed));
}

#[test]
fn test_bad_header_magic() {
    let mut bytes = stacked_column();
    bytes[0] = b'C';
    assert_matches!(
        ConstructionReader::from_bytes(bytes),
        Err(ConstructionError::InvalidMagic {
            location: MagicLocation::Header,
            ..
        })
    );
}

#[test]
fn test_bad_footer_magic() {
    let mut bytes = stacked_column();
    let last = bytes.len() - 1;
    bytes[last] = b'X';
    assert_matches!(
        ConstructionReader::from_bytes(bytes),
        Err(ConstructionError::InvalidMagic {
            location: MagicLocation::Footer,
            ..
        })
    );
}

#[test]
fn test_unknown_format_version() {
    let mut bytes = stacked_column();
    bytes[8] = 7;
    assert_matches!(
        ConstructionReader::from_bytes(bytes),
        Err(ConstructionError::UnsupportedVersion { version: 7, .. })
    );
}

#[test]
fn test_failed_session_rejects_further_reads() {
    let mut bytes = stacked_column();
    bytes[8] = 7;
    let mut reader = ConstructionReader::new(std::io::Cursor::new(bytes));
    assert!(reader.validate_header().is_err());
    assert_eq!(reader.state(), ReaderState::Failed);
    assert_matches!(reader.load_metadata(), Err(ConstructionError::SessionClosed));
    assert_eq!(reader.into_sections().count(), 0);
}
