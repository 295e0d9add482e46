//! Parallel section decoding.
//!
//! Once the metadata is loaded every section blob is an independent byte range, so each
//! one is decoded on tokio's blocking pool against a shared, read-only `Bytes` buffer.

use crate::construction::Construction;
use crate::error::{ConstructionError, Result};
use crate::index::SectionIndexEntry;
use crate::reader::ConstructionReader;
use crate::section::Section;
use bytes::Bytes;
use futures::future::join_all;
use std::io;
use std::path::Path;
use tokio::task;

fn decode_entry(data: &Bytes, entry: &SectionIndexEntry) -> Result<Section> {
    let range = entry.byte_range();
    if range.end > data.len() as u64 {
        return Err(ConstructionError::io_at(
            io::Error::new(io::ErrorKind::UnexpectedEof, "section blob past end of buffer"),
            range.start,
            u64::from(entry.length),
        ));
    }
    let blob = data.slice(range.start as usize..range.end as usize);
    Section::decode(&blob, entry.origin, entry.shape)
}

/// Decodes `data` into a construction, decoding sections concurrently.
/// Section order matches the index.
pub async fn read_bytes_concurrently(data: Bytes) -> Result<Construction> {
    let reader = ConstructionReader::from_bytes(data.clone())?;
    let Some(metadata) = reader.metadata().cloned() else {
        return Err(ConstructionError::SessionClosed);
    };
    drop(reader);

    let tasks = metadata.index.iter().copied().map(|entry| {
        let data = data.clone();
        task::spawn_blocking(move || decode_entry(&data, &entry))
    });
    let results = join_all(tasks).await;

    let mut construction = Construction::new(
        metadata.palette,
        metadata.export_version.edition,
        metadata.export_version.version,
    )
    .with_selection_boxes(metadata.selection_boxes);
    for result in results {
        let section = result.map_err(|e| ConstructionError::TaskFailed(e.to_string()))??;
        construction.insert_section(section);
    }
    Ok(construction)
}

pub async fn read_file_concurrently<P: AsRef<Path>>(path: P) -> Result<Construction> {
    let data = tokio::fs::read(path).await?;
    read_bytes_concurrently(Bytes::from(data)).await
}
