//! Block palette codec.
//!
//! On disk the palette is one list of records, the primary palette first and then the
//! extra-block pool: blocks that only ever appear layered inside a primary entry. An extra
//! block is referenced by its position in that combined list.

use crate::error::{ConstructionError, Result};
use construction_block::{compose, Block};
use construction_nbt::{Compound, Tag};
use std::collections::{BTreeMap, HashMap};

/// The combined primary + pool list, ready to be emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteLayout {
    /// Base blocks (no extras) in emission order.
    pub entries: Vec<Block>,
    /// For every entry, the combined-list indices of its extra blocks.
    pub extra_refs: Vec<Vec<usize>>,
    pub primary_len: usize,
}

impl PaletteLayout {
    pub fn pool_len(&self) -> usize {
        self.entries.len() - self.primary_len
    }
}

/// Assigns every extra block a combined-list index, reusing plain primary entries and
/// pooling the rest in first-seen order.
///
/// Extra blocks must be flat. An extra that carries extras of its own is
/// `MalformedPalette`; build layered blocks with [`compose`] instead.
pub fn derive_extra_pool(primary: &[Block]) -> Result<PaletteLayout> {
    let mut lookup: HashMap<Block, usize> = HashMap::new();
    for (index, block) in primary.iter().enumerate() {
        if !block.has_extra_blocks() {
            lookup.entry(block.clone()).or_insert(index);
        }
    }

    let mut entries: Vec<Block> = primary.iter().map(Block::base).collect();
    let mut extra_refs = Vec::with_capacity(primary.len());
    for (position, block) in primary.iter().enumerate() {
        let mut refs = Vec::with_capacity(block.extra_blocks.len());
        for extra in &block.extra_blocks {
            if extra.has_extra_blocks() {
                return Err(ConstructionError::MalformedPalette(format!(
                    "Palette entry {} ({}) has a nested extra block {}",
                    position, block, extra
                )));
            }
            let extra = extra.base();
            let index = match lookup.get(&extra) {
                Some(&index) => index,
                None => {
                    let index = entries.len();
                    entries.push(extra.clone());
                    lookup.insert(extra, index);
                    index
                }
            };
            refs.push(index);
        }
        extra_refs.push(refs);
    }
    extra_refs.resize(entries.len(), Vec::new());

    Ok(PaletteLayout {
        entries,
        extra_refs,
        primary_len: primary.len(),
    })
}

fn block_to_tag(block: &Block, refs: &[usize]) -> Result<Tag> {
    let properties: Compound = block
        .properties
        .iter()
        .map(|(key, value)| (key.clone(), Tag::String(value.clone())))
        .collect();
    let extra_blocks = refs
        .iter()
        .map(|&index| {
            i32::try_from(index).map(Tag::Int).map_err(|_| {
                ConstructionError::MalformedPalette(format!("Palette index {} overflows", index))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut record = Compound::new();
    record.insert("namespace".to_owned(), Tag::String(block.namespace.clone()));
    record.insert("blockname".to_owned(), Tag::String(block.base_name.clone()));
    record.insert("properties".to_owned(), Tag::Compound(properties));
    record.insert("extra_blocks".to_owned(), Tag::List(extra_blocks));
    Ok(Tag::Compound(record))
}

/// Encodes the layout as the `block_palette` list.
pub fn encode(layout: &PaletteLayout) -> Result<Tag> {
    layout
        .entries
        .iter()
        .zip(&layout.extra_refs)
        .map(|(block, refs)| block_to_tag(block, refs))
        .collect::<Result<Vec<_>>>()
        .map(Tag::List)
}

fn malformed(index: usize, msg: &str) -> ConstructionError {
    ConstructionError::MalformedPalette(format!("Entry {}: {}", index, msg))
}

fn string_field(record: &Tag, key: &str, index: usize) -> Result<String> {
    record
        .get(key)
        .and_then(Tag::as_string)
        .cloned()
        .ok_or_else(|| malformed(index, &format!("missing string \"{}\"", key)))
}

fn tag_to_block(record: &Tag, index: usize) -> Result<(Block, Vec<usize>)> {
    if record.as_compound().is_none() {
        return Err(malformed(index, "record is not a compound"));
    }
    let mut block = Block::new(
        string_field(record, "namespace", index)?,
        string_field(record, "blockname", index)?,
    );

    if let Some(properties) = record.get("properties") {
        let properties = properties
            .as_compound()
            .ok_or_else(|| malformed(index, "properties is not a compound"))?;
        for (key, value) in properties {
            let value = value
                .as_string()
                .ok_or_else(|| malformed(index, &format!("property \"{}\" is not a string", key)))?;
            block.properties.insert(key.clone(), value.clone());
        }
    }

    let refs: Vec<i32> = match record.get("extra_blocks") {
        None => Vec::new(),
        Some(Tag::IntArray(values)) => values.clone(),
        Some(Tag::List(values)) => values
            .iter()
            .map(|value| {
                value
                    .as_i32()
                    .ok_or_else(|| malformed(index, "extra_blocks holds a non-int"))
            })
            .collect::<Result<_>>()?,
        Some(_) => return Err(malformed(index, "extra_blocks is not a list")),
    };
    let refs: Vec<usize> = refs
        .into_iter()
        .map(|r| usize::try_from(r).map_err(|_| malformed(index, &format!("negative reference {}", r))))
        .collect::<Result<_>>()?;

    Ok((block, refs))
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Returns an entry that lies on a reference cycle, if any.
fn find_cycle(refs: &[Vec<usize>]) -> Option<usize> {
    let mut marks = vec![Mark::Unvisited; refs.len()];
    for start in 0..refs.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        marks[start] = Mark::Active;
        let mut stack = vec![(start, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            match refs[node].get(next) {
                Some(&child) => {
                    top.1 += 1;
                    match marks[child] {
                        Mark::Active => return Some(child),
                        Mark::Unvisited => {
                            marks[child] = Mark::Active;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }
    None
}

/// Decodes `block_palette`, composing extra blocks onto their owners, and returns the
/// first `primary_len` resolved entries (all of them when `None`).
pub fn decode(tag: &Tag, primary_len: Option<usize>) -> Result<Vec<Block>> {
    let records = tag
        .as_list()
        .ok_or_else(|| ConstructionError::MalformedPalette("block_palette is not a list".to_owned()))?;

    let mut flat = Vec::with_capacity(records.len());
    let mut refs = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let (block, block_refs) = tag_to_block(record, index)?;
        flat.push(block);
        refs.push(block_refs);
    }

    for (index, block_refs) in refs.iter().enumerate() {
        if let Some(&bad) = block_refs.iter().find(|&&r| r >= flat.len()) {
            return Err(malformed(
                index,
                &format!("extra block {} out of range (palette has {})", bad, flat.len()),
            ));
        }
    }
    if let Some(index) = find_cycle(&refs) {
        return Err(malformed(index, "extra blocks form a cycle"));
    }

    let primary_len = primary_len.unwrap_or(flat.len());
    if primary_len > flat.len() {
        return Err(ConstructionError::MalformedPalette(format!(
            "primary_block_count {} exceeds palette length {}",
            primary_len,
            flat.len()
        )));
    }

    // Composition reads only the flat, unresolved entries
    let composed: BTreeMap<usize, Block> = refs
        .iter()
        .enumerate()
        .filter(|(_, block_refs)| !block_refs.is_empty())
        .map(|(index, block_refs)| {
            let block = block_refs
                .iter()
                .fold(flat[index].clone(), |acc, &r| compose(&acc, &flat[r]));
            (index, block)
        })
        .collect();
    for (index, block) in composed {
        flat[index] = block;
    }

    flat.truncate(primary_len);
    Ok(flat)
}
