#![allow(dead_code)]

use construction::{compose, Block, Construction, Section, Shape, Tag};
use std::cell::Cell;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::rc::Rc;

pub fn basic_palette() -> Vec<Block> {
    vec![
        Block::new("minecraft", "air"),
        Block::new("minecraft", "stone"),
        compose(
            &Block::new("minecraft", "stone"),
            &Block::new("minecraft", "damaged_anvil").with_property("facing", "south"),
        ),
    ]
}

/// Grid where each octant of the section holds a different value in `0..8`.
pub fn octant_blocks(shape: Shape) -> Vec<u32> {
    let (sx, sy, sz) = (shape.0 as usize, shape.1 as usize, shape.2 as usize);
    let mut blocks = Vec::with_capacity(sx * sy * sz);
    for x in 0..sx {
        for y in 0..sy {
            for z in 0..sz {
                let octant = (x * 2 / sx) * 4 + (y * 2 / sy) * 2 + (z * 2 / sz);
                blocks.push(octant as u32);
            }
        }
    }
    blocks
}

pub fn octant_palette() -> Vec<Block> {
    (0..8)
        .map(|i| Block::new("minecraft", format!("wool_{}", i)))
        .collect()
}

pub fn chest_at(x: i32, y: i32, z: i32) -> Tag {
    let mut chest = HashMap::new();
    chest.insert("id".to_owned(), Tag::String("minecraft:chest".to_owned()));
    chest.insert("x".to_owned(), Tag::Int(x));
    chest.insert("y".to_owned(), Tag::Int(y));
    chest.insert("z".to_owned(), Tag::Int(z));
    Tag::Compound(chest)
}

/// A 3x3x3 arrangement of 16^3 sections around `center`, with the middle section left out.
pub fn hollow_cube(center: (i32, i32, i32)) -> Construction {
    let mut sections = Vec::new();
    for dx in -1..=1 {
        for dy in -1..=1 {
            for dz in -1..=1 {
                if (dx, dy, dz) == (0, 0, 0) {
                    continue;
                }
                let origin = (center.0 + dx * 16, center.1 + dy * 16, center.2 + dz * 16);
                let fill = ((dx + 1) * 9 + (dy + 1) * 3 + (dz + 1)) as u32 % 3;
                sections.push(Section::filled(origin, (16, 16, 16), fill).unwrap());
            }
        }
    }
    Construction::from_sections(sections, basic_palette(), "java", (1, 13, 2))
}

pub fn round_trip(construction: &Construction) -> Construction {
    Construction::from_bytes(construction.to_bytes().unwrap()).unwrap()
}

/// A unique path under the system temp directory, removed on drop.
pub struct TempPath(pub PathBuf);

impl TempPath {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "construction-test-{}-{}.construction",
            std::process::id(),
            name
        ));
        TempPath(path)
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// In-memory byte source that raises a flag when it is dropped.
pub struct TrackedSource {
    inner: Cursor<Vec<u8>>,
    dropped: Rc<Cell<bool>>,
}

impl TrackedSource {
    pub fn new(bytes: Vec<u8>) -> (Self, Rc<Cell<bool>>) {
        let dropped = Rc::new(Cell::new(false));
        let source = TrackedSource {
            inner: Cursor::new(bytes),
            dropped: Rc::clone(&dropped),
        };
        (source, dropped)
    }
}

impl Read for TrackedSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for TrackedSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.dropped.set(true);
    }
}
