//! Reading and writing construction files: portable containers for block structures
//! made of independently addressable sections sharing one block palette.
//!
//! ```no_run
//! use construction::{Block, Construction, Section};
//!
//! let palette = vec![Block::new("minecraft", "air"), Block::new("minecraft", "stone")];
//! let mut construction = Construction::new(palette, "java", (1, 13, 2));
//! construction.insert_section(Section::filled((0, 0, 0), (16, 16, 16), 1)?);
//! construction.save("house.construction")?;
//!
//! let loaded = Construction::load("house.construction")?;
//! assert_eq!(loaded, construction);
//! # Ok::<(), construction::ConstructionError>(())
//! ```

pub mod array;
pub mod concurrent;
pub mod construction;
pub mod error;
pub mod format;
pub mod index;
pub mod metadata;
pub mod palette;
pub mod reader;
pub mod section;
pub mod selection;
pub mod writer;

pub use crate::construction::Construction;
pub use crate::error::{ConstructionError, Result};
pub use crate::metadata::ExportVersion;
pub use crate::reader::{ConstructionReader, ReaderState, SectionIter};
pub use crate::section::{Coordinate, Section, Shape};
pub use crate::selection::SelectionBox;
pub use crate::writer::WriteOptions;
pub use construction_block::{compose, Block};
pub use construction_nbt::Tag;
