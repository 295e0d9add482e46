use std::error::Error;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, ConstructionError>;

/// Where a magic token was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicLocation {
    Header,
    Footer,
}

/// Which version marker was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    /// The byte following the leading magic token.
    Format,
    /// `section_version` inside the metadata record.
    Section,
}

#[derive(Debug)]
pub enum ConstructionError {
    /// Header or footer token mismatch. `found` holds whatever bytes were there.
    InvalidMagic {
        location: MagicLocation,
        found: Vec<u8>,
    },
    UnsupportedVersion {
        component: VersionComponent,
        version: i32,
    },
    MissingMetadataField(&'static str),
    /// A metadata key is present but holds the wrong tag kind or arity.
    MalformedMetadata(String),
    MalformedPalette(String),
    MalformedSection(String),
    /// Byte source failure at `offset` while accessing `length` bytes.
    Io {
        source: io::Error,
        offset: u64,
        length: u64,
    },
    /// A section or metadata blob failed to decompress or parse.
    Nbt(io::Error),
    /// The reader session was closed or has failed.
    SessionClosed,
    /// A concurrent decode task panicked or was cancelled.
    TaskFailed(String),
}

impl ConstructionError {
    pub fn io_at(source: io::Error, offset: u64, length: u64) -> Self {
        ConstructionError::Io {
            source,
            offset,
            length,
        }
    }
}

impl fmt::Display for MagicLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MagicLocation::Header => write!(f, "header"),
            MagicLocation::Footer => write!(f, "footer"),
        }
    }
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionComponent::Format => write!(f, "format"),
            VersionComponent::Section => write!(f, "section"),
        }
    }
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::InvalidMagic { location, found } => write!(
                f,
                "Invalid magic number in {}: expected \"constrct\", got {:?}",
                location,
                String::from_utf8_lossy(found)
            ),
            ConstructionError::UnsupportedVersion { component, version } => {
                write!(f, "Unsupported {} version: {}", component, version)
            }
            ConstructionError::MissingMetadataField(key) => {
                write!(f, "Missing metadata key \"{}\"", key)
            }
            ConstructionError::MalformedMetadata(msg) => write!(f, "Malformed metadata: {}", msg),
            ConstructionError::MalformedPalette(msg) => write!(f, "Malformed palette: {}", msg),
            ConstructionError::MalformedSection(msg) => write!(f, "Malformed section: {}", msg),
            ConstructionError::Io {
                source,
                offset,
                length,
            } => write!(
                f,
                "IO error at offset {} (length {}): {}",
                offset, length, source
            ),
            ConstructionError::Nbt(err) => write!(f, "NBT error: {}", err),
            ConstructionError::SessionClosed => write!(f, "Construction reader is closed"),
            ConstructionError::TaskFailed(msg) => write!(f, "Decode task failed: {}", msg),
        }
    }
}

impl Error for ConstructionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConstructionError::Io { source, .. } => Some(source),
            ConstructionError::Nbt(err) => Some(err),
            _ => None,
        }
    }
}

/// IO errors without a known position are reported at offset 0, length 0.
impl From<io::Error> for ConstructionError {
    fn from(err: io::Error) -> Self {
        ConstructionError::io_at(err, 0, 0)
    }
}
