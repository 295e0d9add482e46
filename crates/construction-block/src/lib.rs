use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// Namespace assumed when a blockstate string has none.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// A block definition, optionally layered with extra blocks occupying the same cell
/// (a waterlogged stair is `stair` with `water` as its single extra block).
///
/// Extra blocks are flat: an entry of `extra_blocks` never has extras of its own.
/// [`compose`] keeps that shape; palettes that break it are refused when written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub namespace: String,
    pub base_name: String,
    pub properties: BTreeMap<String, String>,
    pub extra_blocks: Vec<Block>,
}

impl Block {
    pub fn new(namespace: impl Into<String>, base_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            base_name: base_name.into(),
            properties: BTreeMap::new(),
            extra_blocks: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    /// `namespace:base_name`
    pub fn namespaced_name(&self) -> String {
        format!("{}:{}", self.namespace, self.base_name)
    }

    /// This block without any extra blocks.
    pub fn base(&self) -> Block {
        Block {
            namespace: self.namespace.clone(),
            base_name: self.base_name.clone(),
            properties: self.properties.clone(),
            extra_blocks: Vec::new(),
        }
    }

    pub fn has_extra_blocks(&self) -> bool {
        !self.extra_blocks.is_empty()
    }

    fn fmt_blockstate(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.base_name)?;
        if !self.properties.is_empty() {
            let properties: Vec<String> = self
                .properties
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            write!(f, "[{}]", properties.join(","))?;
        }
        Ok(())
    }
}

/// Layers `overlay` on top of `base`.
///
/// The result is `base` followed by the base of `overlay` and then every extra block of
/// `overlay`, in order. `compose(compose(a, b), c) == compose(a, compose(b, c))`.
pub fn compose(base: &Block, overlay: &Block) -> Block {
    let mut result = base.clone();
    result.extra_blocks.reserve(1 + overlay.extra_blocks.len());
    result.extra_blocks.push(overlay.base());
    result
        .extra_blocks
        .extend(overlay.extra_blocks.iter().map(Block::base));
    result
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_blockstate(f)?;
        for extra in &self.extra_blocks {
            f.write_str(" + ")?;
            extra.fmt_blockstate(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseBlockError {
    EmptyName,
    UnterminatedProperties(String),
    InvalidProperty(String),
}

impl fmt::Display for ParseBlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseBlockError::EmptyName => write!(f, "Blockstate has no block name"),
            ParseBlockError::UnterminatedProperties(s) => {
                write!(f, "Unterminated property list in \"{}\"", s)
            }
            ParseBlockError::InvalidProperty(s) => write!(f, "Invalid property \"{}\"", s),
        }
    }
}

impl Error for ParseBlockError {}

fn parse_single(s: &str) -> Result<Block, ParseBlockError> {
    let s = s.trim();
    let (name, properties) = match s.find('[') {
        Some(open) => {
            let rest = &s[open + 1..];
            let inner = rest
                .strip_suffix(']')
                .ok_or_else(|| ParseBlockError::UnterminatedProperties(s.to_owned()))?;
            (&s[..open], Some(inner))
        }
        None => (s, None),
    };

    let (namespace, base_name) = match name.split_once(':') {
        Some((namespace, base_name)) => (namespace, base_name),
        None => (DEFAULT_NAMESPACE, name),
    };
    if base_name.is_empty() || namespace.is_empty() {
        return Err(ParseBlockError::EmptyName);
    }

    let mut block = Block::new(namespace, base_name);
    if let Some(inner) = properties.filter(|inner| !inner.trim().is_empty()) {
        for pair in inner.split(',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ParseBlockError::InvalidProperty(pair.to_owned()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ParseBlockError::InvalidProperty(pair.to_owned()));
            }
            block.properties.insert(key.to_owned(), value.trim().to_owned());
        }
    }
    Ok(block)
}

/// Parses `namespace:base_name[key=value,...]`, with further layers joined by ` + `.
impl FromStr for Block {
    type Err = ParseBlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut layers = s.split(" + ");
        let first = layers.next().ok_or(ParseBlockError::EmptyName)?;
        let mut block = parse_single(first)?;
        for layer in layers {
            block = compose(&block, &parse_single(layer)?);
        }
        Ok(block)
    }
}
