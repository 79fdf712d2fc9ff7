//! Ordinal-keyed chunk records stored as a JSON object next to the index.
//!
//! Keys are the decimal ordinals as strings (`"0"`, `"1"`, ...), values hold
//! the chunk text and its metadata. Non-ASCII text is written as-is.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use localrag_core::types::{Chunk, IndexEntry};
use localrag_core::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataStore {
    entries: BTreeMap<usize, IndexEntry>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry `i` is chunk `i`, matching the ordinal its vector gets when the
    /// chunks are added to an empty index in the same order.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        Self { entries: chunks.into_iter().map(IndexEntry::from).enumerate().collect() }
    }

    pub fn insert(&mut self, ordinal: usize, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.insert(ordinal, entry)
    }

    pub fn get(&self, ordinal: usize) -> Option<&IndexEntry> {
        self.entries.get(&ordinal)
    }

    pub fn remove(&mut self, ordinal: usize) -> Option<IndexEntry> {
        self.entries.remove(&ordinal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ordinals(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &IndexEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Ordinals in `0..ntotal` without an entry.
    pub fn missing_ordinals(&self, ntotal: usize) -> Vec<usize> {
        (0..ntotal).filter(|i| !self.entries.contains_key(i)).collect()
    }

    /// Entries whose ordinal is `>= ntotal`.
    pub fn extra_ordinals(&self, ntotal: usize) -> Vec<usize> {
        self.entries.range(ntotal..).map(|(k, _)| *k).collect()
    }

    /// Pretty JSON with four-space indentation.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        write_bytes(path, &self.to_json_bytes()?)
    }

    pub fn restore(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("metadata file {}", path.display())));
        }
        Self::from_json_slice(&fs::read(path)?)
    }
}

pub(crate) fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
