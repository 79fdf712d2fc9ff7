//! The persisted knowledge base: index file plus metadata file, always written
//! and read as a pair.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use localrag_core::config::IndexSettings;
use localrag_core::{Error, Result};

use crate::flat::FlatIndex;
use crate::metadata::{write_bytes, MetadataStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub index: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    pub fn new(index: impl Into<PathBuf>, metadata: impl Into<PathBuf>) -> Self {
        Self { index: index.into(), metadata: metadata.into() }
    }

    pub fn from_settings(settings: &IndexSettings) -> Self {
        Self::new(&settings.index_path, &settings.metadata_path)
    }

    /// An index counts as present when its index file exists.
    pub fn exists(&self) -> bool {
        self.index.is_file()
    }

    /// Delete both artifacts. Absent files are not an error.
    pub fn remove(&self) -> Result<()> {
        for path in [&self.index, &self.metadata] {
            match fs::remove_file(path) {
                Ok(()) => info!(path = %path.display(), "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Ordinal coverage of the metadata store relative to the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consistency {
    /// Index ordinals with no metadata entry.
    pub missing: Vec<usize>,
    /// Metadata entries past the end of the index.
    pub extra: Vec<usize>,
    /// The metadata file differs from the one the index was built with.
    pub digest_mismatch: bool,
}

impl Consistency {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && !self.digest_mismatch
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("{} ordinals without metadata", self.missing.len()));
        }
        if !self.extra.is_empty() {
            parts.push(format!("{} metadata entries beyond the index", self.extra.len()));
        }
        if self.digest_mismatch {
            parts.push("metadata file changed since the index was built".to_string());
        }
        parts.join("; ")
    }
}

/// A vector index together with the chunk records its ordinals point to.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    index: FlatIndex,
    metadata: MetadataStore,
}

impl KnowledgeBase {
    pub fn new(index: FlatIndex, metadata: MetadataStore) -> Self {
        Self { index, metadata }
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn ntotal(&self) -> usize {
        self.index.ntotal()
    }

    pub fn consistency(&self) -> Consistency {
        let n = self.index.ntotal();
        Consistency {
            missing: self.metadata.missing_ordinals(n),
            extra: self.metadata.extra_ordinals(n),
            digest_mismatch: false,
        }
    }

    /// Write the metadata file, then the index file stamped with the
    /// metadata's digest.
    pub fn persist(&self, paths: &IndexPaths) -> Result<()> {
        let bytes = self.metadata.to_json_bytes()?;
        let digest = blake3::hash(&bytes).to_hex();
        write_bytes(&paths.metadata, &bytes)?;
        self.index.write_file(&paths.index, Some(digest.as_str()))?;
        info!(
            index = %paths.index.display(),
            metadata = %paths.metadata.display(),
            vectors = self.ntotal(),
            "knowledge base saved"
        );
        Ok(())
    }

    /// Load both artifacts. Coverage gaps and digest mismatches are logged, or
    /// rejected with [`Error::MetadataInconsistent`] when `strict` is set.
    pub fn open(paths: &IndexPaths, strict: bool) -> Result<Self> {
        if !paths.exists() {
            return Err(Error::IndexMissing { path: paths.index.clone() });
        }
        let (index, file_info) = FlatIndex::read_file(&paths.index)?;
        let bytes = read_metadata(&paths.metadata)?;
        let metadata = MetadataStore::from_json_slice(&bytes)?;

        let kb = Self { index, metadata };
        let mut report = kb.consistency();
        report.digest_mismatch = file_info
            .metadata_digest
            .as_deref()
            .is_some_and(|expected| expected != blake3::hash(&bytes).to_hex().as_str());

        if !report.is_consistent() {
            let reason = report.describe();
            if strict {
                return Err(Error::MetadataInconsistent(reason));
            }
            warn!(reason = %reason, "index and metadata disagree; affected results will be dropped");
        }
        info!(
            vectors = kb.ntotal(),
            entries = kb.metadata.len(),
            built_at = %format_millis(file_info.built_at_millis),
            "knowledge base loaded"
        );
        Ok(kb)
    }
}

fn read_metadata(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("metadata file {}", path.display())));
    }
    Ok(fs::read(path)?)
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}
