//! Plain-text document loading from a folder or an explicit file list.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::Document;

#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    extensions: Vec<String>,
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only ingest files whose extension is listed (case-insensitive, no dot).
    pub fn with_extensions(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Load every matching file under `root` (or `root` itself if it is a file).
    pub fn load_dir(&self, root: &Path) -> Result<Vec<Document>> {
        if !root.exists() {
            return Err(Error::NotFound(format!("document folder {}", root.display())));
        }
        let files = if root.is_dir() { self.list_files(root) } else { vec![root.to_path_buf()] };
        if files.is_empty() {
            info!(root = %root.display(), "no documents found");
        }
        Ok(self.load_files(&files))
    }

    /// Load the given files. A file that cannot be read is logged and skipped.
    pub fn load_files(&self, files: &[PathBuf]) -> Vec<Document> {
        let mut documents = Vec::with_capacity(files.len());
        for (i, path) in files.iter().enumerate() {
            match self.read_file_content(path) {
                Ok(content) => {
                    info!(file = %path.display(), n = i + 1, total = files.len(), "loaded document");
                    documents.push(Document::new(content, path.to_string_lossy()));
                }
                Err(e) => warn!(error = %e, "skipping document"),
            }
        }
        documents
    }

    fn read_file_content(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)
            .map_err(|e| Error::DocumentLoad { path: path.to_path_buf(), reason: e.to_string() })?;
        match String::from_utf8(bytes) {
            Ok(content) => Ok(content),
            Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }

    fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.accepts(p))
            .collect();
        files.sort();
        files
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}
