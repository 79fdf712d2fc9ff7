//! Exact (brute-force) nearest-neighbor index with squared-L2 distance.
//!
//! Vectors are stored row-major in one contiguous buffer. Ordinals are
//! assigned in insertion order starting at 0 and never reused.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use localrag_core::{Error, Result};

const MAGIC: [u8; 4] = *b"LRIX";
const FORMAT_VERSION: u32 = 1;

/// Scale `v` to unit L2 norm in place. A zero vector is left unchanged.
pub fn normalize(v: &mut [f32]) {
	let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
	if norm > 0.0 && norm.is_finite() { for x in v.iter_mut() { *x /= norm; } }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| { let d = x - y; d * d }).sum()
}

/// Up to `k` neighbors, nearest first. `distances[i]` belongs to `ordinals[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Neighbors {
	pub distances: Vec<f32>,
	pub ordinals: Vec<usize>,
}

impl Neighbors {
	pub fn len(&self) -> usize { self.ordinals.len() }
	pub fn is_empty(&self) -> bool { self.ordinals.is_empty() }
	pub fn iter(&self) -> impl Iterator<Item = (f32, usize)> + '_ {
		self.distances.iter().copied().zip(self.ordinals.iter().copied())
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
	dim: Option<usize>,
	data: Vec<f32>,
}

/// Header and payload of the persisted index file.
#[derive(Serialize)]
struct IndexFileRef<'a> {
	magic: [u8; 4],
	version: u32,
	dim: u64,
	ntotal: u64,
	vectors: &'a [f32],
	metadata_digest: Option<&'a str>,
	built_at: i64,
}

#[derive(Deserialize)]
struct IndexFile {
	magic: [u8; 4],
	version: u32,
	dim: u64,
	ntotal: u64,
	vectors: Vec<f32>,
	metadata_digest: Option<String>,
	built_at: i64,
}

/// What the index file says about the build that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFileInfo {
	pub metadata_digest: Option<String>,
	pub built_at_millis: i64,
}

impl FlatIndex {
	pub fn new() -> Self { Self::default() }

	/// An empty index that only accepts `dim`-dimensional vectors.
	pub fn with_dim(dim: usize) -> Self { Self { dim: Some(dim), data: Vec::new() } }

	/// Fixed by the first non-empty `add` unless set up front.
	pub fn dim(&self) -> Option<usize> { self.dim }

	pub fn ntotal(&self) -> usize {
		match self.dim { Some(d) if d > 0 => self.data.len() / d, _ => 0 }
	}

	pub fn is_empty(&self) -> bool { self.ntotal() == 0 }

	pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
		let d = self.dim?;
		if ordinal >= self.ntotal() { return None; }
		Some(&self.data[ordinal * d..(ordinal + 1) * d])
	}

	/// Append `vectors`, assigning ordinals `ntotal..ntotal + vectors.len()`.
	/// The whole batch is rejected if any vector has the wrong dimension.
	pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
		let Some(first) = vectors.first() else { return Ok(()) };
		let dim = self.dim.unwrap_or(first.len());
		if dim == 0 { return Err(Error::InvalidConfig("cannot index zero-dimensional vectors".into())); }
		if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
			return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
		}
		self.dim = Some(dim);
		self.data.reserve(vectors.len() * dim);
		for v in vectors { self.data.extend_from_slice(v); }
		debug!(added = vectors.len(), ntotal = self.ntotal(), "vectors added");
		Ok(())
	}

	/// The `min(k, ntotal)` nearest stored vectors to `query` by squared L2,
	/// ascending. Equal distances keep the lower ordinal first.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Neighbors> {
		let n = self.ntotal();
		let Some(dim) = self.dim.filter(|_| n > 0 && k > 0) else { return Ok(Neighbors::default()) };
		if query.len() != dim { return Err(Error::DimensionMismatch { expected: dim, actual: query.len() }); }

		let mut scored: Vec<(f32, usize)> = self.data.chunks_exact(dim).enumerate()
			.map(|(i, row)| (squared_l2(query, row), i))
			.collect();
		let cmp = |a: &(f32, usize), b: &(f32, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
		if k < n {
			scored.select_nth_unstable_by(k - 1, cmp);
			scored.truncate(k);
		}
		scored.sort_unstable_by(cmp);
		let (distances, ordinals) = scored.into_iter().unzip();
		Ok(Neighbors { distances, ordinals })
	}

	/// Write the index to `path`. The file is self-describing; see [`FlatIndex::restore`].
	pub fn persist(&self, path: &Path) -> Result<()> { self.write_file(path, None) }

	pub fn restore(path: &Path) -> Result<Self> { Ok(Self::read_file(path)?.0) }

	pub(crate) fn write_file(&self, path: &Path, metadata_digest: Option<&str>) -> Result<()> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) { fs::create_dir_all(parent)?; }
		let file = IndexFileRef {
			magic: MAGIC,
			version: FORMAT_VERSION,
			dim: self.dim.unwrap_or(0) as u64,
			ntotal: self.ntotal() as u64,
			vectors: &self.data,
			metadata_digest,
			built_at: chrono::Utc::now().timestamp_millis(),
		};
		let tmp = path.with_extension("tmp");
		{
			let mut writer = BufWriter::new(fs::File::create(&tmp)?);
			bincode::serde::encode_into_std_write(&file, &mut writer, bincode::config::standard())
				.map_err(|e| Error::Operation(format!("encoding index {}: {e}", path.display())))?;
			writer.flush()?;
		}
		fs::rename(&tmp, path)?;
		debug!(path = %path.display(), ntotal = self.ntotal(), "index written");
		Ok(())
	}

	pub(crate) fn read_file(path: &Path) -> Result<(Self, IndexFileInfo)> {
		let corrupt = |reason: String| Error::CorruptIndex { path: path.to_path_buf(), reason };
		let mut reader = BufReader::new(fs::File::open(path)?);
		let file: IndexFile = bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
			.map_err(|e| corrupt(e.to_string()))?;
		if file.magic != MAGIC { return Err(corrupt("not an index file".into())); }
		if file.version != FORMAT_VERSION { return Err(corrupt(format!("unsupported format version {}", file.version))); }
		let (dim, ntotal) = (file.dim as usize, file.ntotal as usize);
		if dim.checked_mul(ntotal) != Some(file.vectors.len()) {
			return Err(corrupt(format!("{} values do not make {ntotal} vectors of dimension {dim}", file.vectors.len())));
		}
		let index = Self { dim: (dim > 0).then_some(dim), data: file.vectors };
		let info = IndexFileInfo { metadata_digest: file.metadata_digest, built_at_millis: file.built_at };
		Ok((index, info))
	}
}
