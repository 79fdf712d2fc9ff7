//! localrag-index
//!
//! Exact nearest-neighbor index over L2-normalized vectors, the ordinal-keyed
//! metadata store persisted next to it, the batch builder that produces the
//! pair, and the retriever that queries it.

pub mod builder;
pub mod flat;
pub mod metadata;
pub mod retriever;
pub mod store;

pub use builder::{BuildOutcome, IndexBuilder};
pub use flat::{normalize, FlatIndex, Neighbors};
pub use metadata::MetadataStore;
pub use retriever::{Retrieval, Retriever};
pub use store::{Consistency, IndexPaths, KnowledgeBase};
