//! Vector memory pipeline: collection lifecycle, record storage, similarity search.

pub mod collection;
pub mod engine;
pub mod error;
pub mod filter;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod semantic;
pub mod store;
pub mod types;

pub use collection::{CollectionSchema, CollectionState};
pub use engine::{VectorEngine, VectorStoreError};
pub use error::{ErrorKind, MemoryError, Stage};
pub use filter::{FieldCondition, FieldValue, VectorFilter};
pub use in_memory_store::InMemoryEngine;
pub use qdrant_ops::QdrantOps;
pub use semantic::MemoryService;
pub use store::{StoreConfig, StoreError, VectorStore};
pub use types::{MemoryRecord, SearchResult, distance_to_score};
