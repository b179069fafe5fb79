use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::collection::CollectionSchema;
use crate::filter::VectorFilter;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("index error: {0}")]
    Index(String),
    #[error("load error: {0}")]
    Load(String),
    #[error("insert error: {0}")]
    Insert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("retrieve error: {0}")]
    Retrieve(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("count error: {0}")]
    Count(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A point as written to or read from an engine. `id` is the record's primary key.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

/// A search hit. `distance` is the engine's raw L2 distance, lower is closer.
#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub distance: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    L2,
    Cosine,
    Dot,
    Other,
}

/// What an engine reports about an existing collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescription {
    pub dimension: u64,
    pub metric: Metric,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport to a backing vector database.
///
/// Every call is a single round-trip with no retries. Implementations must be safe to
/// share across tasks; one handle serves the whole process.
pub trait VectorEngine: Send + Sync {
    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn create_collection(
        &self,
        schema: &CollectionSchema,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn describe_collection(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, Result<CollectionDescription, VectorStoreError>>;

    /// Whether the exact (flat, L2) index is attached to the embedding field.
    fn has_index(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn create_index(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Make the collection queryable. Re-loading a loaded collection succeeds.
    fn load_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn insert(
        &self,
        collection: &str,
        point: VectorPoint,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Exhaustive L2 search returning up to `limit` hits, closest first.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    /// Fetch points by record id. Missing ids are omitted; vectors may come back empty.
    fn retrieve(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<VectorPoint>, VectorStoreError>>;

    /// Delete every point matching `filter`. Matching nothing is not an error.
    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Current number of points, or `None` when the engine does not report one.
    fn row_count(&self, collection: &str) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>>;

    /// Release the connection.
    fn close(&self) -> BoxFuture<'_, Result<(), VectorStoreError>>;
}
