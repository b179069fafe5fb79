use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::collection::CollectionSchema;
use crate::engine::{
    BoxFuture, CollectionDescription, Metric, ScoredVectorPoint, VectorEngine, VectorPoint,
    VectorStoreError,
};
use crate::filter::VectorFilter;

struct StoredPoint {
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

struct InMemoryCollection {
    dimension: u64,
    indexed: bool,
    loaded: bool,
    points: HashMap<String, StoredPoint>,
}

/// Process-local engine with exhaustive L2 search.
///
/// Mirrors the rules of a real engine: a collection must be indexed before it can be
/// loaded, and loaded before it accepts inserts or searches.
pub struct InMemoryEngine {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
    create_calls: AtomicUsize,
}

impl InMemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate an unreachable engine: every call fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every call by `latency` before it touches state.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of `create_collection` calls received, including rejected ones.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    async fn ready(&self) -> Result<(), VectorStoreError> {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(VectorStoreError::Connection("engine offline".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEngine")
            .field("offline", &self.offline.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn not_found(collection: &str) -> String {
    format!("collection {collection} not found")
}

impl VectorEngine for InMemoryEngine {
    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn create_collection(
        &self,
        schema: &CollectionSchema,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let schema = schema.clone();
        Box::pin(async move {
            self.ready().await?;
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            if cols.contains_key(&schema.name) {
                return Err(VectorStoreError::Collection(format!(
                    "collection {} already exists",
                    schema.name
                )));
            }
            cols.insert(
                schema.name,
                InMemoryCollection {
                    dimension: schema.dimension,
                    indexed: false,
                    loaded: false,
                    points: HashMap::new(),
                },
            );
            Ok(())
        })
    }

    fn describe_collection(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, Result<CollectionDescription, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Collection(not_found(&collection)))?;
            Ok(CollectionDescription {
                dimension: col.dimension,
                metric: Metric::L2,
            })
        })
    }

    fn has_index(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Index(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Index(not_found(&collection)))?;
            Ok(col.indexed)
        })
    }

    fn create_index(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Index(e.to_string()))?;
            let col = cols
                .get_mut(&collection)
                .ok_or_else(|| VectorStoreError::Index(not_found(&collection)))?;
            col.indexed = true;
            Ok(())
        })
    }

    fn load_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Load(e.to_string()))?;
            let col = cols
                .get_mut(&collection)
                .ok_or_else(|| VectorStoreError::Load(not_found(&collection)))?;
            if !col.indexed {
                return Err(VectorStoreError::Load(format!(
                    "collection {collection} has no index"
                )));
            }
            col.loaded = true;
            Ok(())
        })
    }

    fn insert(
        &self,
        collection: &str,
        point: VectorPoint,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Insert(e.to_string()))?;
            let col = cols
                .get_mut(&collection)
                .ok_or_else(|| VectorStoreError::Insert(not_found(&collection)))?;
            if !col.loaded {
                return Err(VectorStoreError::Insert(format!(
                    "collection {collection} not loaded"
                )));
            }
            if point.vector.len() as u64 != col.dimension {
                return Err(VectorStoreError::Insert(format!(
                    "vector has {} components, collection expects {}",
                    point.vector.len(),
                    col.dimension
                )));
            }
            col.points.insert(
                point.id,
                StoredPoint {
                    vector: point.vector,
                    payload: point.payload,
                },
            );
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Search(not_found(&collection)))?;
            if !col.loaded {
                return Err(VectorStoreError::Search(format!(
                    "collection {collection} not loaded"
                )));
            }

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .map(|(id, sp)| ScoredVectorPoint {
                    id: id.clone(),
                    distance: l2_distance(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }

    fn retrieve(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<VectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Retrieve(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Retrieve(not_found(&collection)))?;
            Ok(ids
                .into_iter()
                .filter_map(|id| {
                    let sp = col.points.get(&id)?;
                    Some(VectorPoint {
                        id,
                        vector: sp.vector.clone(),
                        payload: sp.payload.clone(),
                    })
                })
                .collect())
        })
    }

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let mut cols = self
                .collections
                .write()
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            let col = cols
                .get_mut(&collection)
                .ok_or_else(|| VectorStoreError::Delete(not_found(&collection)))?;
            col.points.retain(|_, sp| !filter.matches(&sp.payload));
            Ok(())
        })
    }

    fn row_count(&self, collection: &str) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.ready().await?;
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Count(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::Count(not_found(&collection)))?;
            Ok(Some(col.points.len() as u64))
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move { Ok(()) })
    }
}
