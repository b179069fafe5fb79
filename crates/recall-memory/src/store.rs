//! Collection owner: bootstrap, record CRUD and similarity search over one collection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::collection::{CollectionSchema, CollectionState};
use crate::engine::{BoxFuture, Metric, ScoredVectorPoint, VectorEngine, VectorPoint, VectorStoreError};
use crate::error::ErrorKind;
use crate::filter::VectorFilter;
use crate::types::{
    FIELD_CREATED_AT, FIELD_ID, FIELD_TEXT, FIELD_UPDATED_AT, MemoryRecord, SearchResult,
    distance_to_score,
};

pub const DEFAULT_TOP_K: u64 = 10;
pub const DEFAULT_MAX_ID_CHARS: usize = 64;
pub const DEFAULT_MAX_TEXT_CHARS: usize = 512;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vector engine unreachable: {0}")]
    Connection(String),

    #[error("collection schema mismatch: {0}")]
    Schema(String),

    #[error("embedding has {actual} components, collection expects {expected}")]
    DimensionMismatch { expected: u64, actual: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("collection not ready (state: {0})")]
    NotReady(CollectionState),

    #[error("statistics unavailable: {0}")]
    StatsUnavailable(String),

    #[error("record {0} not found")]
    NotFound(String),

    #[error("record {0} already exists")]
    DuplicateKey(String),

    #[error("vector engine call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Engine(#[from] VectorStoreError),
}

impl StoreError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::ConnectionError,
            Self::Schema(_) => ErrorKind::SchemaError,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::StatsUnavailable(_) => ErrorKind::StatsUnavailable,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Engine(_) => ErrorKind::Engine,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Immutable settings for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub collection: String,
    pub dimension: u64,
    pub max_id_chars: usize,
    pub max_text_chars: usize,
    pub default_top_k: u64,
    /// Deadline applied to every engine call.
    pub timeout: Duration,
}

impl StoreConfig {
    #[must_use]
    pub fn new(collection: impl Into<String>, dimension: u64) -> Self {
        Self {
            collection: collection.into(),
            dimension,
            max_id_chars: DEFAULT_MAX_ID_CHARS,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            default_top_k: DEFAULT_TOP_K,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn schema(&self) -> CollectionSchema {
        CollectionSchema {
            name: self.collection.clone(),
            dimension: self.dimension,
            max_id_chars: self.max_id_chars,
            max_text_chars: self.max_text_chars,
        }
    }

    /// Limit actually sent to the engine: non-positive requests fall back to the default.
    #[must_use]
    pub fn effective_top_k(&self, top_k: i64) -> u64 {
        u64::try_from(top_k)
            .ok()
            .filter(|k| *k > 0)
            .unwrap_or(self.default_top_k)
    }
}

/// Owns one collection's lifecycle and every read/write against it.
///
/// The engine handle is injected at construction and released once by [`close`](Self::close).
pub struct VectorStore {
    engine: Arc<dyn VectorEngine>,
    config: StoreConfig,
    state: RwLock<CollectionState>,
    init_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    #[must_use]
    pub fn new(engine: Arc<dyn VectorEngine>, config: StoreConfig) -> Self {
        Self {
            engine,
            config,
            state: RwLock::new(CollectionState::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> CollectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, next: CollectionState) -> CollectionState {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = state.advance(next);
        *state
    }

    async fn call<T>(&self, fut: BoxFuture<'_, std::result::Result<T, VectorStoreError>>) -> Result<T> {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(VectorStoreError::Connection(msg))) => Err(StoreError::Connection(msg)),
            Ok(Err(e)) => Err(StoreError::Engine(e)),
            Err(_) => Err(StoreError::Timeout(self.config.timeout)),
        }
    }

    /// Bring the collection to [`CollectionState::Loaded`].
    ///
    /// Creates the collection if absent, attaches the exact index if missing, then loads.
    /// Serialized within the process; repeated calls re-verify the index and re-issue the
    /// load. A concurrent creator elsewhere answering "already exists" is tolerated.
    ///
    /// # Errors
    ///
    /// [`StoreError::Connection`] when the engine is unreachable, [`StoreError::Schema`]
    /// when an existing collection's dimension or metric disagrees with the configuration,
    /// [`StoreError::NotReady`] after [`close`](Self::close).
    pub async fn initialize(&self) -> Result<CollectionState> {
        let _guard = self.init_lock.lock().await;
        self.ensure_open()?;
        let name = self.config.collection.as_str();

        if self.call(self.engine.collection_exists(name)).await? {
            self.verify_schema().await?;
        } else {
            match self.call(self.engine.create_collection(&self.config.schema())).await {
                Ok(()) => {
                    tracing::info!(
                        "created collection '{name}' (dimension {})",
                        self.config.dimension
                    );
                }
                Err(StoreError::Engine(VectorStoreError::Collection(msg)))
                    if msg.contains("already exists") =>
                {
                    tracing::warn!("collection '{name}' created concurrently: {msg}");
                    self.verify_schema().await?;
                }
                Err(e) => return Err(e),
            }
        }
        self.advance(CollectionState::Created);

        if self.call(self.engine.has_index(name)).await? {
            tracing::debug!("collection '{name}' already has an exact index");
        } else {
            self.call(self.engine.create_index(name)).await?;
            tracing::info!("attached exact index to collection '{name}'");
        }
        self.advance(CollectionState::IndexAttached);

        self.call(self.engine.load_collection(name)).await?;
        let state = self.advance(CollectionState::Loaded);
        tracing::info!("collection '{name}' loaded");
        Ok(state)
    }

    async fn verify_schema(&self) -> Result<()> {
        let name = self.config.collection.as_str();
        let desc = self.call(self.engine.describe_collection(name)).await?;
        if desc.dimension != self.config.dimension {
            return Err(StoreError::Schema(format!(
                "collection '{name}' has dimension {}, configured dimension is {}",
                desc.dimension, self.config.dimension
            )));
        }
        if desc.metric != Metric::L2 {
            return Err(StoreError::Schema(format!(
                "collection '{name}' uses {:?} distance, expected L2",
                desc.metric
            )));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::NotReady(CollectionState::Uninitialized));
        }
        Ok(())
    }

    pub(crate) fn ensure_loaded(&self) -> Result<()> {
        self.ensure_open()?;
        let state = self.state();
        if state.is_queryable() {
            Ok(())
        } else {
            Err(StoreError::NotReady(state))
        }
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len as u64 != self.config.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.dimension,
                actual: len,
            });
        }
        Ok(())
    }

    fn check_id(&self, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(StoreError::InvalidInput("id is empty".into()));
        }
        let chars = id.chars().count();
        if chars > self.config.max_id_chars {
            return Err(StoreError::InvalidInput(format!(
                "id has {chars} characters, limit is {}",
                self.config.max_id_chars
            )));
        }
        Ok(())
    }

    /// Validate id and text against the collection limits. Oversized values are rejected,
    /// never truncated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidInput`] naming the offending field.
    pub fn check_record_fields(&self, id: &str, text: &str) -> Result<()> {
        self.check_id(id)?;
        if text.trim().is_empty() {
            return Err(StoreError::InvalidInput("text is empty".into()));
        }
        let chars = text.chars().count();
        if chars > self.config.max_text_chars {
            return Err(StoreError::InvalidInput(format!(
                "text has {chars} characters, limit is {}",
                self.config.max_text_chars
            )));
        }
        Ok(())
    }

    /// Write one record. Duplicate ids are rejected.
    ///
    /// A timed-out insert is reported as failed even if the engine later applies it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotReady`] unless loaded, [`StoreError::DimensionMismatch`] or
    /// [`StoreError::InvalidInput`] before any engine call, [`StoreError::DuplicateKey`]
    /// when the id is taken.
    pub async fn insert(&self, record: &MemoryRecord) -> Result<()> {
        self.ensure_loaded()?;
        self.check_dimension(record.embedding.len())?;
        self.check_record_fields(&record.id, &record.text)?;

        let name = self.config.collection.as_str();
        let existing = self
            .call(self.engine.retrieve(name, vec![record.id.clone()]))
            .await?;
        if existing.iter().any(|p| p.id == record.id) {
            return Err(StoreError::DuplicateKey(record.id.clone()));
        }

        let point = VectorPoint {
            id: record.id.clone(),
            vector: record.embedding.clone(),
            payload: record_payload(record),
        };
        self.call(self.engine.insert(name, point)).await?;
        tracing::debug!("inserted record '{}' into '{name}'", record.id);
        Ok(())
    }

    /// Closest records first, at most `top_k` (non-positive means the default).
    ///
    /// Hits with a missing id or text, or a non-finite distance, are skipped.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotReady`] unless loaded, [`StoreError::DimensionMismatch`] for a
    /// query of the wrong length, or the engine failure.
    pub async fn search(&self, query: &[f32], top_k: i64) -> Result<Vec<SearchResult>> {
        self.ensure_loaded()?;
        self.check_dimension(query.len())?;
        let limit = self.config.effective_top_k(top_k);

        let hits = self
            .call(
                self.engine
                    .search(&self.config.collection, query.to_vec(), limit),
            )
            .await?;

        let mut results: Vec<SearchResult> = hits.into_iter().filter_map(hydrate_hit).collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(results)
    }

    /// Delete the record with this exact id. Deleting an absent id succeeds.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotReady`] unless loaded, [`StoreError::InvalidInput`] for a bad id,
    /// or the engine failure.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_loaded()?;
        self.check_id(id)?;
        let filter = VectorFilter::id_equals(id);
        tracing::debug!("deleting from '{}' where {filter}", self.config.collection);
        self.call(
            self.engine
                .delete_by_filter(&self.config.collection, filter),
        )
        .await
    }

    /// Fetch one record. The embedding is empty when the engine does not return vectors.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] when no record has this id.
    pub async fn get(&self, id: &str) -> Result<MemoryRecord> {
        self.ensure_loaded()?;
        self.check_id(id)?;
        let points = self
            .call(
                self.engine
                    .retrieve(&self.config.collection, vec![id.to_owned()]),
            )
            .await?;
        points
            .into_iter()
            .find(|p| p.id == id)
            .and_then(point_to_record)
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))
    }

    /// Current record count as reported by the engine.
    ///
    /// # Errors
    ///
    /// [`StoreError::StatsUnavailable`] when the engine fails or reports no count;
    /// [`StoreError::Timeout`] on deadline.
    pub async fn statistics(&self) -> Result<u64> {
        self.ensure_loaded()?;
        match self.call(self.engine.row_count(&self.config.collection)).await {
            Ok(Some(count)) => Ok(count),
            Ok(None) => Err(StoreError::StatsUnavailable(
                "engine reported no row count".into(),
            )),
            Err(e @ StoreError::Timeout(_)) => Err(e),
            Err(e) => Err(StoreError::StatsUnavailable(e.to_string())),
        }
    }

    /// Release the engine handle. Only the first call reaches the engine; it returns
    /// `true`, later calls return `false`.
    ///
    /// # Errors
    ///
    /// Returns the engine failure from the first call.
    pub async fn close(&self) -> Result<bool> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            CollectionState::Uninitialized;
        self.call(self.engine.close()).await?;
        tracing::info!("vector store for '{}' closed", self.config.collection);
        Ok(true)
    }
}

fn record_payload(record: &MemoryRecord) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        (FIELD_ID.to_owned(), serde_json::json!(record.id)),
        (FIELD_TEXT.to_owned(), serde_json::json!(record.text)),
        (FIELD_CREATED_AT.to_owned(), serde_json::json!(record.created_at)),
        (FIELD_UPDATED_AT.to_owned(), serde_json::json!(record.updated_at)),
    ])
}

fn hydrate_hit(hit: ScoredVectorPoint) -> Option<SearchResult> {
    let text = hit.payload.get(FIELD_TEXT).and_then(serde_json::Value::as_str);
    let (Some(text), false) = (text, hit.id.is_empty()) else {
        tracing::warn!("skipping search hit '{}' with missing id or text", hit.id);
        return None;
    };
    if !hit.distance.is_finite() {
        tracing::warn!("skipping search hit '{}' with distance {}", hit.id, hit.distance);
        return None;
    }
    Some(SearchResult {
        text: text.to_owned(),
        score: distance_to_score(hit.distance),
        distance: hit.distance,
        id: hit.id,
    })
}

fn point_to_record(point: VectorPoint) -> Option<MemoryRecord> {
    let text = point.payload.get(FIELD_TEXT)?.as_str()?.to_owned();
    let timestamp = |field: &str| {
        point
            .payload
            .get(field)
            .and_then(serde_json::Value::as_i64)
            .unwrap_or_default()
    };
    Some(MemoryRecord {
        created_at: timestamp(FIELD_CREATED_AT),
        updated_at: timestamp(FIELD_UPDATED_AT),
        id: point.id,
        text,
        embedding: point.vector,
    })
}
