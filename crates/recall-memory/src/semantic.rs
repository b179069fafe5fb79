use std::sync::Arc;

use recall_llm::provider::validate_inputs;
use recall_llm::{EmbedError, EmbeddingProvider};

use crate::error::MemoryError;
use crate::store::VectorStore;
use crate::types::{MemoryRecord, SearchResult};

/// Text-level memory: embeds with `P` and persists through a [`VectorStore`].
///
/// Every failure is returned as a [`MemoryError`] tagged with the stage that produced it.
pub struct MemoryService<P: EmbeddingProvider> {
    provider: P,
    store: Arc<VectorStore>,
}

impl<P: EmbeddingProvider> std::fmt::Debug for MemoryService<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field("provider", &self.provider.name())
            .field("store", &self.store)
            .finish()
    }
}

impl<P: EmbeddingProvider> MemoryService<P> {
    #[must_use]
    pub fn new(provider: P, store: Arc<VectorStore>) -> Self {
        Self { provider, store }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an embedding-stage error, including
    /// [`EmbedError::MalformedResponse`] if the provider does not answer with exactly one
    /// vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut vectors = self.provider.embed(&[text.to_owned()]).await?;
        if vectors.len() != 1 {
            return Err(EmbedError::MalformedResponse(format!(
                "expected 1 embedding, got {}",
                vectors.len()
            ))
            .into());
        }
        Ok(vectors.swap_remove(0))
    }

    /// Embed `text` and store it under `id`, or a fresh UUID when `id` is absent or blank.
    ///
    /// Collection readiness, blank text and field limits are checked before the embedding
    /// call. Blank text is an embedding-stage error, as it is for [`search_text`](Self::search_text).
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Embedding`] or [`MemoryError::Storage`] with the underlying
    /// cause.
    pub async fn insert_text(&self, text: &str, id: Option<&str>) -> Result<MemoryRecord, MemoryError> {
        let id = id
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_owned);

        self.store.ensure_loaded()?;
        validate_inputs(&[text.to_owned()])?;
        self.store.check_record_fields(&id, text)?;

        let vector = self.embed(text).await?;
        let record = MemoryRecord::new(id, text, vector);
        self.store.insert(&record).await?;

        tracing::debug!("stored memory '{}' ({} chars)", record.id, text.chars().count());
        Ok(record)
    }

    /// Embed `query` and return the closest stored texts.
    ///
    /// `user_id` is recorded in the logs only; results are not filtered by it.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Embedding`] or [`MemoryError::Storage`] with the underlying
    /// cause.
    pub async fn search_text(
        &self,
        query: &str,
        top_k: i64,
        user_id: Option<&str>,
    ) -> Result<Vec<SearchResult>, MemoryError> {
        self.store.ensure_loaded()?;
        let vector = self.embed(query).await?;
        let results = self.store.search(&vector, top_k).await?;
        tracing::debug!(
            "search for user {} returned {} results",
            user_id.unwrap_or("-"),
            results.len()
        );
        Ok(results)
    }

    /// # Errors
    ///
    /// Returns a storage-stage error.
    pub async fn delete(&self, id: &str) -> Result<(), MemoryError> {
        self.store.delete(id).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns a storage-stage error, [`StoreError::NotFound`](crate::StoreError::NotFound)
    /// when absent.
    pub async fn get(&self, id: &str) -> Result<MemoryRecord, MemoryError> {
        Ok(self.store.get(id).await?)
    }

    /// # Errors
    ///
    /// Returns a storage-stage error.
    pub async fn statistics(&self) -> Result<u64, MemoryError> {
        Ok(self.store.statistics().await?)
    }
}
