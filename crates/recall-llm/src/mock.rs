//! Test-only mock embedding provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, validate_inputs};

/// Deterministic in-process embedder.
///
/// Unless a fixed vector was registered with [`MockEmbedder::with_vector`], each text
/// maps to a bag-of-bytes vector, so equal texts always produce equal vectors.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    fixed: Arc<Mutex<HashMap<String, Vec<f32>>>>,
    calls: Arc<AtomicUsize>,
    pub fail_with_status: Option<u16>,
    /// Milliseconds to sleep before answering.
    pub delay_ms: u64,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fixed: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            fail_with_status: None,
            delay_ms: 0,
        }
    }

    #[must_use]
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.fixed.lock().unwrap().insert(text.to_owned(), vector);
        self
    }

    #[must_use]
    pub fn failing(mut self, status: u16) -> Self {
        self.fail_with_status = Some(status);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Number of upstream calls that passed input validation.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.fixed.lock().unwrap().get(text) {
            return v.clone();
        }
        let mut v = vec![0.0_f32; self.dimension];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dimension] += f32::from(b) / 255.0;
        }
        v
    }
}

impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        validate_inputs(texts)?;
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if let Some(status) = self.fail_with_status {
            return Err(EmbedError::Provider {
                status,
                message: "mock embedding error".into(),
            });
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_same_vector() {
        let m = MockEmbedder::new(4);
        let a = m.embed(&["hello".to_owned()]).await.unwrap();
        let b = m.embed(&["hello".to_owned()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 4);
        assert_eq!(m.calls(), 2);
    }

    #[tokio::test]
    async fn fixed_vector_overrides() {
        let m = MockEmbedder::new(4).with_vector("a", vec![0.0, 0.0, 0.0, 1.0]);
        let v = m.embed(&["a".to_owned()]).await.unwrap();
        assert_eq!(v[0], vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn empty_text_is_not_counted() {
        let m = MockEmbedder::new(4);
        assert!(m.embed(&[String::new()]).await.is_err());
        assert_eq!(m.calls(), 0);
    }

    #[tokio::test]
    async fn failing_returns_provider_error() {
        let m = MockEmbedder::new(4).failing(503);
        let err = m.embed(&["x".to_owned()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::Provider { status: 503, .. }));
    }
}
