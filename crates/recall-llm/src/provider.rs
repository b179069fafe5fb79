use std::future::Future;

use crate::error::{EmbedError, Result};

/// Converts text into fixed-dimension vectors.
///
/// Implementations batch every input of a call into a single upstream request and
/// return exactly one vector per input, in input order. Failures are never retried
/// here; retry policy belongs to the caller.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::InvalidInput`] before any network call when the batch is
    /// empty or any text is blank, and a transport/provider/parse error otherwise.
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;

    fn name(&self) -> &str;
}

/// Reject empty batches and blank texts.
///
/// # Errors
///
/// Returns [`EmbedError::InvalidInput`] naming the first offending position.
pub fn validate_inputs(texts: &[String]) -> Result<()> {
    if texts.is_empty() {
        return Err(EmbedError::InvalidInput("no texts to embed".into()));
    }
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(EmbedError::InvalidInput(format!(
            "text at position {pos} is empty"
        )));
    }
    Ok(())
}
