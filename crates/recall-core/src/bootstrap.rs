//! Service wiring: config -> embedder, engine -> store -> [`MemoryService`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use recall_llm::EmbeddingProvider;
use recall_llm::openai::OpenAiEmbedder;
use recall_memory::{InMemoryEngine, MemoryService, QdrantOps, StoreConfig, VectorEngine, VectorStore};

use crate::config::{Config, EngineKind, ProviderKind};
use crate::vault::VaultProvider;

/// Load, resolve and validate configuration in one step.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed, the vault fails, or validation fails.
pub async fn load_config(path: &Path, vault: &dyn VaultProvider) -> anyhow::Result<Config> {
    let mut config = Config::load(path)?;
    config.resolve_secrets(vault).await?;
    config.validate()?;
    Ok(config)
}

/// `explicit` if given, otherwise `config/default.toml`.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| PathBuf::from("config/default.toml"), Path::to_path_buf)
}

/// Build the HTTP embedder described by `[embedding]`.
///
/// # Errors
///
/// Returns an error when the `openai` provider has no API key.
pub fn create_embedder(config: &Config) -> anyhow::Result<OpenAiEmbedder> {
    let api_key = config
        .secrets
        .embedding_api_key
        .as_ref()
        .map(|s| s.expose().to_owned());

    let api_key = match (config.embedding.provider, api_key) {
        (_, Some(key)) => key,
        (ProviderKind::Compatible, None) => String::new(),
        (ProviderKind::OpenAi, None) => {
            bail!("embedding provider 'openai' requires RECALL_OPENAI_API_KEY or OPENAI_API_KEY")
        }
    };

    Ok(OpenAiEmbedder::new(
        api_key,
        config.embedding.base_url.clone(),
        config.embedding.model.clone(),
    )
    .with_timeout(config.embedding_timeout()))
}

/// Open the vector engine described by `[vector]`. No request is sent.
///
/// # Errors
///
/// Returns an error if the engine URL is invalid.
pub fn create_engine(config: &Config) -> anyhow::Result<Arc<dyn VectorEngine>> {
    match config.vector.engine {
        EngineKind::Qdrant => {
            let url = config.vector.url();
            let ops = QdrantOps::new(&url)
                .map_err(|e| anyhow::anyhow!("{e}"))
                .with_context(|| format!("invalid vector engine url {url}"))?;
            Ok(Arc::new(ops))
        }
        EngineKind::Memory => {
            tracing::warn!("using in-memory vector engine, records are not persisted");
            Ok(Arc::new(InMemoryEngine::new()))
        }
    }
}

#[must_use]
pub fn store_config(config: &Config) -> StoreConfig {
    StoreConfig {
        collection: config.vector.collection.clone(),
        dimension: config.vector.dimension,
        max_id_chars: config.vector.max_id_chars,
        max_text_chars: config.vector.max_text_chars,
        default_top_k: config.vector.default_top_k,
        timeout: config.vector_timeout(),
    }
}

/// Initialize the collection and compose the service.
///
/// The collection must reach `Loaded` before this returns; the caller must not serve
/// traffic otherwise.
///
/// # Errors
///
/// Returns the initialization failure with the collection name attached.
pub async fn build_service<P: EmbeddingProvider>(
    config: &Config,
    provider: P,
    engine: Arc<dyn VectorEngine>,
) -> anyhow::Result<MemoryService<P>> {
    let store = Arc::new(VectorStore::new(engine, store_config(config)));
    store.initialize().await.with_context(|| {
        format!(
            "failed to initialize collection '{}' on {} engine",
            config.vector.collection, config.vector.engine
        )
    })?;
    tracing::info!(
        "memory service ready: provider={}, collection={}, dimension={}",
        provider.name(),
        config.vector.collection,
        config.vector.dimension
    );
    Ok(MemoryService::new(provider, store))
}
