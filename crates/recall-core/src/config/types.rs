use serde::{Deserialize, Serialize};

use crate::vault::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI API; requires an API key.
    #[default]
    OpenAi,
    /// Any OpenAI-compatible `/embeddings` endpoint; the key is optional.
    Compatible,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Compatible => "compatible",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vector engine selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Qdrant,
    /// Process-local exact engine; contents are lost on exit.
    Memory,
}

impl EngineKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Qdrant => "qdrant",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default = "default_vector_host")]
    pub host: String,
    #[serde(default = "default_vector_port")]
    pub port: u16,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dimension")]
    pub dimension: u64,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_max_id_chars")]
    pub max_id_chars: usize,
    #[serde(default = "default_top_k")]
    pub default_top_k: u64,
}

fn default_vector_host() -> String {
    "localhost".into()
}

fn default_vector_port() -> u16 {
    6334
}

fn default_collection() -> String {
    "text_embeddings".into()
}

fn default_dimension() -> u64 {
    1536
}

fn default_max_text_chars() -> usize {
    recall_memory::store::DEFAULT_MAX_TEXT_CHARS
}

fn default_max_id_chars() -> usize {
    recall_memory::store::DEFAULT_MAX_ID_CHARS
}

fn default_top_k() -> u64 {
    recall_memory::store::DEFAULT_TOP_K
}

impl VectorConfig {
    /// gRPC endpoint of the vector engine.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            host: default_vector_host(),
            port: default_vector_port(),
            collection: default_collection(),
            dimension: default_dimension(),
            max_text_chars: default_max_text_chars(),
            max_id_chars: default_max_id_chars(),
            default_top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_vector_timeout")]
    pub vector_seconds: u64,
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_vector_timeout() -> u64 {
    10
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_seconds: default_embedding_timeout(),
            vector_seconds: default_vector_timeout(),
        }
    }
}

#[derive(Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_max_body() -> usize {
    1_048_576
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            auth_token: None,
            max_body_size: default_gateway_max_body(),
        }
    }
}

/// Secrets resolved at startup; never serialized.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub embedding_api_key: Option<Secret>,
}
