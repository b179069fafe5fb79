use super::Config;

fn parse_kind<T: serde::de::DeserializeOwned>(var: &str, v: &str) -> Option<T> {
    let parsed = serde_json::from_value(serde_json::Value::String(v.to_lowercase())).ok();
    if parsed.is_none() {
        tracing::warn!("ignoring invalid {var} value: {v}");
    }
    parsed
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_embedding();
        self.apply_env_overrides_vector();
        self.apply_env_overrides_gateway();
    }

    fn apply_env_overrides_embedding(&mut self) {
        if let Ok(v) = std::env::var("RECALL_EMBEDDING_PROVIDER")
            && let Some(kind) = parse_kind("RECALL_EMBEDDING_PROVIDER", &v)
        {
            self.embedding.provider = kind;
        }
        if let Ok(v) = std::env::var("RECALL_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("RECALL_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("RECALL_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
    }

    fn apply_env_overrides_vector(&mut self) {
        if let Ok(v) = std::env::var("RECALL_VECTOR_ENGINE")
            && let Some(kind) = parse_kind("RECALL_VECTOR_ENGINE", &v)
        {
            self.vector.engine = kind;
        }
        if let Ok(v) = std::env::var("RECALL_VECTOR_HOST") {
            self.vector.host = v;
        }
        if let Ok(v) = std::env::var("RECALL_VECTOR_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.vector.port = port;
        }
        if let Ok(v) = std::env::var("RECALL_VECTOR_COLLECTION") {
            self.vector.collection = v;
        }
        if let Ok(v) = std::env::var("RECALL_VECTOR_DIMENSION")
            && let Ok(dim) = v.parse::<u64>()
        {
            self.vector.dimension = dim;
        }
        if let Ok(v) = std::env::var("RECALL_VECTOR_DEFAULT_TOP_K")
            && let Ok(k) = v.parse::<u64>()
        {
            self.vector.default_top_k = k;
        }
        if let Ok(v) = std::env::var("RECALL_TIMEOUT_VECTOR")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.vector_seconds = secs;
        }
    }

    fn apply_env_overrides_gateway(&mut self) {
        if let Ok(v) = std::env::var("RECALL_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("RECALL_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("RECALL_GATEWAY_MAX_BODY_SIZE")
            && let Ok(bytes) = v.parse::<usize>()
        {
            self.gateway.max_body_size = bytes;
        }
    }
}
