mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::vault::{Secret, VaultProvider};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!("config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve sensitive configuration values through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        let key = match vault.get_secret("RECALL_OPENAI_API_KEY").await? {
            Some(v) => Some(v),
            None => vault.get_secret("OPENAI_API_KEY").await?,
        };
        if let Some(val) = key {
            self.secrets.embedding_api_key = Some(Secret::new(val));
        }
        if let Some(val) = vault.get_secret("RECALL_GATEWAY_TOKEN").await? {
            self.gateway.auth_token = Some(val);
        }
        Ok(())
    }

    /// Reject values no component can run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.vector.dimension == 0 {
            bail!("vector.dimension must be greater than 0");
        }
        if self.vector.default_top_k == 0 {
            bail!("vector.default_top_k must be greater than 0");
        }
        if self.vector.collection.trim().is_empty() {
            bail!("vector.collection must not be empty");
        }
        if self.vector.max_text_chars == 0 || self.vector.max_id_chars == 0 {
            bail!("vector.max_text_chars and vector.max_id_chars must be greater than 0");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if self.embedding.base_url.trim().is_empty() {
            bail!("embedding.base_url must not be empty");
        }
        if self.timeouts.embedding_seconds == 0 || self.timeouts.vector_seconds == 0 {
            bail!("timeouts must be greater than 0 seconds");
        }
        if self.gateway.max_body_size == 0 {
            bail!("gateway.max_body_size must be greater than 0");
        }
        Ok(())
    }

    #[must_use]
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.embedding_seconds)
    }

    #[must_use]
    pub fn vector_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.vector_seconds)
    }
}
