use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use recall_llm::EmbeddingProvider;
use recall_memory::MemoryService;
use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;

pub(crate) struct AppState<P: EmbeddingProvider> {
    pub service: Arc<MemoryService<P>>,
    pub started_at: Instant,
}

impl<P: EmbeddingProvider> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            started_at: self.started_at,
        }
    }
}

pub struct GatewayServer<P: EmbeddingProvider> {
    addr: SocketAddr,
    auth_token: Option<String>,
    max_body_size: usize,
    service: Arc<MemoryService<P>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<P: EmbeddingProvider + 'static> GatewayServer<P> {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        service: Arc<MemoryService<P>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0, set an auth token for public exposure");
        }

        Self {
            addr,
            auth_token: None,
            max_body_size: 1_048_576,
            service,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Serve until the shutdown signal flips to `true`, then drain in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let state = AppState {
            service: self.service,
            started_at: Instant::now(),
        };

        if self.auth_token.is_none() {
            tracing::warn!("gateway auth disabled, every client can read and write memories");
        }
        let router = build_router(state, self.auth_token, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("gateway listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("gateway shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use recall_llm::mock::MockEmbedder;
    use recall_memory::{InMemoryEngine, StoreConfig, VectorStore};

    use super::*;

    fn service() -> Arc<MemoryService<MockEmbedder>> {
        let store = Arc::new(VectorStore::new(
            Arc::new(InMemoryEngine::new()),
            StoreConfig::new("gw", 4),
        ));
        Arc::new(MemoryService::new(MockEmbedder::new(4), store))
    }

    #[test]
    fn server_builder_chain() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 8090, service(), srx)
            .with_auth(Some("token".into()))
            .with_max_body_size(512);

        assert_eq!(server.max_body_size, 512);
        assert!(server.auth_token.is_some());
    }

    #[test]
    fn empty_token_disables_auth() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 8090, service(), srx).with_auth(Some(String::new()));
        assert!(server.auth_token.is_none());
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (_stx, srx) = watch::channel(false);
        let server = GatewayServer::new("not_an_ip", 9999, service(), srx);
        assert_eq!(server.addr.port(), 9999);
        assert!(server.addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let (stx, srx) = watch::channel(false);
        let server = GatewayServer::new("127.0.0.1", 0, service(), srx);
        let handle = tokio::spawn(server.serve());

        tokio::time::sleep(Duration::from_millis(50)).await;
        stx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
