use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use recall_core::Config;
use recall_core::bootstrap::{
    build_service, create_embedder, create_engine, load_config, resolve_config_path,
};
use recall_core::vault::EnvVaultProvider;
use recall_gateway::GatewayServer;
use recall_llm::openai::OpenAiEmbedder;
use recall_memory::MemoryService;
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "recall", version, about = "Semantic memory over an embedding provider and a vector engine")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, short, env = "RECALL_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP gateway (default).
    Serve,
    /// Embed and store one text.
    Insert {
        text: String,
        #[arg(long)]
        id: Option<String>,
    },
    /// Rank stored texts by similarity to a query.
    Search {
        query: String,
        #[arg(long, default_value_t = 0)]
        top_k: i64,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Remove a record by id.
    Delete { id: String },
    /// Print the stored row count.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_subscriber();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = load_config(&config_path, &EnvVaultProvider)
        .await
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let embedder = create_embedder(&config)?;
    let engine = create_engine(&config)?;
    let service = Arc::new(build_service(&config, embedder, engine).await?);

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, Arc::clone(&service)).await,
        Command::Insert { text, id } => insert(&service, &text, id.as_deref()).await,
        Command::Search {
            query,
            top_k,
            user_id,
        } => search(&service, &query, top_k, user_id.as_deref()).await,
        Command::Delete { id } => delete(&service, &id).await,
        Command::Stats => stats(&service).await,
    };

    if let Err(e) = service.store().close().await {
        tracing::warn!("failed to close vector store: {e:#}");
    }
    result
}

async fn serve(config: &Config, service: Arc<MemoryService<OpenAiEmbedder>>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(&config.gateway.bind, config.gateway.port, service, shutdown_rx)
        .with_auth(config.gateway.auth_token.clone())
        .with_max_body_size(config.gateway.max_body_size)
        .serve()
        .await?;
    Ok(())
}

async fn insert(
    service: &MemoryService<OpenAiEmbedder>,
    text: &str,
    id: Option<&str>,
) -> anyhow::Result<()> {
    let record = service.insert_text(text, id).await?;
    print_json(&record.without_embedding())
}

async fn search(
    service: &MemoryService<OpenAiEmbedder>,
    query: &str,
    top_k: i64,
    user_id: Option<&str>,
) -> anyhow::Result<()> {
    let results = service.search_text(query, top_k, user_id).await?;
    print_json(&results)
}

async fn delete(service: &MemoryService<OpenAiEmbedder>, id: &str) -> anyhow::Result<()> {
    service.delete(id).await?;
    print_json(&serde_json::json!({ "deleted": id }))
}

async fn stats(service: &MemoryService<OpenAiEmbedder>) -> anyhow::Result<()> {
    let row_count = service.statistics().await?;
    print_json(&serde_json::json!({ "row_count": row_count }))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            tracing::error!("failed to listen for ctrl-c: {e:#}");
                        }
                    }
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("failed to install SIGTERM handler: {e:#}"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e:#}");
        std::future::pending::<()>().await;
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["recall"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_search() {
        let cli = Cli::try_parse_from([
            "recall", "search", "rust", "--top-k", "3", "--user-id", "u1",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Search {
                query,
                top_k,
                user_id,
            }) => {
                assert_eq!(query, "rust");
                assert_eq!(top_k, 3);
                assert_eq!(user_id.as_deref(), Some("u1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_accepts_config_after_subcommand() {
        let cli = Cli::try_parse_from(["recall", "stats", "--config", "x.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
