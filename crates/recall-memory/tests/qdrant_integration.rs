use std::sync::Arc;

use recall_llm::mock::MockEmbedder;
use recall_memory::{
    CollectionState, ErrorKind, MemoryRecord, MemoryService, QdrantOps, StoreConfig, VectorStore,
};
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;

const QDRANT_GRPC_PORT: ContainerPort = ContainerPort::Tcp(6334);

fn qdrant_image() -> GenericImage {
    GenericImage::new("qdrant/qdrant", "v1.16.0")
        .with_wait_for(WaitFor::message_on_stdout("gRPC listening"))
        .with_exposed_port(QDRANT_GRPC_PORT)
}

async fn setup(dimension: u64) -> (Arc<VectorStore>, ContainerAsync<GenericImage>) {
    let container = qdrant_image().start().await.unwrap();
    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let url = format!("http://127.0.0.1:{grpc_port}");

    let ops = QdrantOps::new(&url).unwrap();
    let store = Arc::new(VectorStore::new(
        Arc::new(ops),
        StoreConfig::new("recall_it", dimension),
    ));
    (store, container)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn initialize_is_idempotent() {
    let (store, _container) = setup(4).await;

    assert_eq!(store.initialize().await.unwrap(), CollectionState::Loaded);
    assert_eq!(store.initialize().await.unwrap(), CollectionState::Loaded);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn existing_collection_with_other_dimension_is_schema_error() {
    let (store, container) = setup(4).await;
    store.initialize().await.unwrap();

    let grpc_port = container.get_host_port_ipv4(6334).await.unwrap();
    let ops = QdrantOps::new(&format!("http://127.0.0.1:{grpc_port}")).unwrap();
    let other = VectorStore::new(Arc::new(ops), StoreConfig::new("recall_it", 8));
    let err = other.initialize().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaError);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn nearest_record_ranks_first() {
    let (store, _container) = setup(4).await;
    store.initialize().await.unwrap();

    store
        .insert(&MemoryRecord::new("a", "hello", vec![0.0, 0.0, 0.0, 1.0]))
        .await
        .unwrap();
    store
        .insert(&MemoryRecord::new("b", "world", vec![1.0, 0.0, 0.0, 0.0]))
        .await
        .unwrap();

    let results = store.search(&[0.0, 0.0, 0.0, 0.9], 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "a");
    assert_eq!(results[0].text, "hello");
    assert!((results[0].distance - 0.1).abs() < 1e-4);
    assert_eq!(results[1].id, "b");
    assert_eq!(store.statistics().await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn empty_collection_search_is_empty() {
    let (store, _container) = setup(3).await;
    store.initialize().await.unwrap();

    let results = store.search(&[0.1, 0.2, 0.3], 5).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(store.statistics().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn delete_is_exact_and_idempotent() {
    let (store, _container) = setup(2).await;
    store.initialize().await.unwrap();

    store
        .insert(&MemoryRecord::new("keep", "k", vec![1.0, 0.0]))
        .await
        .unwrap();
    store
        .insert(&MemoryRecord::new("drop\" or \"1\"==\"1", "d", vec![0.0, 1.0]))
        .await
        .unwrap();

    store.delete("drop\" or \"1\"==\"1").await.unwrap();
    store.delete("never-existed").await.unwrap();

    assert_eq!(store.statistics().await.unwrap(), 1);
    assert_eq!(store.get("keep").await.unwrap().text, "k");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn duplicate_insert_is_rejected() {
    let (store, _container) = setup(2).await;
    store.initialize().await.unwrap();

    store
        .insert(&MemoryRecord::new("a", "first", vec![1.0, 0.0]))
        .await
        .unwrap();
    let err = store
        .insert(&MemoryRecord::new("a", "second", vec![0.0, 1.0]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateKey);
    assert_eq!(store.get("a").await.unwrap().text, "first");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn service_round_trip() {
    let (store, _container) = setup(8).await;
    store.initialize().await.unwrap();
    let svc = MemoryService::new(MockEmbedder::new(8), Arc::clone(&store));

    let rec = svc.insert_text("semantic memory", None).await.unwrap();
    let results = svc.search_text("semantic memory", 3, None).await.unwrap();
    assert_eq!(results[0].id, rec.id);

    assert!(store.close().await.unwrap());
    assert!(!store.close().await.unwrap());
}
