use std::time::Duration;

use recall_llm::EmbedError;
use recall_llm::EmbeddingProvider;
use recall_llm::openai::OpenAiEmbedder;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn embedder(server: &MockServer) -> OpenAiEmbedder {
    OpenAiEmbedder::new(
        "sk-test".into(),
        format!("{}/v1", server.uri()),
        "text-embedding-ada-002".into(),
    )
}

#[tokio::test]
async fn batch_is_sent_in_a_single_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_json(serde_json::json!({
            "model": "text-embedding-ada-002",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"index": 0, "embedding": [0.5, 0.25]},
                {"index": 1, "embedding": [1.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = embedder(&server)
        .embed(&["first".to_owned(), "second".to_owned()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![0.5, 0.25], vec![1.0, 0.0]]);
}

#[tokio::test]
async fn non_success_status_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let err = embedder(&server)
        .embed(&["hello".to_owned()])
        .await
        .unwrap_err();

    match err {
        EmbedError::Provider { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = embedder(&server)
        .embed(&["hello".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, EmbedError::MalformedResponse(_)));
}

#[tokio::test]
async fn wrong_shape_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": [{"vector": [1]}]})),
        )
        .mount(&server)
        .await;

    let err = embedder(&server)
        .embed(&["hello".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, EmbedError::MalformedResponse(_)));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(serde_json::json!({"data": [{"embedding": [1.0]}]})),
        )
        .mount(&server)
        .await;

    let err = embedder(&server)
        .with_timeout(Duration::from_millis(200))
        .embed(&["hello".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, EmbedError::Timeout(_)));
}

#[tokio::test]
async fn blank_text_never_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = embedder(&server)
        .embed(&["ok".to_owned(), "   ".to_owned()])
        .await
        .unwrap_err();
    assert!(matches!(err, EmbedError::InvalidInput(_)));
}
