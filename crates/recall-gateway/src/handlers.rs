use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recall_llm::EmbeddingProvider;
use recall_memory::{MemoryRecord, SearchResult};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::server::AppState;

/// Envelope shared by every memory route.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: message.to_owned(),
            data: Some(data),
        }
    }

    pub(crate) fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_owned(),
            data: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InsertRequest {
    pub text: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub query_text: String,
    #[serde(default)]
    pub top_k: i64,
}

#[derive(Debug, Serialize)]
struct StatsData {
    row_count: u64,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

fn bad_body(rejection: &JsonRejection) -> Response {
    tracing::debug!("rejected request body: {rejection}");
    let body: ApiResponse<()> = ApiResponse::failure("invalid request body");
    (rejection.status(), Json(body)).into_response()
}

pub(crate) async fn embedding_handler<P: EmbeddingProvider + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<EmbedRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(e) => return Ok(bad_body(&e)),
    };
    let vector = state.service.embed(&req.text).await?;
    Ok(Json(ApiResponse::ok("embedding generated", vector)).into_response())
}

pub(crate) async fn insert_handler<P: EmbeddingProvider + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<InsertRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(e) => return Ok(bad_body(&e)),
    };
    let record: MemoryRecord = state
        .service
        .insert_text(&req.text, req.id.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok("memory stored", record.without_embedding())).into_response())
}

pub(crate) async fn search_handler<P: EmbeddingProvider + 'static>(
    State(state): State<AppState<P>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(e) => return Ok(bad_body(&e)),
    };
    let results: Vec<SearchResult> = state
        .service
        .search_text(&req.query_text, req.top_k, req.user_id.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok("search completed", results)).into_response())
}

pub(crate) async fn get_handler<P: EmbeddingProvider + 'static>(
    State(state): State<AppState<P>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let record = state.service.get(&id).await?;
    Ok(Json(ApiResponse::ok("memory found", record.without_embedding())).into_response())
}

pub(crate) async fn delete_handler<P: EmbeddingProvider + 'static>(
    State(state): State<AppState<P>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    state.service.delete(&id).await?;
    let body: ApiResponse<()> = ApiResponse {
        success: true,
        message: "memory deleted".into(),
        data: None,
    };
    Ok(Json(body).into_response())
}

pub(crate) async fn stats_handler<P: EmbeddingProvider + 'static>(
    State(state): State<AppState<P>>,
) -> Result<Response, ApiError> {
    let row_count = state.service.statistics().await?;
    Ok(Json(ApiResponse::ok("statistics retrieved", StatsData { row_count })).into_response())
}

pub(crate) async fn health_handler<P: EmbeddingProvider + 'static>(
    State(state): State<AppState<P>>,
) -> impl IntoResponse {
    let ready = state.service.store().state().is_queryable();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if ready { "ok" } else { "unavailable" },
            uptime_secs: state.started_at.elapsed().as_secs(),
        }),
    )
}
