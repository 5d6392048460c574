//! HTTP serving layer.
//!
//! Thin request/response mapping over the [`Gateway`]: deserializes request
//! bodies, runs the synchronous core on the blocking pool, and renders
//! [`Outcome`]s with their status classification. No gateway logic lives
//! here.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::gateway::Gateway;
use crate::outcome::{GatewayError, Outcome};
use crate::store::DocumentRecord;

/// Start the HTTP server and block until shutdown.
pub async fn serve(gateway: Arc<Gateway>, config: &ServerConfig) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "gateway listening at http://{bind_addr}/api");

    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/api/info", get(info))
        .route("/api/models", get(list_models))
        .route("/api/models/load", post(load_model))
        .route("/api/models/unload", post(unload_model))
        .route("/api/models/unload_all", post(unload_all_models))
        .route("/api/embed", post(embed))
        .route("/api/embeddings", post(embed_compat))
        .route("/api/documents", post(learn_document))
        .route("/api/documents/query", post(query_documents))
        .route("/api/documents/count", get(count_documents))
        .with_state(gateway)
}

// ---- request bodies --------------------------------------------------------

fn default_model_type() -> String {
    "default".into()
}

#[derive(Debug, Deserialize)]
struct ModelRequest {
    #[serde(default = "default_model_type")]
    model_type: String,
    model_name: String,
    model_id: Option<String>,
    /// Per-load provider overrides, e.g. `{"url": "...", "model": "..."}` for
    /// the Ollama kind. Absent keys fall back to the process config.
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EmbedRequest {
    text: String,
    #[serde(default = "default_model_type")]
    model_type: String,
    #[serde(default = "default_model_type")]
    model_name: String,
    model_id: Option<String>,
}

/// Ollama-wire-compatible embedding request.
#[derive(Debug, Deserialize)]
struct EmbedCompatRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct LearnDocumentRequest {
    id: Option<String>,
    document: Option<String>,
    embedding: Option<Vec<f32>>,
    uri: Option<String>,
    metadata: Option<serde_json::Value>,
}

fn default_max_records() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct QueryDocumentsRequest {
    #[serde(default = "default_max_records")]
    max_records: usize,
    document: Option<String>,
    embedding: Option<Vec<f32>>,
    metadata: Option<serde_json::Value>,
}

// ---- handlers --------------------------------------------------------------

async fn info() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "vecgate",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_models(State(gateway): State<Arc<Gateway>>) -> Response {
    let outcome = match gateway.list_models() {
        Ok(models) => match serde_json::to_value(models) {
            Ok(payload) => Outcome::with_payload(payload),
            Err(e) => GatewayError::Internal(format!("serialization failed: {e}")).into(),
        },
        Err(e) => e.into(),
    };
    respond(outcome)
}

async fn load_model(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<ModelRequest>,
) -> Response {
    // provider load may read model files from disk
    let result = run_blocking(move || {
        gateway.load_model(
            &req.model_type,
            &req.model_name,
            req.model_id.as_deref(),
            req.parameters.as_ref(),
        )
    })
    .await;
    let outcome = match result {
        Ok(loaded) => Outcome::success(format!("model '{}' loaded", loaded.id)),
        Err(e) => e.into(),
    };
    respond(outcome)
}

async fn unload_model(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<ModelRequest>,
) -> Response {
    let outcome =
        match gateway.unload_model(&req.model_type, &req.model_name, req.model_id.as_deref()) {
            Ok(id) => Outcome::success(format!("model '{id}' unloaded")),
            Err(e) => e.into(),
        };
    respond(outcome)
}

async fn unload_all_models(State(gateway): State<Arc<Gateway>>) -> Response {
    let outcome = match gateway.unload_all_models() {
        Ok(count) => Outcome::success(format!("{count} models unloaded")),
        Err(e) => e.into(),
    };
    respond(outcome)
}

async fn embed(State(gateway): State<Arc<Gateway>>, Json(req): Json<EmbedRequest>) -> Response {
    let result = run_blocking(move || {
        gateway.embed(
            &req.text,
            &req.model_type,
            &req.model_name,
            req.model_id.as_deref(),
        )
    })
    .await;
    let outcome = match result {
        Ok(embedding) => Outcome::with_payload(serde_json::json!(embedding)),
        Err(e) => e.into(),
    };
    respond(outcome)
}

/// Alternate response shape for Ollama-compatible callers: the given model
/// name doubles as the registry id.
async fn embed_compat(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<EmbedCompatRequest>,
) -> Response {
    let result =
        run_blocking(move || gateway.embed(&req.prompt, "default", &req.model, None)).await;
    let outcome = match result {
        Ok(embedding) => Outcome::with_payload(serde_json::json!({ "embedding": embedding })),
        Err(e) => e.into(),
    };
    respond(outcome)
}

async fn learn_document(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<LearnDocumentRequest>,
) -> Response {
    let doc = DocumentRecord {
        id: req.id.unwrap_or_default(),
        document: req.document,
        embedding: req.embedding,
        uri: req.uri,
        metadata: req.metadata,
    };
    let id = doc.id.clone();
    let result = run_blocking(move || gateway.learn_document(doc)).await;
    let outcome = match result {
        Ok(()) => Outcome::success(format!("document '{id}' stored")),
        Err(e) => e.into(),
    };
    respond(outcome)
}

async fn query_documents(
    State(gateway): State<Arc<Gateway>>,
    Json(req): Json<QueryDocumentsRequest>,
) -> Response {
    let result = run_blocking(move || {
        gateway.query_documents(
            req.max_records,
            req.document.as_deref(),
            req.embedding,
            req.metadata.as_ref(),
        )
    })
    .await;
    let outcome = match result {
        Ok(records) => match serde_json::to_value(records) {
            Ok(payload) => Outcome::with_payload(payload),
            Err(e) => GatewayError::Internal(format!("serialization failed: {e}")).into(),
        },
        Err(e) => e.into(),
    };
    respond(outcome)
}

async fn count_documents(State(gateway): State<Arc<Gateway>>) -> Response {
    let result = run_blocking(move || gateway.count_documents()).await;
    let outcome = match result {
        Ok(count) => Outcome::with_payload(serde_json::json!(count)),
        Err(e) => e.into(),
    };
    respond(outcome)
}

// ---- plumbing --------------------------------------------------------------

/// Run a synchronous gateway operation on the blocking pool. Provider and
/// store calls may block on network or model inference.
async fn run_blocking<T, F>(f: F) -> Result<T, GatewayError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, GatewayError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GatewayError::Internal(format!("task failed: {e}")))?
}

fn respond(outcome: Outcome) -> Response {
    let status = StatusCode::from_u16(outcome.status.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !outcome.is_success() {
        tracing::debug!(status = %status, reason = ?outcome.reason, "request failed");
    }
    (status, Json(outcome.body())).into_response()
}
