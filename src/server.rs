//! HTTP API.
//!
//! Every backend call (embedding, vector store, opener) is blocking and runs
//! on tokio's blocking pool. Indexing runs in a background blocking task; at
//! most one is active, guarded by the [`StatusHandle`].

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    Json,
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    extract::TextExtractor,
    indexer::{self, Indexer},
    opener::FileOpener,
    search::{AggregatedResult, SearchEngine},
    settings::Settings,
    status::StatusHandle,
    vector_store::{RecordMetadata, VectorIndex},
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    indexer: Arc<Indexer>,
    search: Arc<SearchEngine>,
    store: Arc<dyn VectorIndex>,
    opener: Arc<dyn FileOpener>,
    status: StatusHandle,
    default_results: usize,
    collection: String,
    embedding_model: String,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorIndex>,
        opener: Arc<dyn FileOpener>,
    ) -> Result<Self> {
        let indexer = Indexer::new(
            extractor,
            embedder.clone(),
            store.clone(),
            settings.chunking,
            settings.walk_options(),
        )?;
        Ok(Self {
            indexer: Arc::new(indexer),
            search: Arc::new(SearchEngine::new(embedder.clone(), store.clone())),
            store,
            opener,
            status: StatusHandle::new(),
            default_results: settings.default_results,
            collection: settings.collection.clone(),
            embedding_model: embedder.model_id().to_string(),
        })
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/index", post(start_indexing))
        .route("/api/index/status", get(indexing_status))
        .route("/api/search", post(search))
        .route("/api/open-file", post(open_file))
        .route("/api/files", get(list_files))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn detail(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "detail": message.to_string() }))).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct IndexParams {
    directory: Option<String>,
}

async fn start_indexing(
    State(state): State<AppState>,
    Query(query): Query<IndexParams>,
    body: Bytes,
) -> Response {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        IndexParams::default()
    } else {
        match serde_json::from_slice::<IndexParams>(&body) {
            Ok(params) => params,
            Err(e) => {
                return detail(StatusCode::BAD_REQUEST, format!("invalid body: {e}"));
            }
        }
    };

    let Some(directory) = from_body.directory.or(query.directory) else {
        return detail(StatusCode::BAD_REQUEST, "directory is required");
    };

    let path = match indexer::validate_directory(&directory) {
        Ok(path) => path,
        Err(e) => return detail(StatusCode::BAD_REQUEST, e),
    };

    let guard = match state.status.try_start() {
        Ok(guard) => guard,
        Err(e) => return detail(StatusCode::BAD_REQUEST, e),
    };

    info!(directory = %directory, "indexing started");
    let indexer = state.indexer.clone();
    tokio::task::spawn_blocking(move || indexer.run(&path, guard));

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Indexing started",
            "directory": directory,
        })),
    )
        .into_response()
}

async fn indexing_status(State(state): State<AppState>) -> Response {
    Json(state.status.get().snapshot()).into_response()
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    n_results: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<AggregatedResult>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Response {
    let limit = request.n_results.unwrap_or(state.default_results);
    let engine = state.search.clone();
    let query = request.query.clone();

    let response = match blocking(move || engine.search(&query, limit)).await {
        Ok(results) => SearchResponse {
            query: request.query,
            count: results.len(),
            results,
            error: None,
        },
        Err(e) => {
            warn!(query = %request.query, "search failed: {e}");
            SearchResponse {
                query: request.query,
                results: Vec::new(),
                count: 0,
                error: Some(e.to_string()),
            }
        }
    };
    Json(response).into_response()
}

#[derive(Debug, Deserialize)]
struct OpenFileRequest {
    file_path: String,
}

async fn open_file(
    State(state): State<AppState>,
    Json(request): Json<OpenFileRequest>,
) -> Response {
    let path = PathBuf::from(&request.file_path);
    if !path.is_file() {
        return detail(StatusCode::NOT_FOUND, "File not found");
    }

    let opener = state.opener.clone();
    match blocking(move || opener.open(&path)).await {
        Ok(()) => Json(json!({
            "message": "File opened successfully",
            "file_path": request.file_path,
        }))
        .into_response(),
        Err(e @ Error::NotFound { .. }) => detail(StatusCode::NOT_FOUND, e),
        Err(e) => {
            warn!(file_path = %request.file_path, "failed to open file: {e}");
            detail(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to open file: {e}"),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct FilesResponse {
    files: Vec<RecordMetadata>,
    count: usize,
}

async fn list_files(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    match blocking(move || store.files()).await {
        Ok(files) => Json(FilesResponse {
            count: files.len(),
            files,
        })
        .into_response(),
        Err(e) => detail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn health(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    match blocking(move || store.files()).await {
        Ok(files) => Json(json!({
            "status": "healthy",
            "collection": state.collection,
            "indexed_files": files.len(),
            "embedding_model": state.embedding_model,
        }))
        .into_response(),
        Err(e) => detail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
