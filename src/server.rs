//! HTTP surface of the image search service.
//!
//! # Endpoints
//!
//! - `POST /upload` - multipart `file`; embeds, saves and indexes the image
//! - `POST /search?k=5` - multipart `file`; nearest stored images
//! - `GET /health` - number of stored images
//! - `GET /images/{filename}` - raw stored image

use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    embedding::ImageEmbedder,
    error::AppError,
    images::ImageDir,
    store::{SearchHit, SimilarityStore},
};

pub const DEFAULT_K: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn ImageEmbedder>,
    pub store: Arc<SimilarityStore>,
    pub images: ImageDir,
}

impl AppState {
    pub fn new(embedder: Arc<dyn ImageEmbedder>, images: ImageDir) -> Self {
        let store = SimilarityStore::flat(embedder.dim());
        Self {
            embedder,
            store: Arc::new(store),
            images,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub status: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub images: usize,
    pub dim: usize,
}

struct UploadedFile {
    filename: Option<String>,
    bytes: Bytes,
}

async fn read_file_field(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok(UploadedFile { filename, bytes });
    }
    Err(AppError::MissingFile)
}

async fn embed(state: &AppState, bytes: Bytes) -> Result<Vec<f32>, AppError> {
    let embedder = state.embedder.clone();
    let embedding = tokio::task::spawn_blocking(move || embedder.embed(&bytes)).await??;
    Ok(embedding)
}

async fn handle_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let file = read_file_field(multipart).await?;
    let filename = file.filename.ok_or(AppError::MissingFilename)?;

    // reject bad names before paying for inference
    state.images.path_for(&filename)?;

    tracing::info!("Embedding upload {} ({} bytes)", filename, file.bytes.len());
    let embedding = embed(&state, file.bytes.clone()).await?;

    let path = state.images.save(&filename, &file.bytes).await?;
    let stored = state.store.add(&embedding, path)?;

    tracing::info!(
        "Stored {} at position {}",
        stored.path.display(),
        stored.index
    );

    Ok(Json(UploadResponse {
        status: "saved".to_string(),
        filename,
    }))
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    multipart: Multipart,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let file = read_file_field(multipart).await?;

    tracing::info!("Generating embedding vector for search query");
    let embedding = embed(&state, file.bytes).await?;

    let hits = state.store.search(&embedding, params.k)?;

    tracing::info!("Found {} of {} requested neighbors", hits.len(), params.k);

    Ok(Json(hits))
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        images: state.store.len(),
        dim: state.store.dim(),
    })
}

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let stored_images = ServeDir::new(state.images.root());

    Router::new()
        .route("/upload", post(handle_upload))
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .nest_service("/images", stored_images)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    max_upload_bytes: usize,
) -> std::io::Result<()> {
    let router = create_router(state, max_upload_bytes);

    tracing::info!("Starting image search server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
