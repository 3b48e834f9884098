use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use kwsearch_core::persist::IndexPaths;
use kwsearch_core::{Bm25Params, DocId, Error as IndexError, InvertedIndex, Tokenizer, DEFAULT_LIMIT};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_LIMIT: usize = 100;

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k1: Option<f64>,
    pub b: Option<f64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { DEFAULT_LIMIT }

#[derive(Deserialize)]
pub struct TermParams {
    pub term: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub title: String,
}

/// Shared server state.
///
/// The index is published as an immutable snapshot behind a pointer swap:
/// requests clone the current `Arc` and never hold the lock while scoring.
#[derive(Clone)]
pub struct AppState {
    pub paths: IndexPaths,
    pub tokenizer: Arc<dyn Tokenizer>,
    index: Arc<RwLock<Arc<InvertedIndex>>>,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(paths: IndexPaths, index: InvertedIndex, tokenizer: Arc<dyn Tokenizer>, admin_token: Option<String>) -> Self {
        Self { paths, tokenizer, index: Arc::new(RwLock::new(Arc::new(index))), admin_token }
    }

    /// Load the saved index at `paths` and wrap it.
    pub fn open(paths: IndexPaths, tokenizer: Arc<dyn Tokenizer>, admin_token: Option<String>) -> kwsearch_core::Result<Self> {
        let index = InvertedIndex::open(&paths, tokenizer.clone())?;
        Ok(Self::new(paths, index, tokenizer, admin_token))
    }

    pub fn snapshot(&self) -> Arc<InvertedIndex> {
        self.index.read().clone()
    }

    /// Load a fresh copy from disk and publish it. In-flight requests keep their old snapshot.
    pub fn reload(&self) -> kwsearch_core::Result<Arc<InvertedIndex>> {
        let fresh = Arc::new(InvertedIndex::open(&self.paths, self.tokenizer.clone())?);
        *self.index.write() = fresh.clone();
        tracing::info!(num_docs = fresh.num_docs(), "index snapshot swapped");
        Ok(fresh)
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/lookup", get(lookup_handler))
        .route("/tf/:doc_id", get(tf_handler))
        .route("/idf", get(idf_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let index = state.snapshot();
    let defaults = Bm25Params::default();
    let bm25 = Bm25Params { k1: params.k1.unwrap_or(defaults.k1), b: params.b.unwrap_or(defaults.b) };

    let hits = index.search(&params.q, bm25, usize::MAX);
    let total_hits = hits.len();
    let limit = params.limit.clamp(1, MAX_LIMIT);
    let results = hits
        .into_iter()
        .take(limit)
        .map(|hit| SearchHit {
            doc_id: hit.doc_id,
            score: hit.score,
            title: index.document(hit.doc_id).map(|d| d.title.clone()).unwrap_or_default(),
        })
        .collect();

    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits, results })
}

pub async fn lookup_handler(State(state): State<AppState>, Query(params): Query<TermParams>) -> Json<serde_json::Value> {
    let doc_ids = state.snapshot().lookup(&params.term);
    Json(serde_json::json!({ "term": params.term, "doc_ids": doc_ids }))
}

pub async fn tf_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<DocId>,
    Query(params): Query<TermParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let tf = state.snapshot().frequency(doc_id, &params.term).map_err(to_api_error)?;
    Ok(Json(serde_json::json!({ "doc_id": doc_id, "term": params.term, "tf": tf })))
}

pub async fn idf_handler(State(state): State<AppState>, Query(params): Query<TermParams>) -> Result<Json<serde_json::Value>, ApiError> {
    let idf = state.snapshot().idf(&params.term).map_err(to_api_error)?;
    Ok(Json(serde_json::json!({ "term": params.term, "idf": idf })))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<serde_json::Value>, ApiError> {
    let index = state.snapshot();
    match index.document(doc_id) {
        Some(doc) => Ok(Json(doc.to_value())),
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let index = state.reload().map_err(to_api_error)?;
    Ok(Json(serde_json::json!({ "num_docs": index.num_docs(), "num_terms": index.num_terms() })))
}

fn to_api_error(err: IndexError) -> ApiError {
    let status = match &err {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        IndexError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

/// Convenience used by `main`: open the index and build the router.
pub fn app_from_disk(paths: IndexPaths, tokenizer: Arc<dyn Tokenizer>) -> Result<Router> {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let state = AppState::open(paths, tokenizer, admin_token)?;
    Ok(build_app(state))
}
