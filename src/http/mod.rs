//! HTTP boundary: axum routes over the store, the trim engine and the workspace registry

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::engine::TrimEngine;
use crate::store::AssetStore;
use crate::workspace::WorkspaceRegistry;

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};

/// Header naming the client session
pub const SESSION_HEADER: &str = "x-clipia-session";

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: AssetStore,
    pub engine: TrimEngine,
    pub workspace: WorkspaceRegistry,
}

impl AppState {
    pub fn new(store: AssetStore, engine: TrimEngine, workspace: WorkspaceRegistry) -> Self {
        Self {
            store,
            engine,
            workspace,
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .store
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/upload_video", post(handlers::upload_video))
        .route("/upload_image", post(handlers::upload_image))
        .route("/trim_video", post(handlers::trim_video))
        .route("/split_video", post(handlers::split_video))
        .route("/get_video/:id", get(handlers::get_video))
        .route("/get_image/:id", get(handlers::get_image))
        .route("/assets/:id", get(handlers::asset_metadata))
        .route("/workspace", get(handlers::get_workspace))
        .route("/workspace/context", put(handlers::put_workspace_context))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
