//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use douyin_client::DouyinClient;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::comments::CommentStore;
use crate::kernel::TaskRegistry;
use crate::server::routes::{
    all_store_videos_handler, cancel_fetch_comments_handler, comments_handler,
    comments_stream_handler, fetch_comments_handler, fetch_comments_replies_handler,
    health_handler, login_handler, task_progress_handler, video_info_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub registry: Arc<TaskRegistry>,
    pub store: Arc<dyn CommentStore>,
    pub client: Arc<DouyinClient>,
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/login", post(login_handler))
        .route("/all_store_videos", get(all_store_videos_handler))
        .route("/video_info", get(video_info_handler))
        .route("/comments", get(comments_handler))
        .route("/comments_stream", get(comments_stream_handler))
        .route("/fetch_comments", get(fetch_comments_handler))
        .route("/cancel_fetch_comments", get(cancel_fetch_comments_handler))
        .route("/fetch_comments_replies", get(fetch_comments_replies_handler))
        .route("/task_progress", get(task_progress_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        // The web frontend runs as a separate service
        .layer(CorsLayer::permissive())
}
