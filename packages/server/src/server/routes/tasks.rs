//! Task admission, cancellation, and progress-polling endpoints.
//!
//! These are thin translations between HTTP and the `TaskRegistry`:
//! admission and cancellation outcomes map to synchronous responses,
//! progress polling serializes registry snapshots.

use std::collections::HashMap;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::kernel::{AdmissionError, CancelError, JobClass, JobView};
use crate::server::app::AppState;

#[derive(Deserialize)]
pub struct VideoIdQuery {
    pub video_id: String,
}

#[derive(Deserialize)]
pub struct ProgressQuery {
    pub video_id: Option<String>,
}

fn admission_response(
    result: Result<(), AdmissionError>,
    video_id: &str,
) -> (StatusCode, Json<Value>) {
    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"message": "task enqueued", "video_id": video_id})),
        ),
        Err(e @ AdmissionError::DuplicateJob) | Err(e @ AdmissionError::CapacityExceeded) => (
            StatusCode::CONFLICT,
            Json(json!({"error": e.to_string(), "video_id": video_id})),
        ),
    }
}

/// Start a top-level comment-fetch task for a video.
pub async fn fetch_comments_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<VideoIdQuery>,
) -> (StatusCode, Json<Value>) {
    let result = state
        .registry
        .admit(JobClass::FetchComments, &query.video_id);
    admission_response(result, &query.video_id)
}

/// Request cancellation of a running comment-fetch task.
pub async fn cancel_fetch_comments_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<VideoIdQuery>,
) -> (StatusCode, Json<Value>) {
    match state
        .registry
        .cancel(JobClass::FetchComments, &query.video_id)
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"message": "cancellation requested", "video_id": query.video_id})),
        ),
        Err(e @ CancelError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": e.to_string(), "video_id": query.video_id})),
        ),
    }
}

/// Start a reply-fetch task for a video, preempting a running one.
pub async fn fetch_comments_replies_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<VideoIdQuery>,
) -> (StatusCode, Json<Value>) {
    let result = state
        .registry
        .admit(JobClass::FetchReplies, &query.video_id);
    admission_response(result, &query.video_id)
}

/// Poll task progress: one video's tasks, or all running tasks.
pub async fn task_progress_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Json<Value> {
    match query.video_id {
        Some(video_id) => {
            let mut result: HashMap<&'static str, JobView> = HashMap::new();
            for class in [JobClass::FetchComments, JobClass::FetchReplies] {
                if let Some(view) = state.registry.snapshot(class, &video_id) {
                    result.insert(class.as_str(), view);
                }
            }
            Json(json!(result))
        }
        None => {
            let all: HashMap<&'static str, Vec<JobView>> = state
                .registry
                .snapshot_all()
                .into_iter()
                .map(|(class, views)| (class.as_str(), views))
                .collect();
            Json(json!(all))
        }
    }
}
