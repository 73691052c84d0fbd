//! Stored-video catalog, upstream video metadata, and comment reads.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::DateTime;
use douyin_client::AwemeDetail;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domains::comments::{scan_batches, StoreError};
use crate::server::app::AppState;

/// List every video that has stored comments, with counts.
pub async fn all_store_videos_handler(
    Extension(state): Extension<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let videos = state.store.list_videos().await.map_err(internal_error)?;
    Ok(Json(json!({ "video_data": videos })))
}

#[derive(Deserialize)]
pub struct VideoInfoQuery {
    pub video_id: String,
}

#[derive(Serialize)]
pub struct VideoInfoResponse {
    pub video_id: String,
    pub description: String,
    pub create_time: String,
    /// Seconds.
    pub duration: i64,
    pub cover_url: String,
    pub stats: VideoStats,
}

#[derive(Serialize)]
pub struct VideoStats {
    pub play_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub favorite_count: i64,
}

/// Fetch and normalize metadata for one video from the upstream.
pub async fn video_info_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<VideoInfoQuery>,
) -> Result<Json<VideoInfoResponse>, (StatusCode, Json<Value>)> {
    let detail = state
        .client
        .fetch_one_video(&query.video_id)
        .await
        .map_err(|e| {
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.to_string()})),
            )
        })?;
    Ok(Json(normalize_video_info(query.video_id, detail)))
}

fn normalize_video_info(video_id: String, detail: AwemeDetail) -> VideoInfoResponse {
    // Durations over 1000 are in milliseconds, anything below in seconds.
    let duration = if detail.duration > 1000 {
        ((detail.duration as f64) / 1000.0).round() as i64
    } else {
        detail.duration
    };

    let create_time = DateTime::from_timestamp(detail.create_time, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

    let cover_url = detail
        .video
        .and_then(|v| v.cover)
        .and_then(|c| c.url_list.into_iter().next())
        .unwrap_or_default();

    VideoInfoResponse {
        video_id: detail.aweme_id.unwrap_or(video_id),
        description: detail.desc,
        create_time,
        duration,
        cover_url,
        stats: VideoStats {
            play_count: detail.statistics.play_count,
            like_count: detail.statistics.digg_count,
            comment_count: detail.statistics.comment_count,
            share_count: detail.statistics.share_count,
            favorite_count: detail.statistics.collect_count,
        },
    }
}

#[derive(Deserialize)]
pub struct CommentsQuery {
    pub video_id: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// One page of stored comments ordered by sequence number, for keyset
/// pagination by downstream consumers.
pub async fn comments_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<CommentsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let comments = state
        .store
        .scan_page(&query.video_id, query.start, query.limit)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "comments": comments })))
}

#[derive(Deserialize)]
pub struct CommentsStreamQuery {
    pub video_id: String,
    #[serde(default)]
    pub start: i64,
}

/// Comments in scan batches, per-record.
const STREAM_BATCH_SIZE: i64 = 200;

/// Stream a video's stored comments as NDJSON, ordered by sequence
/// number. This is the read surface for the downstream sentiment
/// consumer; dropping the connection drops the scan with it.
pub async fn comments_stream_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<CommentsStreamQuery>,
) -> Response {
    let store = Arc::clone(&state.store);
    let stream = scan_batches(store, query.video_id, query.start, STREAM_BATCH_SIZE).map(
        |batch| -> Result<Vec<u8>, axum::BoxError> {
            let mut buf = Vec::new();
            for comment in batch? {
                serde_json::to_writer(&mut buf, &comment)?;
                buf.push(b'\n');
            }
            Ok(buf)
        },
    );

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(stream),
    )
        .into_response()
}

fn internal_error(e: StoreError) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": e.to_string()})),
    )
}
