//! Paginated ingestion engine.
//!
//! Drives the fetch → normalize → dedup-persist → advance-cursor loop for
//! one video (or one parent comment's replies) until the upstream is
//! exhausted, a call fails, or cancellation is observed. The inter-page
//! throttle is an interruptible wait keyed to the cancellation token, so
//! cancellation latency is bounded by the checkpoint granularity rather
//! than the full delay.

use std::time::Duration;

use chrono::DateTime;
use douyin_client::RawComment;
use tokio_util::sync::CancellationToken;

use crate::domains::comments::{CommentStore, NewComment};
use crate::kernel::source::CommentSource;

use super::{IngestError, Outcome, SharedJobState};

/// Ingest all top-level comment pages for one video.
///
/// Updates `state` after each persisted page: `fetched` grows by the raw
/// page size, `stored` by the number of newly inserted rows.
pub async fn run_comment_ingest(
    source: &dyn CommentSource,
    store: &dyn CommentStore,
    video_id: &str,
    throttle: Duration,
    cancel: &CancellationToken,
    state: &SharedJobState,
) -> Outcome {
    if let Err(e) = store.ensure_collection(video_id).await {
        return Outcome::Failed(e.into());
    }

    let mut cursor = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Outcome::Cancelled;
        }

        let page = match source.fetch_page(video_id, cursor).await {
            Ok(page) => page,
            Err(e) => return Outcome::Failed(e.into()),
        };

        // An empty page means the upstream is exhausted, not that the
        // call failed.
        if page.comments.is_empty() {
            return Outcome::Completed;
        }

        let fetched = page.comments.len() as u64;
        let records = normalize(page.comments, false);
        let stored = match store.upsert_batch(video_id, records).await {
            Ok(n) => n as u64,
            Err(e) => return Outcome::Failed(e.into()),
        };

        state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_page(fetched, stored);
        tracing::debug!(video_id, cursor, fetched, stored, "Ingested comment page");

        if !page.has_more {
            return Outcome::Completed;
        }
        cursor = page.cursor;

        // Throttle between pages, waking immediately on cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = tokio::time::sleep(throttle) => {}
        }
    }
}

/// Ingest all reply pages under one parent comment. Returns how many
/// replies were newly stored; exits early (with the count so far) when
/// cancellation is observed between pages.
pub async fn ingest_parent_replies(
    source: &dyn CommentSource,
    store: &dyn CommentStore,
    video_id: &str,
    parent_cid: &str,
    throttle: Duration,
    cancel: &CancellationToken,
) -> Result<u64, IngestError> {
    let mut cursor = 0u64;
    let mut stored_total = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Ok(stored_total);
        }

        let page = source.fetch_reply_page(video_id, parent_cid, cursor).await?;
        if page.comments.is_empty() {
            return Ok(stored_total);
        }

        let records = normalize(page.comments, true);
        stored_total += store.upsert_batch(video_id, records).await? as u64;

        if !page.has_more {
            return Ok(stored_total);
        }
        cursor = page.cursor;

        tokio::select! {
            _ = cancel.cancelled() => return Ok(stored_total),
            _ = tokio::time::sleep(throttle) => {}
        }
    }
}

/// Data-quality filter: drop raw records missing cid, text, or a usable
/// timestamp. Replies do not track their own reply counts.
fn normalize(raw: Vec<RawComment>, replies: bool) -> Vec<NewComment> {
    raw.into_iter()
        .filter_map(|c| {
            let cid = c.cid.filter(|s| !s.is_empty())?;
            let text = c.text.filter(|s| !s.is_empty())?;
            let ts = c.create_time.filter(|&t| t > 0)?;
            let create_time = DateTime::from_timestamp(ts, 0)?;
            let reply_comment_total = if replies {
                0
            } else {
                c.reply_comment_total.unwrap_or(0)
            };
            Some(NewComment {
                cid,
                text,
                create_time,
                reply_comment_total,
            })
        })
        .collect()
}
