//! Fan-out runner for reply ingestion.
//!
//! Given the fixed list of parent comments read at task start, runs one
//! reply-ingestion unit per parent through a bounded worker pool and
//! aggregates results in completion order. A single parent's failure is
//! absorbed (logged, counted as zero stored) so one bad parent cannot
//! fail the whole task; this runner therefore never ends `Failed`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::domains::comments::CommentStore;
use crate::kernel::source::CommentSource;

use super::ingest::ingest_parent_replies;
use super::{Outcome, SharedJobState};

pub async fn run_reply_fanout(
    source: Arc<dyn CommentSource>,
    store: Arc<dyn CommentStore>,
    video_id: String,
    parents: Vec<String>,
    throttle: Duration,
    concurrency: usize,
    cancel: CancellationToken,
    state: Arc<SharedJobState>,
) -> Outcome {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut units = JoinSet::new();

    for parent_cid in parents {
        let source = Arc::clone(&source);
        let store = Arc::clone(&store);
        let video_id = video_id.clone();
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();

        units.spawn(async move {
            // Waiting for a worker slot must wake on cancellation too.
            let _permit = tokio::select! {
                _ = cancel.cancelled() => return 0u64,
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return 0u64,
                },
            };

            match ingest_parent_replies(
                source.as_ref(),
                store.as_ref(),
                &video_id,
                &parent_cid,
                throttle,
                &cancel,
            )
            .await
            {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::warn!(
                        video_id = %video_id,
                        parent_cid = %parent_cid,
                        error = %e,
                        "Reply fetch for parent failed"
                    );
                    0
                }
            }
        });
    }

    while let Some(result) = units.join_next().await {
        let stored = match result {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(video_id = %video_id, error = %e, "Reply unit did not finish");
                0
            }
        };
        state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record_unit(stored);

        if cancel.is_cancelled() {
            // Stop waiting for the rest; in-flight units keep their own
            // clone of the token and wind down at their next checkpoint.
            units.detach_all();
            return Outcome::Cancelled;
        }
    }

    if cancel.is_cancelled() {
        Outcome::Cancelled
    } else {
        Outcome::Completed
    }
}
