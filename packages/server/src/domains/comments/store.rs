//! Comment store trait and in-memory implementation.
//!
//! The `CommentStore` trait abstracts comment persistence, allowing
//! different implementations for production and testing:
//! - Production: `PgCommentStore` backed by Postgres
//! - Testing: `MemoryCommentStore` with the same upsert and ordering
//!   semantics

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use thiserror::Error;

use super::types::{NewComment, StoredComment, VideoSummary};

/// Persistence errors surfaced by a comment store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Keyed, append/update persistence for per-video comment collections.
///
/// Contract highlights:
/// - `upsert_batch` deduplicates the batch by `cid` (last write wins),
///   updates rows whose `cid` already exists (leaving `seq` untouched),
///   inserts the rest with fresh ascending `seq`, and returns the
///   inserted count only.
/// - `scan_page` is the building block of a restartable, forward-only
///   cursor ordered strictly by `seq` ascending.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Idempotently provision the collection for a video before first use.
    async fn ensure_collection(&self, video_id: &str) -> Result<(), StoreError>;

    /// Whether any ingestion has ever provisioned/populated this video.
    async fn collection_exists(&self, video_id: &str) -> Result<bool, StoreError>;

    /// Upsert a batch of comments. Returns how many were newly inserted;
    /// updates are not counted.
    async fn upsert_batch(
        &self,
        video_id: &str,
        batch: Vec<NewComment>,
    ) -> Result<usize, StoreError>;

    /// One page of comments with `seq >= from_seq`, ordered by `seq`
    /// ascending, at most `limit` rows.
    async fn scan_page(
        &self,
        video_id: &str,
        from_seq: i64,
        limit: i64,
    ) -> Result<Vec<StoredComment>, StoreError>;

    /// Cids of stored comments that the upstream reported replies for.
    async fn parents_with_replies(&self, video_id: &str) -> Result<Vec<String>, StoreError>;

    /// All stored videos with their comment counts.
    async fn list_videos(&self) -> Result<Vec<VideoSummary>, StoreError>;
}

/// Restartable forward-only scan over a video's comments, yielded in
/// batches of `batch_size` to bound memory. Stops at the first empty page.
pub fn scan_batches(
    store: Arc<dyn CommentStore>,
    video_id: String,
    from_seq: i64,
    batch_size: i64,
) -> impl Stream<Item = Result<Vec<StoredComment>, StoreError>> {
    stream::try_unfold(
        (store, video_id, from_seq),
        move |(store, video_id, cursor)| async move {
            let page = store.scan_page(&video_id, cursor, batch_size).await?;
            match page.last() {
                Some(last) => {
                    let next = last.seq + 1;
                    Ok(Some((page, (store, video_id, next))))
                }
                None => Ok(None),
            }
        },
    )
    .boxed()
}

/// Deduplicate a batch by `cid`, keeping each cid's first position and
/// its last-seen value.
pub(crate) fn dedup_last_wins(batch: Vec<NewComment>) -> Vec<NewComment> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    let mut out: Vec<NewComment> = Vec::with_capacity(batch.len());
    for comment in batch {
        match index.get(&comment.cid) {
            Some(&at) => out[at] = comment,
            None => {
                index.insert(comment.cid.clone(), out.len());
                out.push(comment);
            }
        }
    }
    out
}

/// In-memory comment store with the same observable semantics as the
/// Postgres store. Used in tests and available for local development.
#[derive(Default)]
pub struct MemoryCommentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

#[derive(Default)]
struct Collection {
    by_cid: HashMap<String, StoredComment>,
    next_seq: i64,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Collection>> {
        self.collections.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>> {
        self.collections.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn ensure_collection(&self, video_id: &str) -> Result<(), StoreError> {
        let mut collections = self.write();
        collections.entry(video_id.to_string()).or_insert_with(|| Collection {
            by_cid: HashMap::new(),
            next_seq: 1,
        });
        Ok(())
    }

    async fn collection_exists(&self, video_id: &str) -> Result<bool, StoreError> {
        Ok(self.read().contains_key(video_id))
    }

    async fn upsert_batch(
        &self,
        video_id: &str,
        batch: Vec<NewComment>,
    ) -> Result<usize, StoreError> {
        let batch = dedup_last_wins(batch);
        let mut collections = self.write();
        let collection = collections.entry(video_id.to_string()).or_insert_with(|| Collection {
            by_cid: HashMap::new(),
            next_seq: 1,
        });

        let mut inserted = 0;
        for comment in batch {
            match collection.by_cid.get_mut(&comment.cid) {
                Some(existing) => {
                    // Update in place; seq is never reassigned
                    existing.text = comment.text;
                    existing.create_time = comment.create_time;
                    existing.reply_comment_total = comment.reply_comment_total;
                }
                None => {
                    let seq = collection.next_seq;
                    collection.next_seq += 1;
                    collection.by_cid.insert(
                        comment.cid.clone(),
                        StoredComment {
                            seq,
                            cid: comment.cid,
                            text: comment.text,
                            create_time: comment.create_time,
                            reply_comment_total: comment.reply_comment_total,
                        },
                    );
                    inserted += 1;
                }
            }
        }
        Ok(inserted)
    }

    async fn scan_page(
        &self,
        video_id: &str,
        from_seq: i64,
        limit: i64,
    ) -> Result<Vec<StoredComment>, StoreError> {
        let collections = self.read();
        let mut page: Vec<StoredComment> = collections
            .get(video_id)
            .map(|c| {
                c.by_cid
                    .values()
                    .filter(|c| c.seq >= from_seq)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        page.sort_by_key(|c| c.seq);
        page.truncate(limit.max(0) as usize);
        Ok(page)
    }

    async fn parents_with_replies(&self, video_id: &str) -> Result<Vec<String>, StoreError> {
        let collections = self.read();
        let mut parents: Vec<(i64, String)> = collections
            .get(video_id)
            .map(|c| {
                c.by_cid
                    .values()
                    .filter(|c| c.reply_comment_total > 0)
                    .map(|c| (c.seq, c.cid.clone()))
                    .collect()
            })
            .unwrap_or_default();
        parents.sort();
        Ok(parents.into_iter().map(|(_, cid)| cid).collect())
    }

    async fn list_videos(&self) -> Result<Vec<VideoSummary>, StoreError> {
        let collections = self.read();
        let mut videos: Vec<VideoSummary> = collections
            .iter()
            .map(|(video_id, c)| VideoSummary {
                video_id: video_id.clone(),
                comment_count: c.by_cid.len() as i64,
            })
            .collect();
        videos.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(videos)
    }
}
