//! Shared test doubles for ingestion tests: scripted upstream sources
//! and a fault-injecting store wrapper.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::TimeZone;
use douyin_client::{CommentPage, RawComment};
use server_core::domains::comments::{
    CommentStore, MemoryCommentStore, NewComment, StoreError, StoredComment, VideoSummary,
};
use server_core::kernel::{CommentSource, SourceError};
use tokio::sync::watch;

pub fn raw(cid: &str, text: &str, reply_total: i64) -> RawComment {
    RawComment {
        cid: Some(cid.to_string()),
        text: Some(text.to_string()),
        create_time: Some(1_700_000_000),
        reply_comment_total: Some(reply_total),
    }
}

pub fn stored(cid: &str, text: &str, reply_total: i64) -> NewComment {
    NewComment {
        cid: cid.to_string(),
        text: text.to_string(),
        create_time: chrono::Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        reply_comment_total: reply_total,
    }
}

pub fn page(comments: Vec<RawComment>, cursor: u64, has_more: bool) -> CommentPage {
    CommentPage {
        comments,
        cursor,
        has_more,
    }
}

pub fn empty_page() -> CommentPage {
    page(vec![], 0, false)
}

type Script = VecDeque<Result<CommentPage, SourceError>>;

/// Upstream double that serves pre-scripted pages. Top-level pages pop
/// from one queue; reply pages pop from a per-parent queue. An
/// exhausted queue serves an empty terminal page.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<Script>,
    replies: Mutex<HashMap<String, Script>>,
    pages_served: AtomicU64,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, result: Result<CommentPage, SourceError>) {
        self.pages.lock().unwrap().push_back(result);
    }

    pub fn push_reply_page(&self, parent_cid: &str, result: Result<CommentPage, SourceError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(parent_cid.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn pages_served(&self) -> u64 {
        self.pages_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentSource for ScriptedSource {
    async fn fetch_page(&self, _video_id: &str, _cursor: u64) -> Result<CommentPage, SourceError> {
        self.pages_served.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(empty_page()))
    }

    async fn fetch_reply_page(
        &self,
        _video_id: &str,
        comment_id: &str,
        _cursor: u64,
    ) -> Result<CommentPage, SourceError> {
        self.replies
            .lock()
            .unwrap()
            .get_mut(comment_id)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| Ok(empty_page()))
    }
}

/// Upstream double that never runs out of pages; every page claims more
/// follow. Only cancellation ends an ingest against it.
#[derive(Default)]
pub struct EndlessSource {
    pages_served: AtomicU64,
}

impl EndlessSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pages_served(&self) -> u64 {
        self.pages_served.load(Ordering::SeqCst)
    }

    fn next_page(&self) -> CommentPage {
        let n = self.pages_served.fetch_add(1, Ordering::SeqCst);
        page(
            vec![raw(&format!("c{}", n), "endless", 0)],
            n + 1,
            true,
        )
    }
}

#[async_trait]
impl CommentSource for EndlessSource {
    async fn fetch_page(&self, _video_id: &str, _cursor: u64) -> Result<CommentPage, SourceError> {
        Ok(self.next_page())
    }

    async fn fetch_reply_page(
        &self,
        _video_id: &str,
        _comment_id: &str,
        _cursor: u64,
    ) -> Result<CommentPage, SourceError> {
        Ok(self.next_page())
    }
}

/// Opens a `GatedSource` so its in-flight fetches return.
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn open(&self) {
        let _ = self.tx.send(true);
    }
}

/// Upstream double whose fetches block until the gate opens, then serve
/// a terminal empty page. Lets tests hold tasks in the Running state.
pub struct GatedSource {
    rx: watch::Receiver<bool>,
}

impl GatedSource {
    pub fn new() -> (Self, Gate) {
        let (tx, rx) = watch::channel(false);
        (Self { rx }, Gate { tx })
    }

    async fn wait_for_gate(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

#[async_trait]
impl CommentSource for GatedSource {
    async fn fetch_page(&self, _video_id: &str, _cursor: u64) -> Result<CommentPage, SourceError> {
        self.wait_for_gate().await;
        Ok(empty_page())
    }

    async fn fetch_reply_page(
        &self,
        _video_id: &str,
        _comment_id: &str,
        _cursor: u64,
    ) -> Result<CommentPage, SourceError> {
        self.wait_for_gate().await;
        Ok(empty_page())
    }
}

/// In-memory store whose upserts fail, for exercising the storage
/// failure path.
pub struct FailingStore {
    inner: MemoryCommentStore,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCommentStore::new(),
        }
    }
}

#[async_trait]
impl CommentStore for FailingStore {
    async fn ensure_collection(&self, video_id: &str) -> Result<(), StoreError> {
        self.inner.ensure_collection(video_id).await
    }

    async fn collection_exists(&self, video_id: &str) -> Result<bool, StoreError> {
        self.inner.collection_exists(video_id).await
    }

    async fn upsert_batch(
        &self,
        _video_id: &str,
        _batch: Vec<NewComment>,
    ) -> Result<usize, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn scan_page(
        &self,
        video_id: &str,
        from_seq: i64,
        limit: i64,
    ) -> Result<Vec<StoredComment>, StoreError> {
        self.inner.scan_page(video_id, from_seq, limit).await
    }

    async fn parents_with_replies(&self, video_id: &str) -> Result<Vec<String>, StoreError> {
        self.inner.parents_with_replies(video_id).await
    }

    async fn list_videos(&self) -> Result<Vec<VideoSummary>, StoreError> {
        self.inner.list_videos().await
    }
}

/// Poll until `condition` holds, yielding between attempts.
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
