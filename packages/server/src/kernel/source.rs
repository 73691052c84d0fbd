//! Upstream comment source abstraction.
//!
//! The ingestion engine talks to the upstream through `CommentSource`
//! so tests can script pages and failures without a network. The
//! production implementation wraps `douyin_client::DouyinClient` and
//! folds its error taxonomy into the two classes the engine cares
//! about: could-not-talk (`Transport`) and talked-but-refused
//! (`Protocol`).

use async_trait::async_trait;
use douyin_client::{ClientError, CommentPage, DouyinClient};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream error: {0}")]
    Protocol(String),
}

impl From<ClientError> for SourceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Transport(e) => SourceError::Transport(e.to_string()),
            ClientError::Http { status, body } => {
                SourceError::Transport(format!("HTTP {}: {}", status, body))
            }
            ClientError::Protocol(detail) => SourceError::Protocol(detail),
        }
    }
}

/// One page-fetch against the upstream. A single bounded-timeout call,
/// fail-fast, no internal retry.
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Fetch one page of top-level comments.
    async fn fetch_page(&self, video_id: &str, cursor: u64) -> Result<CommentPage, SourceError>;

    /// Fetch one page of replies under a single top-level comment.
    async fn fetch_reply_page(
        &self,
        video_id: &str,
        comment_id: &str,
        cursor: u64,
    ) -> Result<CommentPage, SourceError>;
}

/// Production source backed by the Douyin scraper process.
pub struct DouyinCommentSource {
    client: DouyinClient,
}

impl DouyinCommentSource {
    pub fn new(client: DouyinClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommentSource for DouyinCommentSource {
    async fn fetch_page(&self, video_id: &str, cursor: u64) -> Result<CommentPage, SourceError> {
        Ok(self.client.fetch_video_comments(video_id, cursor).await?)
    }

    async fn fetch_reply_page(
        &self,
        video_id: &str,
        comment_id: &str,
        cursor: u64,
    ) -> Result<CommentPage, SourceError> {
        Ok(self
            .client
            .fetch_video_comment_replies(video_id, comment_id, cursor)
            .await?)
    }
}
