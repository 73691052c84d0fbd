use chrono::{DateTime, Utc};
use serde::Serialize;

/// A comment candidate for persistence, already normalized and filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    /// Upstream-issued stable key, unique within one video's collection.
    pub cid: String,
    pub text: String,
    pub create_time: DateTime<Utc>,
    /// Number of replies the upstream reported for this comment.
    /// Zero for replies themselves.
    pub reply_comment_total: i64,
}

/// A persisted comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredComment {
    /// Store-assigned sequence number, strictly increasing in insertion
    /// order within a video. Never an identity key and never reassigned.
    pub seq: i64,
    pub cid: String,
    pub text: String,
    pub create_time: DateTime<Utc>,
    pub reply_comment_total: i64,
}

/// One row of the stored-video catalog.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub comment_count: i64,
}
