use serde::{Deserialize, Serialize};

/// Outer envelope shared by every comment endpoint.
///
/// A call succeeded only when `code == 200` and `data.status_code == 0`;
/// anything else is an application-level failure even if the HTTP status
/// was 200.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub code: i64,
    pub data: Option<T>,
}

/// Payload of `fetch_video_comments` / `fetch_video_comment_replies`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentPageData {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub comments: Option<Vec<RawComment>>,
    #[serde(default)]
    pub cursor: Option<u64>,
    #[serde(default)]
    pub has_more: Option<i64>,
}

/// One comment as the upstream serves it. Fields are optional because
/// the scraper occasionally emits partial objects; callers decide what
/// to do with incomplete ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComment {
    pub cid: Option<String>,
    pub text: Option<String>,
    /// Unix timestamp (seconds).
    pub create_time: Option<i64>,
    #[serde(default)]
    pub reply_comment_total: Option<i64>,
}

/// A normalized page of comments.
#[derive(Debug, Clone, Default)]
pub struct CommentPage {
    pub comments: Vec<RawComment>,
    /// Opaque pagination token to pass back for the next page.
    pub cursor: u64,
    pub has_more: bool,
}

impl From<CommentPageData> for CommentPage {
    fn from(data: CommentPageData) -> Self {
        CommentPage {
            comments: data.comments.unwrap_or_default(),
            cursor: data.cursor.unwrap_or(0),
            has_more: data.has_more.unwrap_or(0) == 1,
        }
    }
}

/// Payload of `fetch_one_video`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoDetailData {
    #[serde(default)]
    pub status_code: i64,
    pub aweme_detail: Option<AwemeDetail>,
}

/// Raw video metadata from the upstream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwemeDetail {
    pub aweme_id: Option<String>,
    #[serde(default)]
    pub desc: String,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub create_time: i64,
    /// Milliseconds for most videos, seconds for some older ones.
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub statistics: VideoStatistics,
    pub video: Option<VideoMedia>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoStatistics {
    #[serde(default)]
    pub play_count: i64,
    #[serde(default)]
    pub digg_count: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub share_count: i64,
    #[serde(default)]
    pub collect_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoMedia {
    pub cover: Option<CoverInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverInfo {
    #[serde(default)]
    pub url_list: Vec<String>,
}

/// Request body for the cookie-update sidecar.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCookieRequest {
    pub cookie: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_page_from_sparse_data() {
        let page: CommentPage = CommentPageData::default().into();
        assert!(page.comments.is_empty());
        assert_eq!(page.cursor, 0);
        assert!(!page.has_more);
    }

    #[test]
    fn envelope_deserializes_comment_page() {
        let json = r#"{
            "code": 200,
            "data": {
                "status_code": 0,
                "comments": [
                    {"cid": "1", "text": "nice", "create_time": 1700000000, "reply_comment_total": 3},
                    {"cid": "2", "text": null, "create_time": 1700000001}
                ],
                "cursor": 20,
                "has_more": 1
            }
        }"#;

        let envelope: Envelope<CommentPageData> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 200);

        let page: CommentPage = envelope.data.unwrap().into();
        assert_eq!(page.comments.len(), 2);
        assert_eq!(page.cursor, 20);
        assert!(page.has_more);
        assert_eq!(page.comments[0].reply_comment_total, Some(3));
        assert!(page.comments[1].text.is_none());
    }

    #[test]
    fn video_detail_deserializes() {
        let json = r#"{
            "code": 200,
            "data": {
                "status_code": 0,
                "aweme_detail": {
                    "aweme_id": "123",
                    "desc": "a video",
                    "create_time": 1700000000,
                    "duration": 15000,
                    "statistics": {"play_count": 10, "digg_count": 2},
                    "video": {"cover": {"url_list": ["https://example.com/c.jpg"]}}
                }
            }
        }"#;

        let envelope: Envelope<VideoDetailData> = serde_json::from_str(json).unwrap();
        let detail = envelope.data.unwrap().aweme_detail.unwrap();
        assert_eq!(detail.aweme_id.as_deref(), Some("123"));
        assert_eq!(detail.duration, 15000);
        assert_eq!(detail.statistics.play_count, 10);
        assert_eq!(
            detail.video.unwrap().cover.unwrap().url_list,
            vec!["https://example.com/c.jpg"]
        );
    }
}
