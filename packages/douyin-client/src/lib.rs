//! Pure Douyin scraping API client.
//!
//! A minimal client for the self-hosted Douyin scraper process. Supports
//! fetching top-level video comments, comment replies, single-video
//! metadata, and pushing a fresh cookie to the credential sidecar.
//!
//! Every call is a single bounded-timeout request with no internal retry;
//! callers decide whether a failure is worth a new attempt.
//!
//! # Example
//!
//! ```rust,ignore
//! use douyin_client::DouyinClient;
//!
//! let client = DouyinClient::new("http://douyin_api:5000".into())?;
//!
//! let page = client.fetch_video_comments("7345112233", 0).await?;
//! for comment in &page.comments {
//!     println!("{}", comment.text.as_deref().unwrap_or("(no text)"));
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{ClientError, Result};
pub use types::{AwemeDetail, CommentPage, RawComment};

use std::time::Duration;

use serde::de::DeserializeOwned;
use types::{CommentPageData, Envelope, UpdateCookieRequest, VideoDetailData};

/// Request timeout. Generous enough for the scraper's own upstream call,
/// short enough that a wedged process surfaces as a transport error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DouyinClient {
    client: reqwest::Client,
    base_url: String,
}

impl DouyinClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one page of top-level comments for a video.
    pub async fn fetch_video_comments(&self, aweme_id: &str, cursor: u64) -> Result<CommentPage> {
        let url = format!("{}/fetch_video_comments", self.base_url);
        let data: CommentPageData = self
            .get_enveloped(&url, &[("aweme_id", aweme_id), ("cursor", &cursor.to_string())])
            .await?;
        Ok(data.into())
    }

    /// Fetch one page of replies to a single top-level comment.
    pub async fn fetch_video_comment_replies(
        &self,
        item_id: &str,
        comment_id: &str,
        cursor: u64,
    ) -> Result<CommentPage> {
        let url = format!("{}/fetch_video_comment_replies", self.base_url);
        let data: CommentPageData = self
            .get_enveloped(
                &url,
                &[
                    ("item_id", item_id),
                    ("comment_id", comment_id),
                    ("cursor", &cursor.to_string()),
                ],
            )
            .await?;
        Ok(data.into())
    }

    /// Fetch metadata for a single video.
    pub async fn fetch_one_video(&self, aweme_id: &str) -> Result<AwemeDetail> {
        let url = format!("{}/fetch_one_video", self.base_url);
        let data: VideoDetailData = self
            .get_enveloped(&url, &[("aweme_id", aweme_id)])
            .await?;
        data.aweme_detail
            .ok_or_else(|| ClientError::Protocol("response missing aweme_detail".to_string()))
    }

    /// Push a new cookie to the credential sidecar, which rewrites the
    /// scraper config and restarts the scraper process.
    pub async fn update_cookie(&self, cookie: String) -> Result<serde_json::Value> {
        let url = format!("{}/update_cookie", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&UpdateCookieRequest { cookie })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }

    /// Issue a GET, check HTTP status, then unwrap the `{code, data}`
    /// envelope shared by the comment and video endpoints.
    async fn get_enveloped<T>(&self, url: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned + EnvelopeStatus,
    {
        tracing::debug!(url, "Fetching from upstream");
        let resp = self.client.get(url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope<T> = resp.json().await?;
        if envelope.code != 200 {
            return Err(ClientError::Protocol(format!(
                "upstream code {}",
                envelope.code
            )));
        }

        let data = envelope
            .data
            .ok_or_else(|| ClientError::Protocol("response missing data".to_string()))?;
        if data.status_code() != 0 {
            return Err(ClientError::Protocol(format!(
                "upstream status_code {}",
                data.status_code()
            )));
        }

        Ok(data)
    }
}

/// Inner-payload status code shared by enveloped responses.
pub trait EnvelopeStatus {
    fn status_code(&self) -> i64;
}

impl EnvelopeStatus for CommentPageData {
    fn status_code(&self) -> i64 {
        self.status_code
    }
}

impl EnvelopeStatus for VideoDetailData {
    fn status_code(&self) -> i64 {
        self.status_code
    }
}
