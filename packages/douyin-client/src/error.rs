use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by the Douyin API client.
///
/// The client never retries internally. `Transport` covers failures to
/// reach the API process at all (including the window where the sidecar
/// restarts it after a cookie update); `Http` covers non-2xx responses;
/// `Protocol` covers well-formed responses whose envelope signals an
/// application-level failure.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("upstream envelope error: {0}")]
    Protocol(String),
}
