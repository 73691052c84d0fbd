//! Comment domain - per-video comment collections.
//!
//! Comments are keyed by the upstream-issued `cid` and carry a
//! store-assigned monotonic `seq` used only for ordered pagination.

pub mod pg_store;
pub mod store;
pub mod types;

pub use pg_store::PgCommentStore;
pub use store::{scan_batches, CommentStore, MemoryCommentStore, StoreError};
pub use types::{NewComment, StoredComment, VideoSummary};
