//! Route handlers.

pub mod auth;
pub mod health;
pub mod tasks;
pub mod videos;

pub use auth::login_handler;
pub use health::health_handler;
pub use tasks::{
    cancel_fetch_comments_handler, fetch_comments_handler, fetch_comments_replies_handler,
    task_progress_handler,
};
pub use videos::{
    all_store_videos_handler, comments_handler, comments_stream_handler, video_info_handler,
};
