//! Kernel module - upstream source adapter and background task
//! infrastructure.

pub mod jobs;
pub mod source;

pub use jobs::{AdmissionError, CancelError, JobClass, JobStatus, JobView, TaskRegistry};
pub use source::{CommentSource, DouyinCommentSource, SourceError};
