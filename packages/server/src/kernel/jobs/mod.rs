//! Background ingestion tasks.
//!
//! A task is a unit of background work scoped to (job class, video id):
//! either fetching a video's top-level comments page by page, or fanning
//! out over its commented-on parents to fetch replies. Tasks are tracked
//! in the in-memory `TaskRegistry`, report progress through a shared
//! snapshot, and stop cooperatively when their cancellation token is set.
//!
//! Task state is volatile by design: it describes work in flight, and a
//! restart simply forgets it. Only the comments themselves persist.

pub mod fanout;
pub mod ingest;
pub mod registry;

use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::domains::comments::StoreError;
use crate::kernel::source::SourceError;

pub use registry::TaskRegistry;

/// The two kinds of background work, each with its own admission ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    /// Top-level comment ingestion for one video.
    FetchComments,
    /// Reply ingestion fanned out over one video's parent comments.
    FetchReplies,
}

impl JobClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobClass::FetchComments => "fetch_comments",
            JobClass::FetchReplies => "fetch_comments_replies",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Cumulative counters for one task. Monotonically non-decreasing over
/// the task's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Progress {
    /// Page-loop counters: raw records seen vs. newly inserted.
    Pages { fetched: u64, stored: u64 },
    /// Fan-out counters: parents finished vs. replies newly inserted.
    Units { processed: u64, stored: u64 },
}

/// Mutable task state, written only by the task's own background unit
/// and copied out under its lock for pollers.
#[derive(Debug, Clone)]
pub struct JobState {
    pub status: JobStatus,
    pub progress: Progress,
    pub error: Option<String>,
}

impl JobState {
    fn new(progress: Progress) -> Self {
        Self {
            status: JobStatus::Running,
            progress,
            error: None,
        }
    }

    pub fn running_pages() -> Self {
        Self::new(Progress::Pages {
            fetched: 0,
            stored: 0,
        })
    }

    pub fn running_units() -> Self {
        Self::new(Progress::Units {
            processed: 0,
            stored: 0,
        })
    }

    /// Account for one ingested page.
    pub fn record_page(&mut self, fetched_delta: u64, stored_delta: u64) {
        if let Progress::Pages { fetched, stored } = &mut self.progress {
            *fetched += fetched_delta;
            *stored += stored_delta;
        }
    }

    /// Account for one completed fan-out unit.
    pub fn record_unit(&mut self, stored_delta: u64) {
        if let Progress::Units { processed, stored } = &mut self.progress {
            *processed += 1;
            *stored += stored_delta;
        }
    }
}

/// Shared handle to a task's state; the progress sink for the engines.
pub type SharedJobState = Mutex<JobState>;

/// Read-only copy of a task for progress polling, safe to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub video_id: String,
    pub status: JobStatus,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why an ingestion task stopped.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(IngestError),
}

/// Failures that terminate an ingestion task. Recorded in the task's
/// snapshot for polling; never propagated across task boundaries.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Synchronous admission failures, returned directly to the caller.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("a task of this kind already exists for this video")]
    DuplicateJob,

    #[error("task slots are full; cancel a task or wait for one to finish")]
    CapacityExceeded,
}

/// Cancelling a task that is not in the registry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CancelError {
    #[error("no such task for this video")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_progress_accumulates() {
        let mut state = JobState::running_pages();
        state.record_page(20, 18);
        state.record_page(5, 2);
        assert_eq!(
            state.progress,
            Progress::Pages {
                fetched: 25,
                stored: 20
            }
        );
    }

    #[test]
    fn unit_progress_counts_completions() {
        let mut state = JobState::running_units();
        state.record_unit(7);
        state.record_unit(0);
        assert_eq!(
            state.progress,
            Progress::Units {
                processed: 2,
                stored: 7
            }
        );
    }

    #[test]
    fn progress_serializes_flat() {
        let progress = Progress::Pages {
            fetched: 3,
            stored: 1,
        };
        let json = serde_json::to_value(progress).unwrap();
        assert_eq!(json, serde_json::json!({"fetched": 3, "stored": 1}));
    }
}
