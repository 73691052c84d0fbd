//! In-memory registry of running ingestion tasks.
//!
//! The registry admits, tracks, cancels, and reaps background tasks
//! keyed by (job class, video id), enforcing a per-class concurrency
//! ceiling. One mutex guards the whole check-then-act admission path so
//! ceiling checks cannot race concurrent admissions. Cancellation only
//! ever signals a task; the sole removal path is the task reaping itself
//! after it reaches a terminal status.
//!
//! Duplicate handling is asymmetric: a second comment-fetch for the
//! same video is rejected, while a second reply-fetch preempts the
//! running one by cancelling it first (newest request wins).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::JobsConfig;
use crate::domains::comments::CommentStore;
use crate::kernel::source::CommentSource;

use super::fanout::run_reply_fanout;
use super::ingest::run_comment_ingest;
use super::{
    AdmissionError, CancelError, JobClass, JobState, JobStatus, JobView, Outcome, SharedJobState,
};

/// One tracked task. State is written only by the task's own background
/// unit; the cancellation token may be set by anyone holding the
/// registry lock.
struct JobEntry {
    /// Distinguishes this entry from a preempting successor under the
    /// same key, so a displaced task never reaps its replacement.
    id: Uuid,
    video_id: String,
    state: Arc<SharedJobState>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobEntry {
    fn new(video_id: &str, state: JobState) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id: video_id.to_string(),
            state: Arc::new(Mutex::new(state)),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    fn view(&self) -> JobView {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        JobView {
            video_id: self.video_id.clone(),
            status: state.status,
            progress: state.progress,
            error: state.error.clone(),
        }
    }
}

type Slots = HashMap<String, Arc<JobEntry>>;
type TaskMap = HashMap<JobClass, Slots>;

pub struct TaskRegistry {
    source: Arc<dyn CommentSource>,
    store: Arc<dyn CommentStore>,
    config: JobsConfig,
    /// Shared with every spawned driver so a finished task can reap its
    /// own entry without holding a handle back to the registry.
    tasks: Arc<Mutex<TaskMap>>,
}

impl TaskRegistry {
    pub fn new(
        source: Arc<dyn CommentSource>,
        store: Arc<dyn CommentStore>,
        config: JobsConfig,
    ) -> Self {
        let mut tasks = TaskMap::new();
        tasks.insert(JobClass::FetchComments, Slots::new());
        tasks.insert(JobClass::FetchReplies, Slots::new());
        Self {
            source,
            store,
            config,
            tasks: Arc::new(Mutex::new(tasks)),
        }
    }

    fn ceiling(&self, class: JobClass) -> usize {
        match class {
            JobClass::FetchComments => self.config.comment_task_limit,
            JobClass::FetchReplies => self.config.reply_task_limit,
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, TaskMap> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit and start a background task for (class, video_id).
    ///
    /// The whole check-then-act sequence runs under the registry lock:
    /// duplicate handling first, then the ceiling check. A preempted
    /// reply task has not reaped yet when the ceiling is checked, so it
    /// still occupies its slot.
    pub fn admit(&self, class: JobClass, video_id: &str) -> Result<(), AdmissionError> {
        let mut tasks = self.lock_tasks();
        let slots = tasks.entry(class).or_default();

        if let Some(existing) = slots.get(video_id) {
            match class {
                JobClass::FetchComments => return Err(AdmissionError::DuplicateJob),
                JobClass::FetchReplies => {
                    // Newest request wins: ask the running task to stop,
                    // fire-and-forget, and carry on with admission.
                    tracing::info!(video_id, "Preempting running reply task");
                    existing.cancel.cancel();
                }
            }
        }

        // A preempted reply task has not reaped yet; its slot still
        // counts here.
        if slots.len() >= self.ceiling(class) {
            return Err(AdmissionError::CapacityExceeded);
        }

        let state = match class {
            JobClass::FetchComments => JobState::running_pages(),
            JobClass::FetchReplies => JobState::running_units(),
        };
        let entry = Arc::new(JobEntry::new(video_id, state));
        slots.insert(video_id.to_string(), Arc::clone(&entry));

        let handle = tokio::spawn(drive(
            Arc::clone(&self.source),
            Arc::clone(&self.store),
            self.config.clone(),
            Arc::clone(&self.tasks),
            class,
            Arc::clone(&entry),
        ));
        *entry.handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        tracing::info!(video_id, class = class.as_str(), "Task admitted");
        Ok(())
    }

    /// Request cancellation of a running task. Signals only; the task
    /// removes itself once it reaches a terminal status.
    pub fn cancel(&self, class: JobClass, video_id: &str) -> Result<(), CancelError> {
        let tasks = self.lock_tasks();
        match tasks.get(&class).and_then(|slots| slots.get(video_id)) {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::info!(video_id, class = class.as_str(), "Cancellation requested");
                Ok(())
            }
            None => Err(CancelError::NotFound),
        }
    }

    /// Read-only copy of one task's state, if it is still registered.
    pub fn snapshot(&self, class: JobClass, video_id: &str) -> Option<JobView> {
        let tasks = self.lock_tasks();
        tasks
            .get(&class)
            .and_then(|slots| slots.get(video_id))
            .map(|entry| entry.view())
    }

    /// Read-only copies of every registered task, grouped by class.
    pub fn snapshot_all(&self) -> HashMap<JobClass, Vec<JobView>> {
        let tasks = self.lock_tasks();
        tasks
            .iter()
            .map(|(class, slots)| {
                let mut views: Vec<JobView> = slots.values().map(|e| e.view()).collect();
                views.sort_by(|a, b| a.video_id.cmp(&b.video_id));
                (*class, views)
            })
            .collect()
    }

    /// Cancel every task and wait for all of them to wind down. Used on
    /// graceful shutdown.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let tasks = self.lock_tasks();
            tasks
                .values()
                .flat_map(|slots| slots.values())
                .filter_map(|entry| {
                    entry.cancel.cancel();
                    entry.handle.lock().unwrap_or_else(|e| e.into_inner()).take()
                })
                .collect()
        };

        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// Background driver: run the task to a terminal status, record it, then
/// reap the entry. This is the only removal path.
async fn drive(
    source: Arc<dyn CommentSource>,
    store: Arc<dyn CommentStore>,
    config: JobsConfig,
    tasks: Arc<Mutex<TaskMap>>,
    class: JobClass,
    entry: Arc<JobEntry>,
) {
    let outcome = match class {
        JobClass::FetchComments => {
            run_comment_ingest(
                source.as_ref(),
                store.as_ref(),
                &entry.video_id,
                config.page_throttle,
                &entry.cancel,
                &entry.state,
            )
            .await
        }
        JobClass::FetchReplies => drive_reply_fanout(&source, &store, &config, &entry).await,
    };

    {
        let mut state = entry.state.lock().unwrap_or_else(|e| e.into_inner());
        match outcome {
            Outcome::Completed => state.status = JobStatus::Completed,
            Outcome::Cancelled => state.status = JobStatus::Cancelled,
            Outcome::Failed(e) => {
                tracing::warn!(
                    video_id = %entry.video_id,
                    class = class.as_str(),
                    error = %e,
                    "Task failed"
                );
                state.status = JobStatus::Failed;
                state.error = Some(e.to_string());
            }
        }
        tracing::info!(
            video_id = %entry.video_id,
            class = class.as_str(),
            status = ?state.status,
            "Task finished"
        );
    }

    reap(&tasks, class, &entry);
}

/// Read the parent list once, then fan out. A video with no stored
/// comments (or none with replies) completes immediately.
async fn drive_reply_fanout(
    source: &Arc<dyn CommentSource>,
    store: &Arc<dyn CommentStore>,
    config: &JobsConfig,
    entry: &Arc<JobEntry>,
) -> Outcome {
    if entry.cancel.is_cancelled() {
        return Outcome::Cancelled;
    }

    let exists = match store.collection_exists(&entry.video_id).await {
        Ok(exists) => exists,
        Err(e) => return Outcome::Failed(e.into()),
    };
    if !exists {
        tracing::info!(video_id = %entry.video_id, "No comments ingested yet, nothing to fan out");
        return Outcome::Completed;
    }

    let parents = match store.parents_with_replies(&entry.video_id).await {
        Ok(parents) => parents,
        Err(e) => return Outcome::Failed(e.into()),
    };
    if parents.is_empty() {
        return Outcome::Completed;
    }

    run_reply_fanout(
        Arc::clone(source),
        Arc::clone(store),
        entry.video_id.clone(),
        parents,
        config.page_throttle,
        config.reply_concurrency,
        entry.cancel.clone(),
        Arc::clone(&entry.state),
    )
    .await
}

/// Remove a terminal task's entry. Identity-checked so a preempted reply
/// task whose key was taken over by a successor removes nothing.
fn reap(tasks: &Mutex<TaskMap>, class: JobClass, entry: &Arc<JobEntry>) {
    let mut tasks = tasks.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(slots) = tasks.get_mut(&class) {
        if slots
            .get(&entry.video_id)
            .is_some_and(|current| current.id == entry.id)
        {
            slots.remove(&entry.video_id);
        }
    }
}
