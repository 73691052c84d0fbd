//! Engine-level tests for the paginated comment ingest loop: cursor
//! walking, dedup-on-persist counting, failure handling, and
//! cancellation latency.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{page, raw, EndlessSource, FailingStore, ScriptedSource};
use server_core::domains::comments::{CommentStore, MemoryCommentStore};
use server_core::kernel::jobs::ingest::run_comment_ingest;
use server_core::kernel::jobs::{JobState, Outcome, Progress};
use server_core::kernel::SourceError;
use tokio_util::sync::CancellationToken;

fn page_progress(state: &Mutex<JobState>) -> (u64, u64) {
    match state.lock().unwrap().progress {
        Progress::Pages { fetched, stored } => (fetched, stored),
        Progress::Units { .. } => panic!("expected page progress"),
    }
}

#[tokio::test]
async fn two_page_ingest_counts_raw_and_inserted_separately() {
    let source = ScriptedSource::new();
    // Page two re-serves "b" with newer text; only "d" is a new row.
    source.push_page(Ok(page(
        vec![raw("a", "first", 0), raw("b", "second", 2), raw("c", "third", 0)],
        10,
        true,
    )));
    source.push_page(Ok(page(
        vec![raw("b", "second, edited", 2), raw("d", "fourth", 0)],
        20,
        false,
    )));

    let store = MemoryCommentStore::new();
    let state = Mutex::new(JobState::running_pages());
    let cancel = CancellationToken::new();

    let outcome =
        run_comment_ingest(&source, &store, "v1", Duration::ZERO, &cancel, &state).await;
    assert!(matches!(outcome, Outcome::Completed));

    // Five raw records seen, four distinct rows stored.
    assert_eq!(page_progress(&state), (5, 4));

    let rows = store.scan_page("v1", 0, 100).await.unwrap();
    let cids: Vec<&str> = rows.iter().map(|c| c.cid.as_str()).collect();
    assert_eq!(cids, vec!["a", "b", "c", "d"]);
    let seqs: Vec<i64> = rows.iter().map(|c| c.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);

    // The duplicate was updated in place without a new seq.
    let b = rows.iter().find(|c| c.cid == "b").unwrap();
    assert_eq!(b.text, "second, edited");
    assert_eq!(b.seq, 2);
}

#[tokio::test]
async fn upstream_failure_ends_the_task_and_keeps_prior_pages() {
    let source = ScriptedSource::new();
    source.push_page(Ok(page(
        vec![raw("a", "one", 0), raw("b", "two", 0)],
        10,
        true,
    )));
    source.push_page(Err(SourceError::Transport("connection reset".into())));

    let store = MemoryCommentStore::new();
    let state = Mutex::new(JobState::running_pages());
    let cancel = CancellationToken::new();

    let outcome =
        run_comment_ingest(&source, &store, "v1", Duration::ZERO, &cancel, &state).await;
    assert!(matches!(outcome, Outcome::Failed(_)));

    // Page one survived; the failed page changed nothing.
    assert_eq!(page_progress(&state), (2, 2));
    assert_eq!(store.scan_page("v1", 0, 100).await.unwrap().len(), 2);
}

#[tokio::test]
async fn empty_first_page_completes_and_provisions_the_collection() {
    let source = ScriptedSource::new();
    let store = MemoryCommentStore::new();
    let state = Mutex::new(JobState::running_pages());
    let cancel = CancellationToken::new();

    let outcome =
        run_comment_ingest(&source, &store, "v1", Duration::ZERO, &cancel, &state).await;
    assert!(matches!(outcome, Outcome::Completed));
    assert_eq!(page_progress(&state), (0, 0));

    // The collection exists even though nothing was stored, so a later
    // reply fan-out has somewhere to look.
    assert!(store.collection_exists("v1").await.unwrap());
}

#[tokio::test]
async fn storage_failure_ends_the_task() {
    let source = ScriptedSource::new();
    source.push_page(Ok(page(vec![raw("a", "one", 0)], 10, true)));

    let store = FailingStore::new();
    let state = Mutex::new(JobState::running_pages());
    let cancel = CancellationToken::new();

    let outcome =
        run_comment_ingest(&source, &store, "v1", Duration::ZERO, &cancel, &state).await;
    assert!(matches!(outcome, Outcome::Failed(_)));
    assert_eq!(page_progress(&state), (0, 0));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_inter_page_throttle() {
    let throttle = Duration::from_secs(60);
    let source = Arc::new(EndlessSource::new());
    let store = Arc::new(MemoryCommentStore::new());
    let state = Arc::new(Mutex::new(JobState::running_pages()));
    let cancel = CancellationToken::new();

    let task = {
        let source = Arc::clone(&source);
        let store = Arc::clone(&store);
        let state = Arc::clone(&state);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            run_comment_ingest(source.as_ref(), store.as_ref(), "v1", throttle, &cancel, &state)
                .await
        })
    };

    // Let at least one page land, so the task is parked in its throttle.
    while page_progress(&state).0 == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    let pages_at_cancel = source.pages_served();
    let cancelled_at = tokio::time::Instant::now();

    let outcome = task.await.unwrap();
    assert!(matches!(outcome, Outcome::Cancelled));

    // The task woke mid-throttle instead of fetching more pages or
    // sitting out the full delay.
    assert_eq!(source.pages_served(), pages_at_cancel);
    assert!(cancelled_at.elapsed() < throttle);
}
