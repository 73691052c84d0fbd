//! Postgres-backed comment store.
//!
//! All videos share one wide table with a `video_id` column; the store's
//! contract only requires per-video cid uniqueness and per-video seq
//! ordering, not physical isolation. `seq` comes from a single sequence,
//! so it is strictly increasing in insertion order and updates never
//! consume a value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::store::{dedup_last_wins, CommentStore, StoreError};
use super::types::{NewComment, StoredComment, VideoSummary};

pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the comments table and its scan index if missing. Safe to
    /// call any number of times; also invoked once at startup so read
    /// paths never see a missing table.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS video_comments (
                video_id            TEXT NOT NULL,
                cid                 TEXT NOT NULL,
                text                TEXT NOT NULL,
                create_time         TIMESTAMPTZ NOT NULL,
                reply_comment_total BIGINT NOT NULL DEFAULT 0,
                seq                 BIGSERIAL NOT NULL,
                PRIMARY KEY (video_id, cid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_video_comments_video_seq
            ON video_comments (video_id, seq)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_comment(row: &PgRow) -> Result<StoredComment, sqlx::Error> {
        Ok(StoredComment {
            seq: row.try_get("seq")?,
            cid: row.try_get("cid")?,
            text: row.try_get("text")?,
            create_time: row.try_get("create_time")?,
            reply_comment_total: row.try_get("reply_comment_total")?,
        })
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn ensure_collection(&self, _video_id: &str) -> Result<(), StoreError> {
        // One wide table for all videos; a video's namespace is just its
        // rows, so provisioning means making sure the table exists.
        self.ensure_schema().await
    }

    async fn collection_exists(&self, video_id: &str) -> Result<bool, StoreError> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"SELECT EXISTS (SELECT 1 FROM video_comments WHERE video_id = $1) AS present"#,
        )
        .bind(video_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("present")?)
    }

    async fn upsert_batch(
        &self,
        video_id: &str,
        batch: Vec<NewComment>,
    ) -> Result<usize, StoreError> {
        let batch = dedup_last_wins(batch);
        if batch.is_empty() {
            return Ok(0);
        }

        let cids: Vec<String> = batch.iter().map(|c| c.cid.clone()).collect();

        // Partition by existence so updates refresh rows in place without
        // touching seq, and only genuinely new cids consume sequence values.
        let existing: std::collections::HashSet<String> = sqlx::query(
            r#"SELECT cid FROM video_comments WHERE video_id = $1 AND cid = ANY($2)"#,
        )
        .bind(video_id)
        .bind(&cids)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| row.try_get("cid"))
        .collect::<Result<_, sqlx::Error>>()?;

        let (updates, inserts): (Vec<NewComment>, Vec<NewComment>) = batch
            .into_iter()
            .partition(|c| existing.contains(&c.cid));

        if !updates.is_empty() {
            let (cids, texts, times, totals) = columns(&updates);
            sqlx::query(
                r#"
                UPDATE video_comments AS vc
                SET text = u.text,
                    create_time = u.create_time,
                    reply_comment_total = u.reply_comment_total
                FROM UNNEST($2::text[], $3::text[], $4::timestamptz[], $5::bigint[])
                    AS u(cid, text, create_time, reply_comment_total)
                WHERE vc.video_id = $1 AND vc.cid = u.cid
                "#,
            )
            .bind(video_id)
            .bind(&cids)
            .bind(&texts)
            .bind(&times)
            .bind(&totals)
            .execute(&self.pool)
            .await?;
        }

        if inserts.is_empty() {
            return Ok(0);
        }

        let (cids, texts, times, totals) = columns(&inserts);
        let result = sqlx::query(
            r#"
            INSERT INTO video_comments (video_id, cid, text, create_time, reply_comment_total)
            SELECT $1, u.cid, u.text, u.create_time, u.reply_comment_total
            FROM UNNEST($2::text[], $3::text[], $4::timestamptz[], $5::bigint[])
                WITH ORDINALITY AS u(cid, text, create_time, reply_comment_total, ord)
            ORDER BY u.ord
            ON CONFLICT (video_id, cid) DO NOTHING
            "#,
        )
        .bind(video_id)
        .bind(&cids)
        .bind(&texts)
        .bind(&times)
        .bind(&totals)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn scan_page(
        &self,
        video_id: &str,
        from_seq: i64,
        limit: i64,
    ) -> Result<Vec<StoredComment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT seq, cid, text, create_time, reply_comment_total
            FROM video_comments
            WHERE video_id = $1 AND seq >= $2
            ORDER BY seq ASC
            LIMIT $3
            "#,
        )
        .bind(video_id)
        .bind(from_seq)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Self::row_to_comment(row).map_err(StoreError::from))
            .collect()
    }

    async fn parents_with_replies(&self, video_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT cid FROM video_comments
            WHERE video_id = $1 AND reply_comment_total > 0
            ORDER BY seq ASC
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("cid").map_err(StoreError::from))
            .collect()
    }

    async fn list_videos(&self) -> Result<Vec<VideoSummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT video_id, COUNT(*) AS comment_count
            FROM video_comments
            GROUP BY video_id
            ORDER BY video_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(VideoSummary {
                    video_id: row.try_get("video_id")?,
                    comment_count: row.try_get("comment_count")?,
                })
            })
            .collect()
    }
}

type Columns = (Vec<String>, Vec<String>, Vec<DateTime<Utc>>, Vec<i64>);

fn columns(batch: &[NewComment]) -> Columns {
    let mut cids = Vec::with_capacity(batch.len());
    let mut texts = Vec::with_capacity(batch.len());
    let mut times = Vec::with_capacity(batch.len());
    let mut totals = Vec::with_capacity(batch.len());
    for c in batch {
        cids.push(c.cid.clone());
        texts.push(c.text.clone());
        times.push(c.create_time);
        totals.push(c.reply_comment_total);
    }
    (cids, texts, times, totals)
}
